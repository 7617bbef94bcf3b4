use std::{
    collections::{BTreeMap, HashMap},
    sync::LazyLock,
};

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// A vocabulary known without being declared by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocabulary {
    pub prefix: &'static str,
    pub iri: &'static str,
    pub hashtag: bool,
}

const fn vocabulary(prefix: &'static str, iri: &'static str, hashtag: bool) -> Vocabulary {
    Vocabulary {
        prefix,
        iri,
        hashtag,
    }
}

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema";
pub const OWL: &str = "http://www.w3.org/2002/07/owl";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema";
pub const KNORA_API: &str = "http://api.knora.org/ontology/knora-api/v2";
pub const SALSAH_GUI: &str = "http://api.knora.org/ontology/salsah-gui/v2";

pub const BASE_VOCABULARIES: [Vocabulary; 4] = [
    vocabulary("rdf", RDF, true),
    vocabulary("rdfs", RDFS, true),
    vocabulary("owl", OWL, true),
    vocabulary("xsd", XSD, true),
];

pub const KNORA_VOCABULARIES: [Vocabulary; 2] = [
    vocabulary("knora-api", KNORA_API, true),
    vocabulary("salsah-gui", SALSAH_GUI, true),
];

pub const COMMON_VOCABULARIES: [Vocabulary; 8] = [
    vocabulary("foaf", "http://xmlns.com/foaf/0.1/", false),
    vocabulary("dc", "http://purl.org/dc/elements/1.1/", false),
    vocabulary("dcterms", "http://purl.org/dc/terms/", false),
    vocabulary("dcmi", "http://purl.org/dc/dcmitype/", false),
    vocabulary("skos", "http://www.w3.org/2004/02/skos/core", true),
    vocabulary("bibtex", "http://purl.org/net/nknouf/ns/bibtex", true),
    vocabulary("bibo", "http://purl.org/ontology/bibo/", false),
    vocabulary("cidoc", "http://purl.org/NET/cidoc-crm/core", true),
];

static IRI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[\w.\-~]*(:\d{0,6})?(/[\w.\-~]+)*/?(#[\w.\-~]*)?$")
        .expect("IRI pattern is valid")
});

static COMPACT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\w\-]*):([\w\-]+)$").expect("compact IRI pattern is valid")
});

pub fn is_iri(value: &str) -> bool {
    IRI_PATTERN.is_match(value)
}

fn is_compact(value: &str) -> bool {
    !value.starts_with("http") && COMPACT_PATTERN.is_match(value)
}

fn common_by_prefix(prefix: &str) -> Option<&'static Vocabulary> {
    COMMON_VOCABULARIES.iter().find(|v| v.prefix == prefix)
}

fn common_by_iri(iri: &str) -> Option<&'static Vocabulary> {
    COMMON_VOCABULARIES.iter().find(|v| v.iri == iri)
}

fn is_system_prefix(prefix: &str) -> bool {
    BASE_VOCABULARIES
        .iter()
        .chain(KNORA_VOCABULARIES.iter())
        .any(|v| v.prefix == prefix)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("\"{0}\" is not a valid IRI")]
    InvalidIri(String),
    #[error("\"{0}\" has no prefix separator")]
    MissingSeparator(String),
    #[error("prefix \"{0}\" is not known in the context")]
    UnknownPrefix(String),
    #[error("ontology of \"{0}\" is not known in the context")]
    UnknownOntology(String),
}

/// IRI of an ontology registered under a prefix. `hashtag` marks ontologies
/// whose elements are joined with `#`; the stored IRI never ends with `#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntoInfo {
    pub iri: String,
    pub hashtag: bool,
}

impl OntoInfo {
    pub fn from_iri(iri: &str) -> Self {
        match iri.strip_suffix('#') {
            Some(stripped) => Self {
                iri: stripped.to_string(),
                hashtag: true,
            },
            None => Self {
                iri: iri.to_string(),
                hashtag: false,
            },
        }
    }

    fn from_vocabulary(vocabulary: &Vocabulary) -> Self {
        Self {
            iri: vocabulary.iri.to_string(),
            hashtag: vocabulary.hashtag,
        }
    }

    fn qualify(&self, name: &str) -> String {
        if self.hashtag {
            format!("{}#{name}", self.iri)
        } else {
            format!("{}{name}", self.iri)
        }
    }

    fn context_iri(&self) -> String {
        if self.hashtag {
            format!("{}#", self.iri)
        } else {
            self.iri.clone()
        }
    }
}

/// Prefix table used to expand and compact IRIs of ontology entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    entries: BTreeMap<String, OntoInfo>,
    reverse: HashMap<String, String>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(std::iter::empty::<(String, String)>())
    }
}

impl Context {
    /// Builds a context from project prefixes. Base and Knora vocabularies
    /// fill the prefixes the project leaves free.
    pub fn new<I, P, S>(project_entries: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<String>,
        S: AsRef<str>,
    {
        let mut ctx = Self {
            entries: BTreeMap::new(),
            reverse: HashMap::new(),
        };
        for (prefix, iri) in project_entries {
            ctx.insert(prefix.into(), OntoInfo::from_iri(iri.as_ref()));
        }
        for vocabulary in BASE_VOCABULARIES.iter().chain(KNORA_VOCABULARIES.iter()) {
            if !ctx.entries.contains_key(vocabulary.prefix) {
                ctx.insert(vocabulary.prefix.to_string(), OntoInfo::from_vocabulary(vocabulary));
            }
        }
        ctx
    }

    /// Reads a JSON-LD `@context` object. Non-string entries are ignored.
    pub fn from_json(value: &Value) -> Self {
        let entries = value
            .as_object()
            .into_iter()
            .flat_map(|obj| obj.iter())
            .filter_map(|(prefix, iri)| iri.as_str().map(|iri| (prefix.clone(), iri.to_string())));
        Self::new(entries)
    }

    fn insert(&mut self, prefix: String, info: OntoInfo) {
        if let Some(previous) = self.entries.get(&prefix) {
            if self.reverse.get(&previous.iri) == Some(&prefix) {
                self.reverse.remove(&previous.iri);
            }
        }
        self.reverse.insert(info.iri.clone(), prefix.clone());
        self.entries.insert(prefix, info);
    }

    /// With an IRI the prefix is registered or overridden. Without one, the
    /// prefix must name a common vocabulary (or an already present system
    /// vocabulary).
    pub fn add_prefix(&mut self, prefix: &str, iri: Option<&str>) -> Result<(), ContextError> {
        match iri {
            Some(iri) => {
                self.insert(prefix.to_string(), OntoInfo::from_iri(iri));
                Ok(())
            }
            None => {
                if is_system_prefix(prefix) || self.entries.contains_key(prefix) {
                    return Ok(());
                }
                let vocabulary = common_by_prefix(prefix)
                    .ok_or_else(|| ContextError::UnknownPrefix(prefix.to_string()))?;
                self.insert(prefix.to_string(), OntoInfo::from_vocabulary(vocabulary));
                Ok(())
            }
        }
    }

    pub fn iri_from_prefix(&self, prefix: &str) -> Option<String> {
        if is_iri(prefix) {
            return Some(prefix.to_string());
        }
        self.entries.get(prefix).map(|info| info.iri.clone())
    }

    /// Finds the prefix of an ontology IRI. Common vocabularies and Knora
    /// project ontologies (`.../<name>/v2`) are registered on first use.
    pub fn prefix_from_iri(&mut self, iri: &str) -> Result<String, ContextError> {
        if !is_iri(iri) {
            return Err(ContextError::InvalidIri(iri.to_string()));
        }
        let iri = iri.trim_end_matches('#');
        if let Some(prefix) = self.reverse.get(iri) {
            return Ok(prefix.clone());
        }
        if let Some(vocabulary) = common_by_iri(iri) {
            self.insert(vocabulary.prefix.to_string(), OntoInfo::from_vocabulary(vocabulary));
            return Ok(vocabulary.prefix.to_string());
        }
        let mut segments = iri.rsplit('/');
        if segments.next() == Some("v2") {
            if let Some(name) = segments.next().filter(|name| !name.is_empty()) {
                let prefix = name.to_string();
                self.insert(
                    prefix.clone(),
                    OntoInfo {
                        iri: iri.to_string(),
                        hashtag: true,
                    },
                );
                return Ok(prefix);
            }
        }
        Err(ContextError::UnknownOntology(iri.to_string()))
    }

    /// `prefix:name` to a full IRI; full IRIs pass through.
    pub fn expand(&mut self, value: &str) -> Result<String, ContextError> {
        if is_iri(value) {
            return Ok(value.to_string());
        }
        let (prefix, name) = value
            .split_once(':')
            .ok_or_else(|| ContextError::MissingSeparator(value.to_string()))?;
        if let Some(info) = self.entries.get(prefix) {
            return Ok(info.qualify(name));
        }
        let vocabulary =
            common_by_prefix(prefix).ok_or_else(|| ContextError::UnknownPrefix(prefix.to_string()))?;
        let info = OntoInfo::from_vocabulary(vocabulary);
        let expanded = info.qualify(name);
        self.insert(prefix.to_string(), info);
        Ok(expanded)
    }

    /// Full IRI to `prefix:name`; compact values pass through.
    pub fn compact(&mut self, iri: &str) -> Result<String, ContextError> {
        if is_compact(iri) {
            return Ok(iri.to_string());
        }
        if !is_iri(iri) {
            return Err(ContextError::InvalidIri(iri.to_string()));
        }
        let (ontology, name) = match iri.split_once('#') {
            Some((ontology, name)) => (ontology, name),
            None => match iri.rfind('/') {
                Some(pos) => iri.split_at(pos + 1),
                None => return Err(ContextError::InvalidIri(iri.to_string())),
            },
        };
        if let Some(prefix) = self.reverse.get(ontology) {
            return Ok(format!("{prefix}:{name}"));
        }
        match common_by_iri(ontology) {
            Some(vocabulary) => {
                self.insert(vocabulary.prefix.to_string(), OntoInfo::from_vocabulary(vocabulary));
                Ok(format!("{}:{name}", vocabulary.prefix))
            }
            None => Err(ContextError::UnknownOntology(iri.to_string())),
        }
    }

    /// Shortest form of an IRI relative to `ontology_name`: Knora system
    /// entities lose their prefix, entities of the ontology itself become
    /// `:name`.
    pub fn reduce(&mut self, iri: &str, ontology_name: Option<&str>) -> Result<String, ContextError> {
        let compacted = if is_iri(iri) {
            self.compact(iri)?
        } else {
            iri.to_string()
        };
        let Some((prefix, name)) = compacted.split_once(':') else {
            return Ok(compacted);
        };
        let system_prefixes: Vec<&str> = KNORA_VOCABULARIES
            .iter()
            .filter_map(|v| self.reverse.get(v.iri).map(String::as_str))
            .collect();
        if system_prefixes.contains(&prefix) {
            return Ok(name.to_string());
        }
        if ontology_name == Some(prefix) {
            return Ok(format!(":{name}"));
        }
        Ok(compacted)
    }

    /// Compact key of `name` in the vocabulary `vocabulary_iri`.
    pub fn term(&mut self, vocabulary_iri: &str, name: &str) -> Result<String, ContextError> {
        let prefix = self.prefix_from_iri(vocabulary_iri)?;
        Ok(format!("{prefix}:{name}"))
    }

    /// The JSON-LD `@context` object.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(prefix, info)| (prefix.clone(), Value::String(info.context_iri())))
            .collect();
        Value::Object(map)
    }

    /// Entries other than the base and Knora system vocabularies.
    pub fn externals_used(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter(|(prefix, _)| !is_system_prefix(prefix))
            .map(|(prefix, info)| (prefix.clone(), info.iri.clone()))
            .collect()
    }

    pub fn get(&self, prefix: &str) -> Option<&OntoInfo> {
        self.entries.get(prefix)
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.entries.contains_key(prefix)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OntoInfo)> {
        self.entries.iter().map(|(prefix, info)| (prefix.as_str(), info))
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = (&'a String, &'a OntoInfo);
    type IntoIter = std::collections::btree_map::Iter<'a, String, OntoInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod tests;
