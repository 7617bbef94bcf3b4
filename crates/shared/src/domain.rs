use std::{fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

macro_rules! iri_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(iri: impl Into<String>) -> Self {
                Self(iri.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

iri_newtype!(ProjectIri);
iri_newtype!(GroupIri);
iri_newtype!(UserIri);
iri_newtype!(ListNodeIri);
iri_newtype!(OntologyIri);
iri_newtype!(ClassIri);
iri_newtype!(PropertyIri);

pub const SYSTEM_PROJECT: &str = "http://www.knora.org/ontology/knora-admin#SystemProject";
pub const PROJECT_MEMBER_GROUP: &str = "http://www.knora.org/ontology/knora-admin#ProjectMember";
pub const PROJECT_ADMIN_GROUP: &str = "http://www.knora.org/ontology/knora-admin#ProjectAdmin";
pub const SYSTEM_ADMIN_GROUP: &str = "http://www.knora.org/ontology/knora-admin#SystemAdmin";
pub const PROJECT_IRI_BASE: &str = "http://rdfh.ch/projects/";

impl ProjectIri {
    pub fn for_shortcode(shortcode: &str) -> Self {
        Self(format!("{PROJECT_IRI_BASE}{shortcode}"))
    }
}

impl OntologyIri {
    /// Ontology name as encoded in a DSP ontology IRI
    /// (`http://host/ontology/<shortcode>/<name>/v2`).
    pub fn ontology_name(&self) -> Option<&str> {
        let mut segments = self.0.trim_end_matches('#').rsplit('/');
        segments.next()?;
        segments.next().filter(|name| !name.is_empty())
    }
}

/// Project shortcodes are four hexadecimal digits.
pub fn is_shortcode(value: &str) -> bool {
    value.len() == 4 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid language \"{0}\"")]
    InvalidLanguage(String),
    #[error("invalid cardinality \"{0}\"")]
    InvalidCardinality(String),
    #[error("invalid last modification date: {0}")]
    InvalidModificationDate(String),
    #[error("malformed language string: {0}")]
    MalformedLangString(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    De,
    Fr,
    It,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::En, Language::De, Language::Fr, Language::It];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::De => "de",
            Language::Fr => "fr",
            Language::It => "it",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "de" => Ok(Language::De),
            "fr" => Ok(Language::Fr),
            "it" => Ok(Language::It),
            _ => Err(DomainError::InvalidLanguage(s.to_string())),
        }
    }
}

/// Multiplicity of a property on a resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "0-1")]
    ZeroOrOne,
    #[serde(rename = "0-n")]
    ZeroOrMore,
    #[serde(rename = "1-n")]
    OneOrMore,
}

impl Cardinality {
    pub fn as_str(self) -> &'static str {
        match self {
            Cardinality::One => "1",
            Cardinality::ZeroOrOne => "0-1",
            Cardinality::ZeroOrMore => "0-n",
            Cardinality::OneOrMore => "1-n",
        }
    }

    /// OWL restriction key and value expressing this cardinality.
    pub fn owl_restriction(self) -> (&'static str, u8) {
        match self {
            Cardinality::One => ("owl:cardinality", 1),
            Cardinality::ZeroOrOne => ("owl:maxCardinality", 1),
            Cardinality::ZeroOrMore => ("owl:minCardinality", 0),
            Cardinality::OneOrMore => ("owl:minCardinality", 1),
        }
    }

    /// Reads the cardinality back from the values of an `owl:Restriction`.
    pub fn from_owl(
        cardinality: Option<u64>,
        max_cardinality: Option<u64>,
        min_cardinality: Option<u64>,
    ) -> Result<Self, DomainError> {
        if cardinality.is_some() {
            return Ok(Cardinality::One);
        }
        if max_cardinality.is_some() {
            return Ok(Cardinality::ZeroOrOne);
        }
        match min_cardinality {
            Some(0) => Ok(Cardinality::ZeroOrMore),
            Some(1) => Ok(Cardinality::OneOrMore),
            other => Err(DomainError::InvalidCardinality(format!(
                "unsupported restriction (minCardinality={other:?})"
            ))),
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cardinality {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Cardinality::One),
            "0-1" => Ok(Cardinality::ZeroOrOne),
            "0-n" => Ok(Cardinality::ZeroOrMore),
            "1-n" => Ok(Cardinality::OneOrMore),
            _ => Err(DomainError::InvalidCardinality(s.to_string())),
        }
    }
}

/// Optimistic-concurrency token of an ontology. Every ontology mutation must
/// carry the latest value and yields a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LastModificationDate(DateTime<Utc>);

impl LastModificationDate {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp)
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| Self(ts.with_timezone(&Utc)))
            .map_err(|err| DomainError::InvalidModificationDate(format!("{raw}: {err}")))
    }

    /// Accepts a plain timestamp or `{"@type": "xsd:dateTimeStamp", "@value": ...}`.
    pub fn from_json(value: &Value) -> Result<Self, DomainError> {
        match value {
            Value::String(raw) => Self::parse(raw),
            Value::Object(obj) => {
                if obj.get("@type").and_then(Value::as_str) != Some("xsd:dateTimeStamp") {
                    return Err(DomainError::InvalidModificationDate(
                        "expected @type xsd:dateTimeStamp".into(),
                    ));
                }
                let raw = obj.get("@value").and_then(Value::as_str).ok_or_else(|| {
                    DomainError::InvalidModificationDate("missing @value".into())
                })?;
                Self::parse(raw)
            }
            other => Err(DomainError::InvalidModificationDate(other.to_string())),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "@type": "xsd:dateTimeStamp",
            "@value": self.to_string(),
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for LastModificationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
