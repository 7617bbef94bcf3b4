use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::domain::{DomainError, Language};

/// Text available in several languages, optionally with a language-less
/// variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LangString {
    plain: Option<String>,
    by_lang: BTreeMap<Language, String>,
}

impl LangString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            plain: Some(text.into()),
            by_lang: BTreeMap::new(),
        }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Language, S)>,
        S: Into<String>,
    {
        Self {
            plain: None,
            by_lang: pairs
                .into_iter()
                .map(|(lang, text)| (lang, text.into()))
                .collect(),
        }
    }

    pub fn with(mut self, lang: Language, text: impl Into<String>) -> Self {
        self.set(lang, text);
        self
    }

    /// Exact language, else the first available language, else the plain text.
    pub fn get(&self, lang: Language) -> Option<&str> {
        self.by_lang
            .get(&lang)
            .or_else(|| self.by_lang.values().next())
            .or(self.plain.as_ref())
            .map(String::as_str)
    }

    pub fn get_default(&self) -> Option<&str> {
        self.plain
            .as_ref()
            .or_else(|| self.by_lang.values().next())
            .map(String::as_str)
    }

    pub fn get_exact(&self, lang: Language) -> Option<&str> {
        self.by_lang.get(&lang).map(String::as_str)
    }

    pub fn get_plain(&self) -> Option<&str> {
        self.plain.as_deref()
    }

    pub fn set(&mut self, lang: Language, text: impl Into<String>) {
        self.by_lang.insert(lang, text.into());
    }

    /// Replaces every entry with a single language-less text.
    pub fn set_plain(&mut self, text: impl Into<String>) {
        self.by_lang.clear();
        self.plain = Some(text.into());
    }

    pub fn remove(&mut self, lang: Language) -> Option<String> {
        self.by_lang.remove(&lang)
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_none() && self.by_lang.is_empty()
    }

    pub fn clear(&mut self) {
        self.plain = None;
        self.by_lang.clear();
    }

    pub fn languages(&self) -> impl Iterator<Item = (Language, &str)> {
        self.by_lang.iter().map(|(lang, text)| (*lang, text.as_str()))
    }

    pub fn map_values(&self, f: impl Fn(&str) -> String) -> Self {
        Self {
            plain: self.plain.as_deref().map(&f),
            by_lang: self
                .by_lang
                .iter()
                .map(|(lang, text)| (*lang, f(text)))
                .collect(),
        }
    }

    /// Admin API form: a string, or `[{"language": "en", "value": "..."}]`.
    pub fn to_admin_json(&self) -> Option<Value> {
        self.to_json_with("language", "value")
    }

    /// JSON-LD form used by the ontology API.
    pub fn to_jsonld(&self) -> Option<Value> {
        self.to_json_with("@language", "@value")
    }

    pub fn from_admin_json(value: &Value) -> Result<Self, DomainError> {
        Self::from_json_with(value, "language", "value")
    }

    pub fn from_jsonld(value: &Value) -> Result<Self, DomainError> {
        Self::from_json_with(value, "@language", "@value")
    }

    fn to_json_with(&self, lang_key: &str, value_key: &str) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        if let Some(plain) = &self.plain {
            if self.by_lang.is_empty() {
                return Some(Value::String(plain.clone()));
            }
        }
        let mut items: Vec<Value> = self
            .by_lang
            .iter()
            .map(|(lang, text)| json!({ lang_key: lang.as_str(), value_key: text }))
            .collect();
        if let Some(plain) = &self.plain {
            items.push(json!({ value_key: plain }));
        }
        Some(Value::Array(items))
    }

    fn from_json_with(value: &Value, lang_key: &str, value_key: &str) -> Result<Self, DomainError> {
        let mut out = Self::new();
        match value {
            Value::Null => {}
            Value::String(text) => out.plain = Some(text.clone()),
            Value::Object(_) => out.read_entry(value, lang_key, value_key)?,
            Value::Array(items) => {
                for item in items {
                    out.read_entry(item, lang_key, value_key)?;
                }
            }
            other => {
                return Err(DomainError::MalformedLangString(other.to_string()));
            }
        }
        Ok(out)
    }

    fn read_entry(&mut self, item: &Value, lang_key: &str, value_key: &str) -> Result<(), DomainError> {
        if let Value::String(text) = item {
            self.plain = Some(text.clone());
            return Ok(());
        }
        let obj = item
            .as_object()
            .ok_or_else(|| DomainError::MalformedLangString(item.to_string()))?;
        let Some(text) = obj.get(value_key).and_then(Value::as_str) else {
            return Ok(());
        };
        let lang = obj
            .get(lang_key)
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<Language>().ok());
        match lang {
            Some(lang) => self.set(lang, text),
            None => self.plain = Some(text.to_string()),
        }
        Ok(())
    }
}

impl fmt::Display for LangString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(plain) = &self.plain {
            write!(f, "{plain}")?;
        }
        for (idx, (lang, text)) in self.by_lang.iter().enumerate() {
            if idx > 0 || self.plain.is_some() {
                f.write_str(", ")?;
            }
            write!(f, "{text}@{lang}")?;
        }
        Ok(())
    }
}

impl Serialize for LangString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_admin_json()
            .unwrap_or_else(|| Value::Array(Vec::new()))
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LangString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_admin_json(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "tests/langstring_tests.rs"]
mod tests;
