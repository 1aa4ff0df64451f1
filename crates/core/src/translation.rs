use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Translation key -> (locale code -> text).
pub type LocalizationsTable = BTreeMap<String, BTreeMap<String, String>>;

/// Display text declared by a script.
///
/// Scripts either give a plain string or a table of locale code to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranslatedString {
    Simple(String),
    Translations(BTreeMap<String, String>),
}

impl TranslatedString {
    /// Replace a plain string that names a translation key with that
    /// translation. Returns the key when a lookup hit, so callers can track
    /// which translations were used.
    pub fn localize(self, table: &LocalizationsTable) -> (Self, Option<String>) {
        match self {
            Self::Simple(key) => match table.get(&key) {
                Some(found) => (Self::Translations(found.clone()), Some(key)),
                None => (Self::Simple(key), None),
            },
            other => (other, None),
        }
    }

    /// Best text for `locale`: exact match, then the language part
    /// (`en` for `en-GB`), then English, then anything.
    pub fn resolve(&self, locale: &str) -> Option<&str> {
        match self {
            Self::Simple(text) => Some(text),
            Self::Translations(map) => {
                let language = locale.split(['-', '_']).next().unwrap_or(locale);
                map.get(locale)
                    .or_else(|| map.get(language))
                    .or_else(|| map.get("en"))
                    .or_else(|| map.values().next())
                    .map(String::as_str)
            }
        }
    }
}

impl From<&str> for TranslatedString {
    fn from(value: &str) -> Self {
        Self::Simple(value.to_string())
    }
}
