//! Declarative shape of a function script.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config_value::ConfigType;
use crate::translation::{LocalizationsTable, TranslatedString};

/// `major.minor.patch`, with missing trailing parts read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let mut next = |required: bool| -> Result<u32, String> {
            match parts.next() {
                Some(part) => part
                    .parse()
                    .map_err(|_| format!("invalid version component '{part}' in '{s}'")),
                None if required => Err(format!("empty version '{s}'")),
                None => Ok(0),
            }
        };
        let version = Version::new(next(true)?, next(false)?, next(false)?);
        if parts.next().is_some() {
            return Err(format!("too many version components in '{s}'"));
        }
        Ok(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumOption {
    pub id: String,
    pub name: TranslatedString,
}

/// Declared type and default of one configuration parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConfigKind {
    Text { default: Option<String> },
    Number { default: Option<f64> },
    Checkbox { default: Option<bool> },
    Enum { options: Vec<EnumOption>, default: Option<String> },
    #[serde(rename = "uint")]
    UInt { default: Option<u64> },
    Duration { default_seconds: Option<f64> },
    #[serde(rename = "localtime")]
    LocalTime { default_minutes: Option<u32> },
    Instant { default_epoch_millis: Option<i64> },
}

impl ConfigKind {
    pub fn config_type(&self) -> ConfigType {
        match self {
            Self::Text { .. } => ConfigType::Text,
            Self::Number { .. } => ConfigType::Number,
            Self::Checkbox { .. } => ConfigType::Checkbox,
            Self::Enum { .. } => ConfigType::Enum,
            Self::UInt { .. } => ConfigType::UInt,
            Self::Duration { .. } => ConfigType::Duration,
            Self::LocalTime { .. } => ConfigType::LocalTime,
            Self::Instant { .. } => ConfigType::Instant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSpec {
    pub id: String,
    /// Absent names are allowed; the host shows the id instead.
    pub name: Option<TranslatedString>,
    pub kind: ConfigKind,
}

impl ConfigSpec {
    pub fn config_type(&self) -> ConfigType {
        self.kind.config_type()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub script: String,
    pub id: Option<String>,
    pub version: Option<Version>,
    pub title: Option<TranslatedString>,
    pub description: Option<TranslatedString>,
    pub categories: Vec<TranslatedString>,
    pub input_count: u32,
    pub config: Vec<ConfigSpec>,
    /// Translations that display strings were resolved against.
    pub used_translations: LocalizationsTable,
}

impl FunctionMetadata {
    /// Metadata of a script that is just a bare generator.
    pub fn bare(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            id: None,
            version: None,
            title: None,
            description: None,
            categories: Vec::new(),
            input_count: 1,
            config: Vec::new(),
            used_translations: LocalizationsTable::new(),
        }
    }

    pub fn config_spec(&self, id: &str) -> Option<&ConfigSpec> {
        self.config.iter().find(|spec| spec.id == id)
    }
}

/// Functions published to a host, filtered by API level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCatalogue {
    pub functions: Vec<FunctionMetadata>,
    pub translations: LocalizationsTable,
}
