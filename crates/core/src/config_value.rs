use serde::{Deserialize, Serialize};

/// Closed set of configuration parameter types a function can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    Text,
    Number,
    Checkbox,
    Enum,
    #[serde(rename = "uint")]
    UInt,
    Duration,
    #[serde(rename = "localtime")]
    LocalTime,
    Instant,
}

impl ConfigType {
    /// Parse the `type` tag scripts use in their `config` list.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "checkbox" => Some(Self::Checkbox),
            "enum" => Some(Self::Enum),
            "uint" => Some(Self::UInt),
            "duration" => Some(Self::Duration),
            "localtime" => Some(Self::LocalTime),
            "instant" => Some(Self::Instant),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Checkbox => "checkbox",
            Self::Enum => "enum",
            Self::UInt => "uint",
            Self::Duration => "duration",
            Self::LocalTime => "localtime",
            Self::Instant => "instant",
        }
    }
}

/// Serialized configuration value, as persisted by the host and handed to a
/// function script at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConfigurationValue {
    Text { id: String, value: String },
    Number { id: String, value: f64 },
    Checkbox { id: String, value: bool },
    Enum { id: String, value: String },
    #[serde(rename = "uint")]
    UInt { id: String, value: u64 },
    /// Held in seconds.
    Duration { id: String, seconds: f64 },
    /// Minutes since local midnight.
    #[serde(rename = "localtime")]
    LocalTime { id: String, minutes: u32 },
    Instant { id: String, epoch_millis: i64 },
}

impl ConfigurationValue {
    pub fn id(&self) -> &str {
        match self {
            Self::Text { id, .. }
            | Self::Number { id, .. }
            | Self::Checkbox { id, .. }
            | Self::Enum { id, .. }
            | Self::UInt { id, .. }
            | Self::Duration { id, .. }
            | Self::LocalTime { id, .. }
            | Self::Instant { id, .. } => id,
        }
    }

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for ty in [
            ConfigType::Text,
            ConfigType::Number,
            ConfigType::Checkbox,
            ConfigType::Enum,
            ConfigType::UInt,
            ConfigType::Duration,
            ConfigType::LocalTime,
            ConfigType::Instant,
        ] {
            assert_eq!(ConfigType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(ConfigType::from_tag("colour"), None);
    }

    #[test]
    fn values_serialize_with_type_tag() {
        let value = ConfigurationValue::LocalTime { id: "start".into(), minutes: 90 };
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["type"], "localtime");
        assert_eq!(json["minutes"], 90);
        let back: ConfigurationValue = serde_json::from_value(json).unwrap();
        assert_eq!(back.config_type(), ConfigType::LocalTime);
        assert_eq!(back.id(), "start");
    }
}
