//! Configuration codec.
//!
//! Hosts bind editable [`ConfigurationInput`]s to their UI and persist the
//! serialized [`ConfigurationValue`]s. Inputs are shared as `Arc`s so that
//! re-deriving metadata can hand the *same* input back when its id and type
//! are unchanged, keeping whatever the user was in the middle of editing.

use std::collections::HashMap;
use std::sync::Arc;

use graphscript_core::metadata::{ConfigKind, ConfigSpec, FunctionMetadata};
use graphscript_core::{ConfigType, ConfigurationValue};
use mlua::{Lua, Table};
use parking_lot::Mutex;

/// What an unparsable or empty number field encodes as.
pub const NUMBER_FALLBACK: f64 = 1.0;

/// What an unparsable or empty unsigned field encodes as.
pub const UINT_FALLBACK: u64 = 1;

/// Editable state of one input. Numeric text fields keep the raw text the
/// user typed; it is only parsed when encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Text(String),
    Number(String),
    Checkbox(bool),
    Enum(String),
    UInt(String),
    /// Seconds.
    Duration(f64),
    /// Minutes since midnight.
    LocalTime(u32),
    Instant(i64),
}

impl InputValue {
    pub fn config_type(&self) -> ConfigType {
        match self {
            Self::Text(_) => ConfigType::Text,
            Self::Number(_) => ConfigType::Number,
            Self::Checkbox(_) => ConfigType::Checkbox,
            Self::Enum(_) => ConfigType::Enum,
            Self::UInt(_) => ConfigType::UInt,
            Self::Duration(_) => ConfigType::Duration,
            Self::LocalTime(_) => ConfigType::LocalTime,
            Self::Instant(_) => ConfigType::Instant,
        }
    }
}

#[derive(Debug)]
pub struct ConfigurationInput {
    value: Mutex<InputValue>,
}

impl ConfigurationInput {
    pub fn new(value: InputValue) -> Arc<Self> {
        Arc::new(Self { value: Mutex::new(value) })
    }

    /// Input for a newly declared parameter: the declared default, else a
    /// neutral empty value.
    pub fn fresh(spec: &ConfigSpec) -> Arc<Self> {
        let value = match &spec.kind {
            ConfigKind::Text { default } => InputValue::Text(default.clone().unwrap_or_default()),
            ConfigKind::Number { default } => {
                InputValue::Number(default.map(|d| d.to_string()).unwrap_or_default())
            }
            ConfigKind::Checkbox { default } => InputValue::Checkbox(default.unwrap_or(false)),
            ConfigKind::Enum { options, default } => InputValue::Enum(
                default
                    .clone()
                    .or_else(|| options.first().map(|o| o.id.clone()))
                    .unwrap_or_default(),
            ),
            ConfigKind::UInt { default } => {
                InputValue::UInt(default.map(|d| d.to_string()).unwrap_or_default())
            }
            ConfigKind::Duration { default_seconds } => InputValue::Duration(default_seconds.unwrap_or(0.0)),
            ConfigKind::LocalTime { default_minutes } => InputValue::LocalTime(default_minutes.unwrap_or(0)),
            ConfigKind::Instant { default_epoch_millis } => InputValue::Instant(default_epoch_millis.unwrap_or(0)),
        };
        Self::new(value)
    }

    /// Input restored from a persisted value.
    pub fn from_value(value: &ConfigurationValue) -> Arc<Self> {
        let value = match value {
            ConfigurationValue::Text { value, .. } => InputValue::Text(value.clone()),
            ConfigurationValue::Number { value, .. } => InputValue::Number(value.to_string()),
            ConfigurationValue::Checkbox { value, .. } => InputValue::Checkbox(*value),
            ConfigurationValue::Enum { value, .. } => InputValue::Enum(value.clone()),
            ConfigurationValue::UInt { value, .. } => InputValue::UInt(value.to_string()),
            ConfigurationValue::Duration { seconds, .. } => InputValue::Duration(*seconds),
            ConfigurationValue::LocalTime { minutes, .. } => InputValue::LocalTime(*minutes),
            ConfigurationValue::Instant { epoch_millis, .. } => InputValue::Instant(*epoch_millis),
        };
        Self::new(value)
    }

    pub fn config_type(&self) -> ConfigType {
        self.value.lock().config_type()
    }

    pub fn get(&self) -> InputValue {
        self.value.lock().clone()
    }

    /// Replace the value. A value of another type is handed back untouched.
    pub fn set(&self, value: InputValue) -> Result<(), InputValue> {
        let mut current = self.value.lock();
        if current.config_type() != value.config_type() {
            return Err(value);
        }
        *current = value;
        Ok(())
    }

    pub fn encode(&self, id: &str) -> ConfigurationValue {
        let id = id.to_string();
        match &*self.value.lock() {
            InputValue::Text(text) => ConfigurationValue::Text { id, value: text.clone() },
            InputValue::Number(text) => ConfigurationValue::Number { id, value: parse_number(text) },
            InputValue::Checkbox(value) => ConfigurationValue::Checkbox { id, value: *value },
            InputValue::Enum(value) => ConfigurationValue::Enum { id, value: value.clone() },
            InputValue::UInt(text) => ConfigurationValue::UInt {
                id,
                value: text.trim().parse().unwrap_or(UINT_FALLBACK),
            },
            InputValue::Duration(seconds) => ConfigurationValue::Duration { id, seconds: *seconds },
            InputValue::LocalTime(minutes) => ConfigurationValue::LocalTime { id, minutes: *minutes },
            InputValue::Instant(epoch_millis) => ConfigurationValue::Instant { id, epoch_millis: *epoch_millis },
        }
    }
}

/// Lenient number parse: anything that is not a number is the fallback.
pub fn parse_number(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
        .unwrap_or(NUMBER_FALLBACK)
}

/// One configured parameter of a function node.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub id: String,
    pub input: Arc<ConfigurationInput>,
}

pub fn encode(entries: &[ConfigEntry]) -> Vec<ConfigurationValue> {
    entries.iter().map(|entry| entry.input.encode(&entry.id)).collect()
}

/// Walk the new declared schema, keeping inputs whose id and type are
/// unchanged by reference and creating fresh ones for the rest. Inputs whose
/// id is no longer declared are dropped.
pub fn reconcile(existing: &[ConfigEntry], metadata: &FunctionMetadata) -> Vec<ConfigEntry> {
    let by_id: HashMap<&str, &Arc<ConfigurationInput>> = existing
        .iter()
        .map(|entry| (entry.id.as_str(), &entry.input))
        .collect();

    metadata
        .config
        .iter()
        .map(|spec| {
            let input = match by_id.get(spec.id.as_str()) {
                Some(input) if input.config_type() == spec.config_type() => Arc::clone(input),
                _ => ConfigurationInput::fresh(spec),
            };
            ConfigEntry { id: spec.id.clone(), input }
        })
        .collect()
}

/// Inputs for a node being created from persisted values. Saved values are
/// used when their id and type match a declared parameter; the last saved
/// value for an id wins.
pub fn restore(metadata: &FunctionMetadata, saved: &[ConfigurationValue]) -> Vec<ConfigEntry> {
    let by_id: HashMap<&str, &ConfigurationValue> =
        saved.iter().map(|value| (value.id(), value)).collect();

    metadata
        .config
        .iter()
        .map(|spec| {
            let input = match by_id.get(spec.id.as_str()) {
                Some(value) if value.config_type() == spec.config_type() => {
                    ConfigurationInput::from_value(value)
                }
                _ => ConfigurationInput::fresh(spec),
            };
            ConfigEntry { id: spec.id.clone(), input }
        })
        .collect()
}

/// The `config` argument of a generator, keyed by parameter id. Later
/// values for the same id overwrite earlier ones.
pub fn config_table(lua: &Lua, values: &[ConfigurationValue]) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    for value in values {
        let id = value.id();
        match value {
            ConfigurationValue::Text { value, .. } | ConfigurationValue::Enum { value, .. } => {
                table.set(id, value.as_str())?
            }
            ConfigurationValue::Number { value, .. } => table.set(id, *value)?,
            ConfigurationValue::Checkbox { value, .. } => table.set(id, *value)?,
            ConfigurationValue::UInt { value, .. } => {
                table.set(id, i64::try_from(*value).unwrap_or(i64::MAX))?
            }
            ConfigurationValue::Duration { seconds, .. } => table.set(id, seconds * 1000.0)?,
            ConfigurationValue::LocalTime { minutes, .. } => {
                table.set(id, i64::from(*minutes) * 60_000)?
            }
            ConfigurationValue::Instant { epoch_millis, .. } => table.set(id, *epoch_millis)?,
        }
    }
    Ok(table)
}
