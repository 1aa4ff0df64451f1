//! Conversions between Lua values and host types.

use chrono::{DateTime, FixedOffset};
use graphscript_core::data_point::timestamp_from_parts;
use graphscript_core::graph::ColorSpec;
use graphscript_core::DataPoint;
use mlua::{Lua, Table, Value};

use crate::error::ScriptError;

pub(crate) fn lua_string(s: &mlua::String) -> String {
    s.to_string_lossy().into()
}

/// Lua type name for error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    value.type_name()
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Number(n) => Some(*n),
        _ => None,
    }
}

/// Integers, and floats with no fractional part.
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

/// Typed reads from a script table, with the table's role in every message.
pub(crate) struct Fields<'a> {
    table: &'a Table,
    context: &'a str,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(table: &'a Table, context: &'a str) -> Self {
        Self { table, context }
    }

    fn err(&self, key: &str, expected: &str, found: &Value) -> ScriptError {
        ScriptError::decode(format!(
            "{}: field '{key}' must be {expected}, got {}",
            self.context,
            type_name(found)
        ))
    }

    fn missing(&self, key: &str) -> ScriptError {
        ScriptError::decode(format!("{}: missing required field '{key}'", self.context))
    }

    pub(crate) fn get(&self, key: &str) -> Result<Value, ScriptError> {
        Ok(self.table.get::<Value>(key)?)
    }

    pub(crate) fn opt_number(&self, key: &str) -> Result<Option<f64>, ScriptError> {
        match self.get(key)? {
            Value::Nil => Ok(None),
            value => as_number(&value).map(Some).ok_or_else(|| self.err(key, "a number", &value)),
        }
    }

    pub(crate) fn number(&self, key: &str) -> Result<f64, ScriptError> {
        self.opt_number(key)?.ok_or_else(|| self.missing(key))
    }

    pub(crate) fn opt_integer(&self, key: &str) -> Result<Option<i64>, ScriptError> {
        match self.get(key)? {
            Value::Nil => Ok(None),
            value => as_integer(&value).map(Some).ok_or_else(|| self.err(key, "an integer", &value)),
        }
    }

    /// Strings, with numbers coerced the way Lua's `tostring` would.
    pub(crate) fn opt_string(&self, key: &str) -> Result<Option<String>, ScriptError> {
        match self.get(key)? {
            Value::Nil => Ok(None),
            Value::String(s) => Ok(Some(lua_string(&s))),
            Value::Integer(i) => Ok(Some(i.to_string())),
            Value::Number(n) => Ok(Some(n.to_string())),
            value => Err(self.err(key, "a string", &value)),
        }
    }

    pub(crate) fn string(&self, key: &str) -> Result<String, ScriptError> {
        self.opt_string(key)?.ok_or_else(|| self.missing(key))
    }

    pub(crate) fn opt_bool(&self, key: &str) -> Result<Option<bool>, ScriptError> {
        match self.get(key)? {
            Value::Nil => Ok(None),
            Value::Boolean(b) => Ok(Some(b)),
            value => Err(self.err(key, "a boolean", &value)),
        }
    }

    pub(crate) fn opt_table(&self, key: &str) -> Result<Option<Table>, ScriptError> {
        match self.get(key)? {
            Value::Nil => Ok(None),
            Value::Table(t) => Ok(Some(t)),
            value => Err(self.err(key, "a table", &value)),
        }
    }

    pub(crate) fn table(&self, key: &str) -> Result<Table, ScriptError> {
        self.opt_table(key)?.ok_or_else(|| self.missing(key))
    }

    pub(crate) fn opt_time(&self, key: &str) -> Result<Option<DateTime<FixedOffset>>, ScriptError> {
        match self.get(key)? {
            Value::Nil => Ok(None),
            value => time_from_value(&value)
                .map(Some)
                .map_err(|e| ScriptError::decode(format!("{}: field '{key}': {}", self.context, e.diagnostic()))),
        }
    }

    pub(crate) fn time(&self, key: &str) -> Result<DateTime<FixedOffset>, ScriptError> {
        self.opt_time(key)?.ok_or_else(|| self.missing(key))
    }

    pub(crate) fn opt_color(&self, key: &str) -> Result<Option<ColorSpec>, ScriptError> {
        match self.get(key)? {
            Value::Nil => Ok(None),
            Value::String(s) => {
                let text = lua_string(&s);
                ColorSpec::from_hex(&text).map(Some).ok_or_else(|| {
                    ScriptError::decode(format!("{}: invalid color '{text}'", self.context))
                })
            }
            value => match as_integer(&value) {
                Some(index) if index >= 0 && index <= u32::MAX as i64 => {
                    Ok(Some(ColorSpec::Palette(index as u32)))
                }
                _ => Err(self.err(key, "a palette index or hex string", &value)),
            },
        }
    }
}

/// List elements `t[1]..t[n]`.
pub(crate) fn sequence(table: &Table) -> Result<Vec<Value>, ScriptError> {
    let mut out = Vec::new();
    for value in table.clone().sequence_values::<Value>() {
        out.push(value?);
    }
    Ok(out)
}

// ============================================================================
// Time
// ============================================================================

/// A time is either epoch millis or `{ timestamp = ms, offset = seconds }`.
/// Fractional millis are floored.
pub(crate) fn time_from_value(value: &Value) -> Result<DateTime<FixedOffset>, ScriptError> {
    let (millis, offset) = match value {
        Value::Table(t) => {
            let fields = Fields::new(t, "time");
            let millis = fields
                .opt_number("timestamp")?
                .ok_or_else(|| ScriptError::decode("time table has no timestamp"))?;
            let offset = fields.opt_integer("offset")?.unwrap_or(0);
            (millis.floor() as i64, offset)
        }
        other => match as_number(other) {
            Some(millis) => (millis.floor() as i64, 0),
            None => {
                return Err(ScriptError::decode(format!(
                    "expected a time, got {}",
                    type_name(other)
                )))
            }
        },
    };
    let offset = i32::try_from(offset)
        .map_err(|_| ScriptError::decode(format!("utc offset {offset} out of range")))?;
    timestamp_from_parts(millis, offset)
        .ok_or_else(|| ScriptError::decode(format!("time {millis} (offset {offset}) out of range")))
}

pub(crate) fn time_to_table(lua: &Lua, time: &DateTime<FixedOffset>) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("timestamp", time.timestamp_millis())?;
    table.set("offset", time.offset().local_minus_utc())?;
    Ok(table)
}

// ============================================================================
// Data points
// ============================================================================

pub(crate) fn data_point_to_table(lua: &Lua, point: &DataPoint) -> mlua::Result<Table> {
    let table = time_to_table(lua, &point.timestamp)?;
    table.set("featureId", point.feature_id)?;
    table.set("value", point.value)?;
    table.set("label", point.label.as_str())?;
    table.set("note", point.note.as_str())?;
    Ok(table)
}

/// Only `timestamp` is required; the rest default to zero or empty.
pub(crate) fn data_point_from_value(value: &Value) -> Result<DataPoint, ScriptError> {
    let Value::Table(table) = value else {
        return Err(ScriptError::decode(format!(
            "data point must be a table, got {}",
            type_name(value)
        )));
    };
    let fields = Fields::new(table, "data point");
    if fields.get("timestamp")?.is_nil() {
        return Err(ScriptError::decode("data point: missing required field 'timestamp'"));
    }
    let timestamp = time_from_value(value)?;
    Ok(DataPoint {
        timestamp,
        feature_id: fields.opt_integer("featureId")?.unwrap_or(0),
        value: fields.opt_number("value")?.unwrap_or(0.0),
        label: fields.opt_string("label")?.unwrap_or_default(),
        note: fields.opt_string("note")?.unwrap_or_default(),
    })
}
