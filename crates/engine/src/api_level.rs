//! API level calculation.
//!
//! Each bundled or installed module ships an `*.apispec.lua` asset that maps
//! every exported symbol to the API level it first appeared in:
//!
//! ```lua
//! return {
//!     COLOR = 1,
//!     ["time"] = 1,
//!     ["shift"] = 2,
//! }
//! ```
//!
//! Nested tables are allowed and walked. The maximum level across every
//! specification loaded into an interpreter is the level that interpreter
//! provides.

use mlua::{Lua, Table, Value};

use crate::error::ScriptError;
use crate::modules::is_api_spec;
use crate::pool::VmLease;
use crate::values::{as_integer, lua_string, type_name};
use crate::vm;

/// Result of comparing a required level against what the host provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCompatibility {
    Compatible,
    RequiresNewer { required: u32, available: u32 },
}

impl ApiCompatibility {
    pub fn check(required: u32, available: u32) -> Self {
        if required <= available {
            Self::Compatible
        } else {
            Self::RequiresNewer { required, available }
        }
    }

    pub fn is_compatible(&self) -> bool {
        matches!(self, Self::Compatible)
    }
}

/// Highest API level declared by any specification the lease can see.
pub fn max_api_level(lease: &VmLease) -> Result<u32, ScriptError> {
    let lua = lease.lua();
    let modules = lease.modules();
    let mut max = 0;

    for asset in modules.asset_names().into_iter().filter(|name| is_api_spec(name)) {
        let source = modules
            .read_asset(&asset)
            .map_err(|e| ScriptError::Runtime(format!("{asset}: {e}")))?
            .ok_or_else(|| ScriptError::Runtime(format!("{asset}: listed but unreadable")))?;
        let level = spec_level(lua, &asset, &source)?;
        log::debug!("{asset}: api level {level}");
        max = max.max(level);
    }

    Ok(max)
}

fn spec_level(lua: &Lua, asset: &str, source: &str) -> Result<u32, ScriptError> {
    let value: Value = lua
        .load(source)
        .set_name(format!("@{asset}"))
        .set_environment(vm::new_env(lua)?)
        .eval()
        .map_err(|e| ScriptError::Runtime(format!("{asset}: {e}")))?;

    match value {
        Value::Table(table) => table_level(&table, asset),
        other => Err(ScriptError::Runtime(format!(
            "{asset}: api spec must return a table, got {}",
            type_name(&other)
        ))),
    }
}

fn table_level(table: &Table, asset: &str) -> Result<u32, ScriptError> {
    let mut max = 0;
    for pair in table.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        let level = match &value {
            Value::Table(nested) => table_level(nested, asset)?,
            other => as_integer(other)
                .and_then(|level| u32::try_from(level).ok())
                .ok_or_else(|| {
                    let symbol = match &key {
                        Value::String(s) => lua_string(s),
                        other => format!("{other:?}"),
                    };
                    ScriptError::Runtime(format!(
                        "{asset}: level of '{symbol}' must be a non-negative integer"
                    ))
                })?,
        };
        max = max.max(level);
    }
    Ok(max)
}
