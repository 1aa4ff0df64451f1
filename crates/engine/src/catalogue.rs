//! Function catalogue parsing.
//!
//! A catalogue script returns
//!
//! ```lua
//! return {
//!     functions = {
//!         ["moving-average"] = { version = "2.0.0", script = [[ ... ]], deprecated = 4 },
//!     },
//!     translations = { _window = { en = "Window", de = "Fenster" } },
//! }
//! ```
//!
//! A function is published when its major version is at most the host's
//! API level and it is not deprecated at or below that level. Entries that
//! are malformed, or whose own script fails metadata extraction, are
//! skipped with a warning so one bad function cannot hide the rest.

use std::collections::BTreeMap;

use graphscript_core::metadata::Version;
use graphscript_core::{FunctionCatalogue, LocalizationsTable};
use mlua::{Table, Value};

use crate::error::ScriptError;
use crate::metadata;
use crate::pool::VmLease;
use crate::resolver;
use crate::values::{lua_string, type_name, Fields};

struct CatalogueEntry {
    id: String,
    version: Version,
    script: String,
    deprecated: Option<u32>,
}

impl CatalogueEntry {
    fn available_at(&self, api_level: u32) -> bool {
        self.version.major <= api_level && self.deprecated.map_or(true, |level| level > api_level)
    }
}

pub fn parse(lease: &VmLease, catalogue_script: &str, api_level: u32) -> Result<FunctionCatalogue, ScriptError> {
    let resolved = resolver::resolve(catalogue_script, lease)?;
    let Value::Table(root) = &resolved.value else {
        return Err(ScriptError::Catalogue(format!(
            "catalogue must return a table, got {}",
            type_name(&resolved.value)
        )));
    };
    let fields = Fields::new(root, "catalogue");

    let translations = match fields.opt_table("translations").map_err(as_catalogue)? {
        Some(table) => translations(&table)?,
        None => LocalizationsTable::new(),
    };

    let functions = fields
        .opt_table("functions")
        .map_err(as_catalogue)?
        .ok_or_else(|| ScriptError::Catalogue("catalogue has no 'functions' table".into()))?;

    let mut entries = Vec::new();
    for pair in functions.pairs::<Value, Value>() {
        let (key, value) = pair?;
        match entry(&key, &value) {
            Ok(entry) => entries.push(entry),
            Err(err) => log::warn!("skipping catalogue entry: {err}"),
        }
    }
    entries.sort_by(|a, b| a.id.cmp(&b.id));

    let mut catalogue = FunctionCatalogue { functions: Vec::new(), translations };
    for entry in entries.into_iter().filter(|e| e.available_at(api_level)) {
        match metadata::extract(lease, &entry.script, Some(&catalogue.translations)) {
            Ok(mut meta) => {
                meta.id.get_or_insert_with(|| entry.id.clone());
                meta.version.get_or_insert(entry.version);
                catalogue.functions.push(meta);
            }
            Err(err) => log::warn!("skipping catalogue function '{}': {err}", entry.id),
        }
    }

    log::debug!(
        "catalogue: {} function(s) available at api level {api_level}",
        catalogue.functions.len()
    );
    Ok(catalogue)
}

fn as_catalogue(err: ScriptError) -> ScriptError {
    match err {
        ScriptError::Decode(msg) => ScriptError::Catalogue(msg),
        other => other,
    }
}

fn entry(key: &Value, value: &Value) -> Result<CatalogueEntry, ScriptError> {
    let Value::String(id) = key else {
        return Err(ScriptError::Catalogue(format!("function id must be a string, got {}", type_name(key))));
    };
    let id = lua_string(id);
    let Value::Table(table) = value else {
        return Err(ScriptError::Catalogue(format!("'{id}' must be a table, got {}", type_name(value))));
    };

    let context = format!("function '{id}'");
    let fields = Fields::new(table, &context);
    let version = fields
        .string("version")
        .map_err(as_catalogue)?
        .parse::<Version>()
        .map_err(|e| ScriptError::Catalogue(format!("{context}: {e}")))?;
    let script = fields.string("script").map_err(as_catalogue)?;
    let deprecated = match fields.opt_integer("deprecated").map_err(as_catalogue)? {
        None => None,
        Some(level) => Some(u32::try_from(level).map_err(|_| {
            ScriptError::Catalogue(format!("{context}: deprecated level {level} out of range"))
        })?),
    };

    Ok(CatalogueEntry { id, version, script, deprecated })
}

fn translations(table: &Table) -> Result<LocalizationsTable, ScriptError> {
    let mut out = LocalizationsTable::new();
    for pair in table.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        let (Value::String(key), Value::Table(locales)) = (&key, &value) else {
            log::warn!("ignoring malformed translation entry");
            continue;
        };
        let mut texts = BTreeMap::new();
        for pair in locales.clone().pairs::<Value, Value>() {
            if let (Value::String(locale), Value::String(text)) = pair? {
                texts.insert(lua_string(&locale), lua_string(&text));
            }
        }
        out.insert(lua_string(key), texts);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::BundledModules;
    use crate::pool::VmPool;
    use graphscript_core::TranslatedString;
    use std::sync::Arc;

    const CATALOGUE: &str = r#"
        local bare = "return function(sources) end"
        return {
            functions = {
                alpha = { version = "1.0.0", script = bare },
                beta = { version = "4.1.0", script = bare },
                gamma = { version = "2.0.0", script = bare, deprecated = 3 },
                delta = { version = "2.0.0", script = bare, deprecated = 5 },
                broken = { version = "1.0.0", script = "return {" },
                noversion = { script = bare },
                titled = { version = "1.0.0", script = "return { title = '_t', generator = function() end }" },
            },
            translations = {
                _t = { en = "Titled", fr = "Titré" },
            },
        }
    "#;

    fn parse_at(level: u32) -> FunctionCatalogue {
        let pool = VmPool::new(Arc::new(BundledModules), 1).unwrap();
        let lease = pool.acquire().unwrap();
        parse(&lease, CATALOGUE, level).unwrap()
    }

    fn ids(catalogue: &FunctionCatalogue) -> Vec<&str> {
        catalogue.functions.iter().filter_map(|f| f.id.as_deref()).collect()
    }

    #[test]
    fn filters_by_version_and_deprecation() {
        assert_eq!(ids(&parse_at(3)), vec!["alpha", "delta", "titled"]);
        assert_eq!(ids(&parse_at(2)), vec!["alpha", "delta", "gamma", "titled"]);
        assert_eq!(ids(&parse_at(5)), vec!["alpha", "beta", "titled"]);
    }

    #[test]
    fn entry_version_fills_missing_metadata() {
        let catalogue = parse_at(3);
        let alpha = &catalogue.functions[0];
        assert_eq!(alpha.version, Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn translations_reach_function_metadata() {
        let catalogue = parse_at(3);
        assert_eq!(catalogue.translations["_t"]["fr"], "Titré");
        let titled = catalogue.functions.iter().find(|f| f.id.as_deref() == Some("titled")).unwrap();
        assert!(matches!(titled.title, Some(TranslatedString::Translations(_))));
    }

    #[test]
    fn missing_functions_table_is_an_error() {
        let pool = VmPool::new(Arc::new(BundledModules), 1).unwrap();
        let lease = pool.acquire().unwrap();
        assert!(matches!(parse(&lease, "return {}", 3), Err(ScriptError::Catalogue(_))));
        assert!(matches!(parse(&lease, "return 1", 3), Err(ScriptError::Catalogue(_))));
    }
}
