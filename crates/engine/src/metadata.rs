//! Function metadata extraction.
//!
//! Only the declarative surface of a function script is evaluated: the
//! chunk runs to produce its table (or bare generator), and the generator
//! itself is never called.

use std::collections::{BTreeMap, HashSet};

use graphscript_core::metadata::{ConfigKind, ConfigSpec, EnumOption, FunctionMetadata, Version};
use graphscript_core::{ConfigType, LocalizationsTable, TranslatedString};
use mlua::{Table, Value};

use crate::error::ScriptError;
use crate::pool::VmLease;
use crate::resolver;
use crate::values::{lua_string, sequence, type_name, Fields};

const MILLIS_PER_MINUTE: i64 = 60_000;
const MINUTES_PER_DAY: i64 = 24 * 60;

pub fn extract(
    lease: &VmLease,
    script: &str,
    translations: Option<&LocalizationsTable>,
) -> Result<FunctionMetadata, ScriptError> {
    let resolved = resolver::resolve(script, lease)?;
    let empty = LocalizationsTable::new();
    let mut reader = Reader {
        translations: translations.unwrap_or(&empty),
        used: LocalizationsTable::new(),
    };
    reader.metadata(script, &resolved.value).map_err(as_metadata)
}

/// Decode failures found while reading metadata are metadata errors.
fn as_metadata(err: ScriptError) -> ScriptError {
    match err {
        ScriptError::Decode(msg) => ScriptError::Metadata(msg),
        other => other,
    }
}

/// The generator of a resolved function script.
pub(crate) fn generator_of(value: &Value) -> Result<mlua::Function, ScriptError> {
    match value {
        Value::Function(f) => Ok(f.clone()),
        Value::Table(t) => match t.get::<Value>("generator")? {
            Value::Function(f) => Ok(f),
            other => Err(ScriptError::Metadata(format!(
                "'generator' must be a function, got {}",
                type_name(&other)
            ))),
        },
        other => Err(ScriptError::Metadata(format!(
            "function script must return a function or a table, got {}",
            type_name(other)
        ))),
    }
}

struct Reader<'a> {
    translations: &'a LocalizationsTable,
    used: LocalizationsTable,
}

impl Reader<'_> {
    fn metadata(&mut self, script: &str, value: &Value) -> Result<FunctionMetadata, ScriptError> {
        let table = match value {
            Value::Function(_) => return Ok(FunctionMetadata::bare(script)),
            Value::Table(table) => table,
            other => {
                return Err(ScriptError::decode(format!(
                    "function script must return a function or a table, got {}",
                    type_name(other)
                )))
            }
        };
        // Validates the generator without calling it
        generator_of(value)?;

        let fields = Fields::new(table, "function");
        let input_count = match fields.opt_integer("inputCount")? {
            None => 1,
            Some(n) if (0..=u32::MAX as i64).contains(&n) => n as u32,
            Some(n) => return Err(ScriptError::decode(format!("inputCount {n} is out of range"))),
        };

        let version = match fields.opt_string("version")? {
            None => None,
            Some(text) => Some(text.parse::<Version>().map_err(ScriptError::Decode)?),
        };

        let title = self.opt_translated(&fields, "title")?;
        let description = self.opt_translated(&fields, "description")?;

        let categories = match fields.opt_table("categories")? {
            None => Vec::new(),
            Some(list) => sequence(&list)?
                .iter()
                .map(|value| self.translated("category", value))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let config = match fields.opt_table("config")? {
            None => Vec::new(),
            Some(list) => self.config_list(&list)?,
        };

        Ok(FunctionMetadata {
            script: script.to_string(),
            id: fields.opt_string("id")?,
            version,
            title,
            description,
            categories,
            input_count,
            config,
            used_translations: std::mem::take(&mut self.used),
        })
    }

    fn localize(&mut self, text: TranslatedString) -> TranslatedString {
        let (text, used) = text.localize(self.translations);
        if let Some(key) = used {
            if let Some(found) = self.translations.get(&key) {
                self.used.insert(key, found.clone());
            }
        }
        text
    }

    /// A plain string or a table of locale code to text.
    fn translated(&mut self, what: &str, value: &Value) -> Result<TranslatedString, ScriptError> {
        let text = match value {
            Value::String(s) => TranslatedString::Simple(lua_string(s)),
            Value::Table(t) => {
                let mut map = BTreeMap::new();
                for pair in t.clone().pairs::<Value, Value>() {
                    let (locale, text) = pair?;
                    match (locale, text) {
                        (Value::String(locale), Value::String(text)) => {
                            map.insert(lua_string(&locale), lua_string(&text));
                        }
                        _ => {
                            return Err(ScriptError::decode(format!(
                                "{what}: translations must map locale strings to strings"
                            )))
                        }
                    }
                }
                TranslatedString::Translations(map)
            }
            other => {
                return Err(ScriptError::decode(format!(
                    "{what} must be a string or a translation table, got {}",
                    type_name(other)
                )))
            }
        };
        Ok(self.localize(text))
    }

    fn opt_translated(&mut self, fields: &Fields<'_>, key: &str) -> Result<Option<TranslatedString>, ScriptError> {
        match fields.get(key)? {
            Value::Nil => Ok(None),
            value => self.translated(key, &value).map(Some),
        }
    }

    fn config_list(&mut self, list: &Table) -> Result<Vec<ConfigSpec>, ScriptError> {
        let mut seen = HashSet::new();
        let mut specs = Vec::new();
        for (i, value) in sequence(list)?.iter().enumerate() {
            let Value::Table(entry) = value else {
                return Err(ScriptError::decode(format!(
                    "config entry {} must be a table, got {}",
                    i + 1,
                    type_name(value)
                )));
            };
            let spec = self.config_spec(i + 1, entry)?;
            if !seen.insert(spec.id.clone()) {
                return Err(ScriptError::decode(format!("duplicate config id '{}'", spec.id)));
            }
            specs.push(spec);
        }
        Ok(specs)
    }

    fn config_spec(&mut self, index: usize, entry: &Table) -> Result<ConfigSpec, ScriptError> {
        let context = format!("config entry {index}");
        let fields = Fields::new(entry, &context);
        let id = fields.string("id")?;
        let tag = fields.string("type")?;
        let config_type = ConfigType::from_tag(&tag)
            .ok_or_else(|| ScriptError::decode(format!("{context}: unknown config type '{tag}'")))?;
        let name = self.opt_translated(&fields, "name")?;

        let kind = match config_type {
            ConfigType::Text => ConfigKind::Text { default: fields.opt_string("default")? },
            ConfigType::Number => ConfigKind::Number { default: fields.opt_number("default")? },
            ConfigType::Checkbox => ConfigKind::Checkbox { default: fields.opt_bool("default")? },
            ConfigType::Enum => self.enum_kind(&context, &fields)?,
            ConfigType::UInt => ConfigKind::UInt {
                default: match fields.opt_integer("default")? {
                    None => None,
                    Some(n) => Some(u64::try_from(n).map_err(|_| {
                        ScriptError::decode(format!("{context}: default must not be negative"))
                    })?),
                },
            },
            ConfigType::Duration => ConfigKind::Duration {
                default_seconds: fields.opt_number("default")?.map(|ms| ms / 1000.0),
            },
            ConfigType::LocalTime => ConfigKind::LocalTime {
                default_minutes: match fields.opt_integer("default")? {
                    None => None,
                    Some(ms) => {
                        let minutes = ms.div_euclid(MILLIS_PER_MINUTE);
                        if !(0..MINUTES_PER_DAY).contains(&minutes) {
                            return Err(ScriptError::decode(format!(
                                "{context}: local time default must be within one day"
                            )));
                        }
                        Some(minutes as u32)
                    }
                },
            },
            ConfigType::Instant => ConfigKind::Instant { default_epoch_millis: fields.opt_integer("default")? },
        };

        Ok(ConfigSpec { id, name, kind })
    }

    fn enum_kind(&mut self, context: &str, fields: &Fields<'_>) -> Result<ConfigKind, ScriptError> {
        let mut options = Vec::new();
        for value in sequence(&fields.table("options")?)? {
            let option = match &value {
                Value::String(s) => {
                    let id = lua_string(s);
                    let name = self.localize(TranslatedString::Simple(id.clone()));
                    EnumOption { id, name }
                }
                Value::Table(t) => {
                    let option = Fields::new(t, context);
                    let id = option.string("id")?;
                    let name = match self.opt_translated(&option, "name")? {
                        Some(name) => name,
                        None => self.localize(TranslatedString::Simple(id.clone())),
                    };
                    EnumOption { id, name }
                }
                other => {
                    return Err(ScriptError::decode(format!(
                        "{context}: enum option must be a string or table, got {}",
                        type_name(other)
                    )))
                }
            };
            options.push(option);
        }
        if options.is_empty() {
            return Err(ScriptError::decode(format!("{context}: enum has no options")));
        }

        let default = fields.opt_string("default")?;
        if let Some(default) = &default {
            if !options.iter().any(|o| &o.id == default) {
                return Err(ScriptError::decode(format!(
                    "{context}: default '{default}' is not one of the options"
                )));
            }
        }
        Ok(ConfigKind::Enum { options, default })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::BundledModules;
    use crate::pool::VmPool;
    use std::sync::Arc;

    fn extract_from(script: &str, translations: Option<&LocalizationsTable>) -> Result<FunctionMetadata, ScriptError> {
        let pool = VmPool::new(Arc::new(BundledModules), 1).unwrap();
        let lease = pool.acquire().unwrap();
        extract(&lease, script, translations)
    }

    #[test]
    fn bare_generator_defaults() {
        let meta = extract_from("return function(sources) end", None).unwrap();
        assert_eq!(meta.input_count, 1);
        assert!(meta.config.is_empty());
        assert!(meta.title.is_none());
    }

    #[test]
    fn table_shape_reads_declarations() {
        let meta = extract_from(
            r#"return {
                id = "moving-average",
                version = "1.2.0",
                inputCount = 2,
                title = { en = "Moving average", de = "Gleitender Durchschnitt" },
                config = {
                    { id = "window", type = "duration", name = "Window", default = 3600000 },
                    { id = "label", type = "text" },
                    { id = "start", type = "localtime", default = 5400000 },
                },
                generator = function(sources, config) end,
            }"#,
            None,
        )
        .unwrap();
        assert_eq!(meta.id.as_deref(), Some("moving-average"));
        assert_eq!(meta.version, Some(Version::new(1, 2, 0)));
        assert_eq!(meta.input_count, 2);
        assert_eq!(meta.config.len(), 3);
        assert_eq!(meta.config[0].name, Some(TranslatedString::Simple("Window".into())));
        assert_eq!(meta.config[0].kind, ConfigKind::Duration { default_seconds: Some(3600.0) });
        assert!(meta.config[1].name.is_none());
        assert_eq!(meta.config[2].kind, ConfigKind::LocalTime { default_minutes: Some(90) });
        match meta.title {
            Some(TranslatedString::Translations(map)) => assert_eq!(map["de"], "Gleitender Durchschnitt"),
            other => panic!("unexpected title {other:?}"),
        }
    }

    #[test]
    fn translation_keys_are_resolved_and_tracked() {
        let mut table = LocalizationsTable::new();
        table.insert("_sum".into(), BTreeMap::from([("en".to_string(), "Sum".to_string())]));
        table.insert("_unused".into(), BTreeMap::from([("en".to_string(), "Unused".to_string())]));
        let meta = extract_from(
            r#"return {
                title = "_sum",
                config = { { id = "mode", type = "enum", options = { "_sum", "avg" } } },
                generator = function() end,
            }"#,
            Some(&table),
        )
        .unwrap();
        assert!(matches!(meta.title, Some(TranslatedString::Translations(_))));
        assert_eq!(meta.used_translations.len(), 1);
        assert!(meta.used_translations.contains_key("_sum"));
        let ConfigKind::Enum { options, .. } = &meta.config[0].kind else { panic!("expected enum") };
        assert_eq!(options[1].name, TranslatedString::Simple("avg".into()));
    }

    #[test]
    fn generator_is_not_run() {
        let meta = extract_from(
            "return { generator = function() error('should not run') end }",
            None,
        );
        assert!(meta.is_ok());
    }

    #[test]
    fn malformed_shapes_are_metadata_errors() {
        let cases = [
            "return 5",
            "return { inputCount = 1 }",
            "return { generator = 1 }",
            "return { config = { { id = 'x', type = 'colour' } }, generator = function() end }",
            "return { config = { { id = 'x', type = 'text' }, { id = 'x', type = 'number' } }, generator = function() end }",
            "return { config = { { type = 'text' } }, generator = function() end }",
            "return { config = { { id = 'x', type = 'enum', options = {} } }, generator = function() end }",
            "return { version = 'one', generator = function() end }",
            "return { inputCount = -1, generator = function() end }",
        ];
        for script in cases {
            let err = extract_from(script, None).unwrap_err();
            assert!(matches!(err, ScriptError::Metadata(_)), "{script}: {err:?}");
        }
    }

    #[test]
    fn syntax_errors_stay_resolution_errors() {
        let err = extract_from("return {", None).unwrap_err();
        assert!(matches!(err, ScriptError::Resolution { .. }));
    }
}
