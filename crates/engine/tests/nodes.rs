// Function node create/update flows.

use std::collections::BTreeMap;
use std::sync::Arc;

use graphscript_config::EngineSettings;
use graphscript_core::{ConfigurationValue, LocalizationsTable, TranslatedString};
use graphscript_engine::{InputValue, NodeProvider, ScriptEngine, ScriptError};

fn engine() -> ScriptEngine {
    ScriptEngine::new(EngineSettings { pool_size: 1, ..EngineSettings::default() }).unwrap()
}

const V1: &str = r#"
return {
    id = "scale",
    version = "1.0.0",
    title = "scale_title",
    inputCount = 1,
    config = {
        { id = "factor", type = "number", default = 2 },
        { id = "mode", type = "enum", options = { "sum", "avg" } },
        { id = "label", type = "text" },
    },
    generator = function(sources, config) end,
}
"#;

// factor keeps its type, mode changes type, label is dropped, window is new
const V2: &str = r#"
return {
    inputCount = 2,
    config = {
        { id = "factor", type = "number" },
        { id = "mode", type = "checkbox" },
        { id = "window", type = "duration", default = 60000 },
    },
    generator = function(sources, config) end,
}
"#;

fn translations() -> LocalizationsTable {
    let mut texts = BTreeMap::new();
    texts.insert("en".to_string(), "Scale".to_string());
    texts.insert("de".to_string(), "Skalieren".to_string());
    let mut table = LocalizationsTable::new();
    table.insert("scale_title".to_string(), texts);
    table
}

#[test]
fn create_restores_saved_values() {
    let engine = engine();
    let provider = NodeProvider::new(&engine);
    let saved = vec![
        ConfigurationValue::Number { id: "factor".into(), value: 5.0 },
        // wrong type for "label": ignored
        ConfigurationValue::Checkbox { id: "label".into(), value: true },
        ConfigurationValue::Text { id: "stale".into(), value: "x".into() },
    ];
    let node = provider.create_node(7, V1, Some(4), &saved, translations());

    assert!(node.is_healthy());
    assert_eq!(node.input_count, 1);
    assert_eq!(
        node.configuration_values(),
        vec![
            ConfigurationValue::Number { id: "factor".into(), value: 5.0 },
            ConfigurationValue::Enum { id: "mode".into(), value: "sum".into() },
            ConfigurationValue::Text { id: "label".into(), value: String::new() },
        ]
    );
    let metadata = node.metadata.as_ref().unwrap();
    match metadata.title.as_ref().unwrap() {
        TranslatedString::Translations(map) => assert_eq!(map["de"], "Skalieren"),
        other => panic!("expected translations, got {other:?}"),
    }
    assert!(node.translations.contains_key("scale_title"));
}

#[test]
fn create_falls_back_on_broken_script() {
    let engine = engine();
    let provider = NodeProvider::new(&engine);
    let saved = vec![ConfigurationValue::Number { id: "factor".into(), value: 5.0 }];

    let node = provider.create_node(1, "return {", Some(3), &saved, LocalizationsTable::new());
    assert!(!node.is_healthy());
    assert!(matches!(node.error, Some(ScriptError::Resolution { .. })));
    assert_eq!(node.input_count, 3);
    assert!(node.config.is_empty());

    let node = provider.create_node(2, "return 1", None, &saved, LocalizationsTable::new());
    assert_eq!(node.input_count, 1);
    assert!(node.error.is_some());
}

#[test]
fn update_keeps_inputs_whose_id_and_type_survive() {
    let engine = engine();
    let provider = NodeProvider::new(&engine);
    let mut node = provider.create_node(3, V1, None, &[], translations());
    let factor = Arc::clone(&node.config[0].input);
    let mode = Arc::clone(&node.config[1].input);
    factor.set(InputValue::Number("12.5".into())).unwrap();

    provider.update_node(&mut node, V2);

    assert!(node.is_healthy());
    assert_eq!(node.script, V2);
    assert_eq!(node.input_count, 2);
    let ids: Vec<&str> = node.config.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["factor", "mode", "window"]);
    assert!(Arc::ptr_eq(&node.config[0].input, &factor));
    assert!(!Arc::ptr_eq(&node.config[1].input, &mode));
    assert_eq!(node.config[1].input.get(), InputValue::Checkbox(false));
    assert_eq!(node.config[2].input.get(), InputValue::Duration(60.0));
    assert_eq!(
        node.configuration_values()[0],
        ConfigurationValue::Number { id: "factor".into(), value: 12.5 }
    );
    // translations seen before stay available
    assert!(node.translations.contains_key("scale_title"));
}

#[test]
fn failed_update_keeps_previous_shape() {
    let engine = engine();
    let provider = NodeProvider::new(&engine);
    let mut node = provider.create_node(4, V1, None, &[], LocalizationsTable::new());
    let before = node.configuration_values();

    provider.update_node(&mut node, "return { generator = 3 }");

    assert_eq!(node.script, "return { generator = 3 }");
    assert!(matches!(node.error, Some(ScriptError::Metadata(_))));
    assert_eq!(node.input_count, 1);
    assert_eq!(node.configuration_values(), before);

    // fixing the script clears the error
    provider.update_node(&mut node, V1);
    assert!(node.is_healthy());
}
