//! Function nodes: a script plus the configuration a user has entered.
//!
//! Creating or updating a node never fails. When metadata cannot be
//! extracted the node falls back to a safe shape and records the error so
//! the editor can show it:
//! - on create, the stored input count (or 1) and no configuration
//! - on update, the last good input count and configuration are kept and
//!   only the script text changes

use graphscript_core::{ConfigurationValue, FunctionMetadata, LocalizationsTable};

use crate::configuration::{self, ConfigEntry};
use crate::engine::ScriptEngine;
use crate::error::ScriptError;

#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub node_id: u64,
    pub script: String,
    pub input_count: u32,
    pub config: Vec<ConfigEntry>,
    /// Last successfully extracted metadata.
    pub metadata: Option<FunctionMetadata>,
    /// Translations carried forward across re-resolution.
    pub translations: LocalizationsTable,
    pub error: Option<ScriptError>,
}

impl FunctionNode {
    pub fn configuration_values(&self) -> Vec<ConfigurationValue> {
        configuration::encode(&self.config)
    }

    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

pub struct NodeProvider<'a> {
    engine: &'a ScriptEngine,
}

impl<'a> NodeProvider<'a> {
    pub fn new(engine: &'a ScriptEngine) -> Self {
        Self { engine }
    }

    /// Build a node from persisted state.
    pub fn create_node(
        &self,
        node_id: u64,
        script: &str,
        stored_input_count: Option<u32>,
        stored_config: &[ConfigurationValue],
        translations: LocalizationsTable,
    ) -> FunctionNode {
        match self.engine.function_metadata(script, Some(&translations)) {
            Ok(metadata) => {
                let config = configuration::restore(&metadata, stored_config);
                let mut translations = translations;
                merge(&mut translations, &metadata.used_translations);
                FunctionNode {
                    node_id,
                    script: script.to_string(),
                    input_count: metadata.input_count,
                    config,
                    metadata: Some(metadata),
                    translations,
                    error: None,
                }
            }
            Err(err) => {
                log::warn!("node {node_id}: falling back after metadata failure: {err}");
                FunctionNode {
                    node_id,
                    script: script.to_string(),
                    input_count: stored_input_count.unwrap_or(1),
                    config: Vec::new(),
                    metadata: None,
                    translations,
                    error: Some(err),
                }
            }
        }
    }

    /// Re-derive a node after its script was edited.
    pub fn update_node(&self, node: &mut FunctionNode, new_script: &str) {
        node.script = new_script.to_string();
        match self.engine.function_metadata(new_script, Some(&node.translations)) {
            Ok(metadata) => {
                node.config = configuration::reconcile(&node.config, &metadata);
                node.input_count = metadata.input_count;
                merge(&mut node.translations, &metadata.used_translations);
                node.metadata = Some(metadata);
                node.error = None;
            }
            Err(err) => {
                log::warn!("node {}: keeping previous configuration: {err}", node.node_id);
                node.error = Some(err);
            }
        }
    }
}

fn merge(into: &mut LocalizationsTable, from: &LocalizationsTable) {
    for (key, texts) in from {
        into.entry(key.clone()).or_insert_with(|| texts.clone());
    }
}
