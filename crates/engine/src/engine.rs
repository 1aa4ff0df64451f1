//! Script execution façade.
//!
//! [`ScriptEngine`] is the one entry point hosts use. Every call leases an
//! interpreter for exactly as long as it needs one:
//! - graph scripts, metadata, API level and catalogue calls release the
//!   lease before returning
//! - function scripts hand the lease to the returned [`FunctionOutput`],
//!   which releases it when dropped
//!
//! Holding a `FunctionOutput` while making another call on the same thread
//! needs a second interpreter; with a pool of one that call waits forever.

use std::sync::Arc;

use graphscript_config::EngineSettings;
use graphscript_core::graph::{FailureStage, GraphFailure};
use graphscript_core::{
    ConfigurationValue, FunctionCatalogue, FunctionMetadata, GraphResult, LocalizationsTable, RawDataSample,
};
use mlua::Value;

use crate::api_level::{self, ApiCompatibility};
use crate::bridge::{self, SharedCursor};
use crate::catalogue;
use crate::configuration;
use crate::decode;
use crate::error::ScriptError;
use crate::function::FunctionOutput;
use crate::metadata;
use crate::modules::{BundledModules, DirectoryModules, LayeredModules, ModuleSource};
use crate::pool::{VmLease, VmPool};
use crate::resolver;

pub struct ScriptEngine {
    pool: VmPool,
    settings: EngineSettings,
}

impl ScriptEngine {
    /// Engine over the bundled modules, with any configured module
    /// directories layered on top.
    pub fn new(settings: EngineSettings) -> Result<Self, ScriptError> {
        let mut modules = LayeredModules::new();
        for dir in &settings.module_dirs {
            modules = modules.push(Arc::new(DirectoryModules::new(dir)));
        }
        let modules = modules.push(Arc::new(BundledModules));
        Self::with_modules(settings, Arc::new(modules))
    }

    pub fn with_modules(settings: EngineSettings, modules: Arc<dyn ModuleSource>) -> Result<Self, ScriptError> {
        let pool = VmPool::new(modules, settings.pool_size)?;
        Ok(Self { pool, settings })
    }

    pub fn pool(&self) -> &VmPool {
        &self.pool
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ========================================================================
    // Graph scripts
    // ========================================================================

    /// Run a graph script against named data sources. Never fails: every
    /// problem is reported as [`GraphResult::Error`].
    pub fn run_graph_script(&self, script: &str, sources: Vec<(String, RawDataSample)>) -> GraphResult {
        let cursors: Vec<(String, SharedCursor)> = sources
            .into_iter()
            .map(|(name, sample)| (name, bridge::shared_cursor(sample)))
            .collect();

        let result = self.graph_result(script, &cursors);
        for (_, cursor) in &cursors {
            cursor.lock().dispose();
        }

        result.unwrap_or_else(|err| {
            log::error!("graph script failed: {err}");
            GraphResult::Error(GraphFailure {
                stage: failure_stage(&err),
                diagnostic: err.diagnostic().to_string(),
            })
        })
    }

    fn graph_result(&self, script: &str, cursors: &[(String, SharedCursor)]) -> Result<GraphResult, ScriptError> {
        let lease = self.pool.acquire()?;
        let resolved = resolver::resolve(script, &lease)?;

        let value = match resolved.value {
            Value::Function(f) => {
                let lua = lease.lua();
                let sources = lua.create_table()?;
                for (name, cursor) in cursors {
                    sources.set(name.as_str(), bridge::source_table(lua, name, cursor)?)?;
                }
                f.call::<Value>(sources)?
            }
            value => value,
        };

        decode::decode(&value)
    }

    // ========================================================================
    // Function scripts
    // ========================================================================

    /// Start a function script. Inputs are passed to the generator as a
    /// list in the given order. The returned iterator holds its lease until
    /// dropped.
    pub fn run_function_script(
        &self,
        script: &str,
        inputs: Vec<RawDataSample>,
        config: &[ConfigurationValue],
    ) -> Result<FunctionOutput, ScriptError> {
        let cursors: Vec<SharedCursor> = inputs.into_iter().map(bridge::shared_cursor).collect();

        let lease = match self.pool.acquire() {
            Ok(lease) => lease,
            Err(err) => {
                dispose_all(&cursors);
                return Err(err);
            }
        };

        match start_function(&lease, script, &cursors, config) {
            Ok((thread, sources, config)) => Ok(FunctionOutput::new(thread, sources, config, cursors, lease)),
            Err(err) => {
                dispose_all(&cursors);
                Err(err)
            }
        }
    }

    // ========================================================================
    // Metadata and API levels
    // ========================================================================

    pub fn function_metadata(
        &self,
        script: &str,
        translations: Option<&LocalizationsTable>,
    ) -> Result<FunctionMetadata, ScriptError> {
        let lease = self.pool.acquire()?;
        metadata::extract(&lease, script, translations)
    }

    /// Highest API level the loaded module specifications declare.
    pub fn max_api_level(&self) -> Result<u32, ScriptError> {
        let lease = self.pool.acquire()?;
        api_level::max_api_level(&lease)
    }

    /// The host's declared level, or the computed maximum.
    pub fn available_api_level(&self) -> Result<u32, ScriptError> {
        match self.settings.host_api_level {
            Some(level) => Ok(level),
            None => self.max_api_level(),
        }
    }

    pub fn check_api_level(&self, required: u32) -> Result<ApiCompatibility, ScriptError> {
        let available = self.available_api_level()?;
        let compatibility = ApiCompatibility::check(required, available);
        if !compatibility.is_compatible() {
            log::warn!("script requires api level {required}, host provides {available}");
        }
        Ok(compatibility)
    }

    /// Functions from a catalogue script that this host can run.
    pub fn parse_catalogue(&self, catalogue_script: &str) -> Result<FunctionCatalogue, ScriptError> {
        let lease = self.pool.acquire()?;
        let level = match self.settings.host_api_level {
            Some(level) => level,
            None => api_level::max_api_level(&lease)?,
        };
        catalogue::parse(&lease, catalogue_script, level)
    }
}

fn start_function(
    lease: &VmLease,
    script: &str,
    cursors: &[SharedCursor],
    config: &[ConfigurationValue],
) -> Result<(mlua::Thread, mlua::Table, mlua::Table), ScriptError> {
    let resolved = resolver::resolve(script, lease)?;
    let generator = metadata::generator_of(&resolved.value)?;

    let lua = lease.lua();
    let sources = lua.create_table()?;
    for (i, cursor) in cursors.iter().enumerate() {
        let name = format!("input{}", i + 1);
        sources.raw_set(i + 1, bridge::source_table(lua, &name, cursor)?)?;
    }
    let config = configuration::config_table(lua, config)?;
    let thread = lua.create_thread(generator)?;
    Ok((thread, sources, config))
}

fn dispose_all(cursors: &[SharedCursor]) {
    for cursor in cursors {
        cursor.lock().dispose();
    }
}

fn failure_stage(err: &ScriptError) -> FailureStage {
    match err {
        ScriptError::Bootstrap(_) => FailureStage::Lease,
        ScriptError::Resolution { .. } => FailureStage::Resolution,
        ScriptError::Runtime(_) => FailureStage::Execution,
        ScriptError::Decode(_) | ScriptError::Metadata(_) | ScriptError::Catalogue(_) => FailureStage::Decode,
    }
}
