// Engine settings
// Loaded from ~/.config/graphscript/engine.toml

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Interpreter count used when nothing is configured.
pub const DEFAULT_POOL_SIZE: usize = 8;

#[derive(Debug)]
pub enum SettingsError {
    /// File exists but could not be read.
    Io { path: PathBuf, message: String },
    /// TOML parse / deserialization error.
    Parse { path: PathBuf, message: String },
    /// Parsed, but a value is out of range.
    Invalid(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "cannot read {}: {message}", path.display()),
            Self::Parse { path, message } => write!(f, "invalid settings in {}: {message}", path.display()),
            Self::Invalid(msg) => write!(f, "invalid settings: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Upper bound on live interpreters.
    pub pool_size: usize,

    /// Extra module directories, searched before the bundled modules.
    pub module_dirs: Vec<PathBuf>,

    /// Declared host capability. None = use the computed maximum.
    pub host_api_level: Option<u32>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            module_dirs: Vec::new(),
            host_api_level: None,
        }
    }
}

impl EngineSettings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("graphscript")
            .join("engine.toml")
    }

    /// Load from the default location. A missing file means defaults.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let settings = Self::parse(&contents).map_err(|e| match e {
            SettingsError::Parse { message, .. } => SettingsError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;

        // Relative module dirs are relative to the settings file
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(settings.with_base_dir(base))
    }

    pub fn parse(contents: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(contents).map_err(|e| SettingsError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.pool_size == 0 {
            return Err(SettingsError::Invalid("pool_size must be at least 1".into()));
        }
        Ok(())
    }

    fn with_base_dir(mut self, base: &Path) -> Self {
        for dir in &mut self.module_dirs {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        self
    }
}
