// Configuration loading

pub mod engine;

pub use engine::{EngineSettings, SettingsError};
