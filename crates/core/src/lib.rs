// Core data model shared by the script engine and its hosts.
// Nothing in this crate touches the interpreter.

pub mod config_value;
pub mod data_point;
pub mod graph;
pub mod metadata;
pub mod sample;
pub mod translation;

pub use config_value::{ConfigType, ConfigurationValue};
pub use data_point::DataPoint;
pub use graph::GraphResult;
pub use metadata::{FunctionCatalogue, FunctionMetadata};
pub use sample::RawDataSample;
pub use translation::{LocalizationsTable, TranslatedString};
