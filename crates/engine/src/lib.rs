//! Embedded Lua runtime for user graph and function scripts.
//!
//! ```text
//! ScriptEngine ── VmPool ── VmLease ── resolver ── decode / FunctionOutput
//!                    │                     │
//!                 modules              bridge (data sources)
//! ```
//!
//! Hosts construct one [`ScriptEngine`] and share it. Everything that
//! touches an interpreter goes through a [`VmLease`] from the pool.

pub mod api_level;
pub mod bridge;
pub mod catalogue;
pub mod configuration;
pub mod decode;
pub mod engine;
pub mod error;
pub mod function;
pub mod metadata;
pub mod modules;
pub mod node;
pub mod pool;
pub mod resolver;
pub mod time_api;
mod values;
mod vm;

pub use api_level::ApiCompatibility;
pub use configuration::{ConfigEntry, ConfigurationInput, InputValue};
pub use engine::ScriptEngine;
pub use error::ScriptError;
pub use function::FunctionOutput;
pub use modules::{BundledModules, DirectoryModules, LayeredModules, MemoryModules, ModuleSource};
pub use node::{FunctionNode, NodeProvider};
pub use pool::{VmLease, VmPool};

/// API level provided by the bundled `tng` modules.
pub const HOST_API_LEVEL: u32 = 3;
