use std::fmt;

/// Failure of one script operation.
///
/// Resolution and execution errors are local to the invocation that hit
/// them; only `Bootstrap` means the runtime itself is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// An interpreter could not be built (bad module assets, allocation).
    Bootstrap(String),
    /// Parse failure or a missing module while loading a script.
    Resolution { script: String, diagnostic: String },
    /// The script raised an error while running.
    Runtime(String),
    /// The script returned a value of the wrong shape.
    Decode(String),
    /// The script's declared metadata is malformed.
    Metadata(String),
    /// The function catalogue could not be read.
    Catalogue(String),
}

impl ScriptError {
    pub(crate) fn resolution(script: &str, err: impl fmt::Display) -> Self {
        Self::Resolution {
            script: script.to_string(),
            diagnostic: err.to_string(),
        }
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Message suitable for showing to the script author.
    pub fn diagnostic(&self) -> &str {
        match self {
            Self::Bootstrap(msg)
            | Self::Runtime(msg)
            | Self::Decode(msg)
            | Self::Metadata(msg)
            | Self::Catalogue(msg) => msg,
            Self::Resolution { diagnostic, .. } => diagnostic,
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootstrap(msg) => write!(f, "interpreter bootstrap failed: {msg}"),
            Self::Resolution { diagnostic, .. } => write!(f, "script resolution failed: {diagnostic}"),
            Self::Runtime(msg) => write!(f, "script error: {msg}"),
            Self::Decode(msg) => write!(f, "invalid script result: {msg}"),
            Self::Metadata(msg) => write!(f, "invalid function metadata: {msg}"),
            Self::Catalogue(msg) => write!(f, "invalid function catalogue: {msg}"),
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<mlua::Error> for ScriptError {
    fn from(err: mlua::Error) -> Self {
        Self::Runtime(err.to_string())
    }
}
