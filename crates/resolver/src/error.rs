use std::time::Duration;
use thiserror::Error;

use crate::field::FieldName;

/// Result type for cascade construction and configuration
pub type Result<T> = std::result::Result<T, CascadeError>;

/// Errors raised while building a chain or loading configuration
#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("Cascade chain has no fields")]
    EmptyChain,

    #[error("Field {0} appears more than once in the chain")]
    DuplicateField(FieldName),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A gate must depend on a field strictly earlier than the one it hides
    #[error("Gate on {field} must reference an earlier field, got {ancestor}")]
    InvalidGate { field: FieldName, ancestor: FieldName },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cascade session is closed")]
    SessionClosed,

    #[error("Cascade session task failed: {0}")]
    SessionFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CascadeError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Transport-level failures of the lookup collaborator.
///
/// These are never domain outcomes: zero or many matches come back as a
/// regular option set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Lookup service answered HTTP {status}")]
    Status { status: u16 },

    #[error("Malformed lookup response: {0}")]
    Decode(String),

    #[error("Lookup timed out after {0} ms")]
    Timeout(u64),

    #[error("No endpoint configured for {0}")]
    NoEndpoint(String),
}

impl LookupError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Timed out after `limit`.
    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout(millis(limit))
    }
}

/// Whole milliseconds of `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Error, Debug)]
pub enum AutocompleteError {
    /// The typed description is not part of the current option mapping
    #[error("No option matches {0:?}")]
    UnmappedText(String),

    #[error("Option source error: {0}")]
    SourceError(#[from] LookupError),

    #[error("Validation pattern error: {0}")]
    PatternError(#[from] regex::Error),

    /// Pickers must form a single parent → child line
    #[error("Invalid picker chain: {0}")]
    InvalidChain(String),
}
