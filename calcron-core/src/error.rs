//! Error types for calcron.

use thiserror::Error;

/// Errors that can occur in calcron operations.
#[derive(Error, Debug)]
pub enum CalcronError {
    /// The event source could not be reached or returned garbage.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed event '{id}': {reason}")]
    MalformedEvent { id: String, reason: String },

    /// A schedule/cancel/actuator call failed.
    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),

    #[error("Provider request timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for calcron operations.
pub type CalcronResult<T> = Result<T, CalcronError>;
