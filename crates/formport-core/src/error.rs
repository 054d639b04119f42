use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("not initialized: run 'formport init'")]
    NotInitialized,

    #[error("{0}")]
    Usage(String),

    #[error("no legacy form found for entity: {0}")]
    EntityNotFound(String),

    #[error("invalid entity name '{0}': must be a valid C# identifier")]
    InvalidEntity(String),

    #[error("unknown step: {0}")]
    UnknownStep(String),

    #[error("missing required input '{input}' for step '{step}'")]
    MissingDependency { step: String, input: String },

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("malformed output for step '{step}': {reason}")]
    MalformedOutput { step: String, reason: String },

    #[error("cannot parse {file}: {reason}")]
    ParseAmbiguity { file: String, reason: String },

    #[error("no backup found for {0}")]
    NoBackup(PathBuf),

    #[error("another run holds the lock for '{entity}' (pid {pid})")]
    LockHeld { entity: String, pid: String },

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
