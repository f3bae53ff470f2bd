//! Error types for the index plugin

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid range boundary: {0}")]
    InvalidBoundary(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Column '{0}' is not indexed")]
    ColumnNotIndexed(String),

    #[error("Unknown mapper plugin: {0}")]
    UnknownPlugin(String),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndexError {
    /// Stable error code for callers that report failures upstream
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::InvalidBoundary(_) => "INVALID_BOUNDARY",
            IndexError::InvalidKey(_) => "INVALID_KEY",
            IndexError::Decode(_) => "DECODE_ERROR",
            IndexError::Encode(_) => "ENCODE_ERROR",
            IndexError::Schema(_) => "SCHEMA_ERROR",
            IndexError::ColumnNotIndexed(_) => "COLUMN_NOT_INDEXED",
            IndexError::UnknownPlugin(_) => "UNKNOWN_PLUGIN",
            IndexError::Dispatch(_) => "DISPATCH_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Failure to hand a task to the dispatcher.
///
/// A task that fails to dispatch was never run. Callers treat this as fatal
/// to the enclosing write and propagate it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatcher is shut down")]
    Shutdown,

    #[error("dispatch worker {0} is no longer running")]
    WorkerGone(usize),
}
