use thiserror::Error;

/// Errors raised by the party engine
///
/// Shortfalls in supply are never errors; allocation always returns a
/// best-effort result. Only calls that cannot be answered at all fail here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to read party configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse party configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
