use thiserror::Error;

/// Failures of a single request. None of these stop the server.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("position {line}:{character} is outside the document ({lines} lines)")]
    PositionOutOfBounds { line: u32, character: u32, lines: usize },

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}
