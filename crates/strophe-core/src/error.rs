//! Unified error types for Strophe

use thiserror::Error;

/// Unified error type for all Strophe operations
#[derive(Error, Debug)]
pub enum StropheError {
    // Generation service errors
    #[error("Generation service error: {0}")]
    Generation(String),

    #[error("Generation rate limit: {0}")]
    GenerationLimit(String),

    // Retrieval service errors
    #[error("Retrieval service error: {0}")]
    Retrieval(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    // Engine errors
    #[error("Stage error: {0}")]
    Stage(String),

    #[error("Router error: {0}")]
    Router(String),

    // Checkpoint errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    // Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using StropheError
pub type Result<T> = std::result::Result<T, StropheError>;
