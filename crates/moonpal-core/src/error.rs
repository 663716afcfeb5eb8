//! Error types for the ritual core.

use moonpal_voice::VoiceError;
use thiserror::Error;

/// Result type alias for orchestrator and audio library operations.
pub type RitualResult<T> = Result<T, RitualError>;

/// Failures of the external data store (the durable collaborator).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Seed error: {0}")]
    Seed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced to ritual callers. Text generation never appears here; it degrades
/// to the local narrative instead.
#[derive(Error, Debug)]
pub enum RitualError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Speech synthesis failed: {0}")]
    Speech(#[from] VoiceError),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}
