//! Error types for MoonPal speech synthesis

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors surfaced by speech synthesis. Unlike text generation there is no local
/// fallback: the caller decides whether to retry, use a recorded asset, or abort.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("TTS request failed: {0}")]
    Request(String),

    #[error("TTS API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("TTS returned no audio")]
    EmptyAudio,

    #[error("Malformed TTS response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for VoiceError {
    fn from(err: reqwest::Error) -> Self {
        VoiceError::Request(err.to_string())
    }
}
