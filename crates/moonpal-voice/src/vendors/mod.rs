//! Vendor TTS adapters. Each one performs a single request per `render` call and
//! maps non-success statuses and unusable payloads to [`VoiceError`].

mod azure;
mod iflytek;
mod minimax;
mod openai;
mod volcengine;

pub use azure::AzureVendor;
pub use iflytek::IflytekVendor;
pub use minimax::MiniMaxVendor;
pub use openai::OpenAiVendor;
pub use volcengine::VolcengineVendor;

use crate::error::{VoiceError, VoiceResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::time::Duration;

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Turn a non-2xx response into `VoiceError::Status`, keeping the body for diagnostics.
pub(crate) async fn ensure_success(res: reqwest::Response) -> VoiceResult<reqwest::Response> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err(VoiceError::Status { status, body })
}

pub(crate) async fn read_json(res: reqwest::Response) -> VoiceResult<serde_json::Value> {
    res.json()
        .await
        .map_err(|e| VoiceError::Malformed(e.to_string()))
}

/// Encode raw MP3 bytes as a self-contained `data:` URL.
pub(crate) fn mp3_data_url(bytes: &[u8]) -> VoiceResult<String> {
    if bytes.is_empty() {
        return Err(VoiceError::EmptyAudio);
    }
    Ok(format!("data:audio/mpeg;base64,{}", BASE64.encode(bytes)))
}

pub(crate) fn json_str<'a>(value: &'a serde_json::Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

pub(crate) fn json_f64(value: &serde_json::Value, pointer: &str) -> f64 {
    value.pointer(pointer).and_then(|v| v.as_f64()).unwrap_or(0.0)
}
