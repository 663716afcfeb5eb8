//! # MoonPal Voice - speech synthesis for the bedtime ritual
//!
//! One [`SpeechSynthesizer`] interface over several vendor TTS APIs. Each provider
//! instance owns its own audio cache; synthesis failures are always surfaced.
//!
//! ```text
//! TtsConfig ──create_speech_synthesizer──► CachedSynthesizer<Vendor>
//!                                             │  cache hit → SpeechAudio
//!                                             └─ miss → Vendor::render (1 request)
//! ```

pub mod config;
pub mod error;
pub mod synthesizer;
pub mod vendors;

pub use config::{TtsConfig, TtsProviderKind};
pub use error::{VoiceError, VoiceResult};
pub use synthesizer::{cache_key, CachedSynthesizer, RenderedAudio, SpeechAudio, SpeechSynthesizer, SpeechVendor};
pub use vendors::{AzureVendor, IflytekVendor, MiniMaxVendor, OpenAiVendor, VolcengineVendor};

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the configured speech provider. Never fails: a missing credential is logged
/// and will surface as a vendor error on the first synthesis call.
pub fn create_speech_synthesizer(config: &TtsConfig, timeout: Duration) -> Arc<dyn SpeechSynthesizer> {
    if config.api_key.trim().is_empty() {
        warn!(target: "moonpal::voice", provider = %config.kind, "TTS API key not set; synthesis will fail until configured");
    }
    info!(target: "moonpal::voice", provider = %config.kind, "TTS provider ready");
    match config.kind {
        TtsProviderKind::MiniMax => Arc::new(CachedSynthesizer::new(MiniMaxVendor::new(config, timeout))),
        TtsProviderKind::Azure => Arc::new(CachedSynthesizer::new(AzureVendor::new(config, timeout))),
        TtsProviderKind::OpenAi => Arc::new(CachedSynthesizer::new(OpenAiVendor::new(config, timeout))),
        TtsProviderKind::Volcengine => Arc::new(CachedSynthesizer::new(VolcengineVendor::new(config, timeout))),
        TtsProviderKind::Iflytek => Arc::new(CachedSynthesizer::new(IflytekVendor::new(config, timeout))),
    }
}
