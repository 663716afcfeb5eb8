use super::{ensure_success, http_client, mp3_data_url};
use crate::config::{TtsConfig, TtsProviderKind};
use crate::error::VoiceResult;
use crate::synthesizer::{RenderedAudio, SpeechVendor};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/speech";
const DEFAULT_MODEL: &str = "tts-1";
const DEFAULT_VOICE: &str = "alloy";

/// OpenAI-compatible `/audio/speech`: JSON request, MP3 bytes out.
#[derive(Debug, Clone)]
pub struct OpenAiVendor {
    endpoint: String,
    api_key: String,
    model: String,
    voice: String,
    client: reqwest::Client,
}

impl OpenAiVendor {
    pub fn new(config: &TtsConfig, timeout: Duration) -> Self {
        Self {
            endpoint: config.endpoint_or(DEFAULT_ENDPOINT),
            api_key: config.api_key.clone(),
            model: config.model_or(DEFAULT_MODEL),
            voice: config.voice_or(DEFAULT_VOICE),
            client: http_client(timeout),
        }
    }
}

#[async_trait::async_trait]
impl SpeechVendor for OpenAiVendor {
    async fn render(&self, text: &str) -> VoiceResult<RenderedAudio> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "response_format": "mp3",
        });
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let bytes = ensure_success(res).await?.bytes().await?;
        Ok(RenderedAudio {
            url: mp3_data_url(&bytes)?,
            duration_seconds: 0.0,
        })
    }

    fn kind(&self) -> TtsProviderKind {
        TtsProviderKind::OpenAi
    }
}
