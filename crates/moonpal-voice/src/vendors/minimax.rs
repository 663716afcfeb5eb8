use super::{ensure_success, http_client, json_f64, json_str, read_json};
use crate::config::{TtsConfig, TtsProviderKind};
use crate::error::{VoiceError, VoiceResult};
use crate::synthesizer::{RenderedAudio, SpeechVendor};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.minimax.chat/v1/t2a_v2";
const DEFAULT_MODEL: &str = "speech-02-turbo";
const DEFAULT_VOICE: &str = "Calm_Woman";

/// MiniMax T2A: JSON request, JSON response carrying a hosted audio URL.
#[derive(Debug, Clone)]
pub struct MiniMaxVendor {
    endpoint: String,
    api_key: String,
    model: String,
    voice: String,
    group_id: String,
    client: reqwest::Client,
}

impl MiniMaxVendor {
    pub fn new(config: &TtsConfig, timeout: Duration) -> Self {
        Self {
            endpoint: config.endpoint_or(DEFAULT_ENDPOINT),
            api_key: config.api_key.clone(),
            model: config.model_or(DEFAULT_MODEL),
            voice: config.voice_or(DEFAULT_VOICE),
            group_id: config.group_id.clone().unwrap_or_default(),
            client: http_client(timeout),
        }
    }
}

#[async_trait::async_trait]
impl SpeechVendor for MiniMaxVendor {
    async fn render(&self, text: &str) -> VoiceResult<RenderedAudio> {
        let body = serde_json::json!({
            "model": self.model,
            "group_id": self.group_id,
            "input": { "text": text },
            "config": {
                "voice_id": self.voice,
                "emotion": "calm",
                "speed": 0.9,
                "volume": 0.8,
            },
        });
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let json = read_json(ensure_success(res).await?).await?;

        // Known locations of the hosted URL.
        let url = json_str(&json, "/audio_info/audio_url")
            .or_else(|| json_str(&json, "/data/audio_url"))
            .or_else(|| json_str(&json, "/result/audio_url"))
            .ok_or(VoiceError::EmptyAudio)?;

        Ok(RenderedAudio {
            url: url.to_string(),
            duration_seconds: json_f64(&json, "/audio_info/duration"),
        })
    }

    fn kind(&self) -> TtsProviderKind {
        TtsProviderKind::MiniMax
    }
}
