use super::{ensure_success, http_client, json_f64, json_str, read_json};
use crate::config::{TtsConfig, TtsProviderKind};
use crate::error::{VoiceError, VoiceResult};
use crate::synthesizer::{RenderedAudio, SpeechVendor};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://openspeech.bytedance.com/api/v1/tts";
const DEFAULT_VOICE_TYPE: u32 = 5003;

/// Volcengine (火山) speech: JSON request, hosted URL + duration in `data`.
#[derive(Debug, Clone)]
pub struct VolcengineVendor {
    endpoint: String,
    api_key: String,
    app_id: String,
    voice_type: serde_json::Value,
    client: reqwest::Client,
}

impl VolcengineVendor {
    pub fn new(config: &TtsConfig, timeout: Duration) -> Self {
        let voice_type = match config.voice_id {
            Some(ref v) => serde_json::Value::String(v.clone()),
            None => serde_json::Value::from(DEFAULT_VOICE_TYPE),
        };
        Self {
            endpoint: config.endpoint_or(DEFAULT_ENDPOINT),
            api_key: config.api_key.clone(),
            app_id: config.group_id.clone().unwrap_or_default(),
            voice_type,
            client: http_client(timeout),
        }
    }
}

#[async_trait::async_trait]
impl SpeechVendor for VolcengineVendor {
    async fn render(&self, text: &str) -> VoiceResult<RenderedAudio> {
        let body = serde_json::json!({
            "app_id": self.app_id,
            "text": text,
            "voice_type": self.voice_type,
            "speed": 1.0,
            "volume": 1.0,
        });
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let json = read_json(ensure_success(res).await?).await?;
        let url = json_str(&json, "/data/audio_url").ok_or(VoiceError::EmptyAudio)?;
        Ok(RenderedAudio {
            url: url.to_string(),
            duration_seconds: json_f64(&json, "/data/duration"),
        })
    }

    fn kind(&self) -> TtsProviderKind {
        TtsProviderKind::Volcengine
    }
}
