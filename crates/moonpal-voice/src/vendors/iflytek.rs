use super::{ensure_success, http_client, json_str, read_json};
use crate::config::{TtsConfig, TtsProviderKind};
use crate::error::{VoiceError, VoiceResult};
use crate::synthesizer::{RenderedAudio, SpeechVendor};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://cbm01.cn-huabei-1.xf-yun.com/v1/private/med75bcf6";
const DEFAULT_VOICE: &str = "xiaoyan";

/// iFlytek (讯飞) speech: base64 text in, `data.audio` out (a URL or base64 MP3).
#[derive(Debug, Clone)]
pub struct IflytekVendor {
    endpoint: String,
    api_key: String,
    app_id: String,
    voice: String,
    client: reqwest::Client,
}

impl IflytekVendor {
    pub fn new(config: &TtsConfig, timeout: Duration) -> Self {
        Self {
            endpoint: config.endpoint_or(DEFAULT_ENDPOINT),
            api_key: config.api_key.clone(),
            app_id: config.group_id.clone().unwrap_or_default(),
            voice: config.voice_or(DEFAULT_VOICE),
            client: http_client(timeout),
        }
    }
}

/// `data.audio` is either already fetchable or inline base64 audio.
fn audio_to_url(audio: &str) -> String {
    if audio.starts_with("http://") || audio.starts_with("https://") || audio.starts_with("data:") {
        audio.to_string()
    } else {
        format!("data:audio/mpeg;base64,{}", audio)
    }
}

#[async_trait::async_trait]
impl SpeechVendor for IflytekVendor {
    async fn render(&self, text: &str) -> VoiceResult<RenderedAudio> {
        let body = serde_json::json!({
            "common": { "app_id": self.app_id },
            "business": {
                "aue": "lame",
                "sfl": 1,
                "vcn": self.voice,
                "speed": 50,
                "volume": 50,
            },
            "data": { "text": BASE64.encode(text.as_bytes()) },
        });
        let res = self
            .client
            .post(&self.endpoint)
            .header("X-Param-Auth-Apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let json = read_json(ensure_success(res).await?).await?;
        let audio = json_str(&json, "/data/audio").ok_or(VoiceError::EmptyAudio)?;
        Ok(RenderedAudio {
            url: audio_to_url(audio),
            duration_seconds: 0.0,
        })
    }

    fn kind(&self) -> TtsProviderKind {
        TtsProviderKind::Iflytek
    }
}
