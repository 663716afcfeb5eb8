use super::{ensure_success, http_client, mp3_data_url};
use crate::config::{TtsConfig, TtsProviderKind};
use crate::error::VoiceResult;
use crate::synthesizer::{RenderedAudio, SpeechVendor};
use std::time::Duration;

const DEFAULT_REGION: &str = "eastasia";
const DEFAULT_VOICE: &str = "zh-CN-XiaoxiaoNeural";
const OUTPUT_FORMAT: &str = "audio-16khz-128kbitrate-mono-mp3";

/// Azure Cognitive Services speech: SSML in, MP3 bytes out.
/// `group_id` carries the Azure region when no endpoint override is given.
#[derive(Debug, Clone)]
pub struct AzureVendor {
    base_url: String,
    api_key: String,
    voice: String,
    client: reqwest::Client,
}

impl AzureVendor {
    pub fn new(config: &TtsConfig, timeout: Duration) -> Self {
        let region = config.group_id.as_deref().unwrap_or(DEFAULT_REGION);
        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.tts.speech.microsoft.com", region));
        Self {
            base_url,
            api_key: config.api_key.clone(),
            voice: config.voice_or(DEFAULT_VOICE),
            client: http_client(timeout),
        }
    }

    fn ssml(&self, text: &str) -> String {
        format!(
            r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" xmlns:mstts="https://www.w3.org/2001/mstts" xml:lang="zh-CN"><voice name="{}"><mstts:express-as style="calm">{}</mstts:express-as></voice></speak>"#,
            escape_xml(&self.voice),
            escape_xml(text)
        )
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait::async_trait]
impl SpeechVendor for AzureVendor {
    async fn render(&self, text: &str) -> VoiceResult<RenderedAudio> {
        let url = format!("{}/cognitiveservices/v1", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(self.ssml(text))
            .send()
            .await?;
        let bytes = ensure_success(res).await?.bytes().await?;
        Ok(RenderedAudio {
            url: mp3_data_url(&bytes)?,
            duration_seconds: 0.0,
        })
    }

    fn kind(&self) -> TtsProviderKind {
        TtsProviderKind::Azure
    }
}
