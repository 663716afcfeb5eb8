//! Speech provider configuration.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | TTS_PROVIDER | minimax | minimax \| azure \| openai \| volcengine (火山) \| iflytek (讯飞) |
//! | TTS_API_KEY | "" | Vendor credential. |
//! | TTS_ENDPOINT | vendor default | Endpoint override. |
//! | TTS_MODEL | vendor default | Model identifier. |
//! | TTS_VOICE | vendor default | Voice identifier. |
//! | TTS_GROUP_ID | none | Group / app / region identifier (vendor specific). |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Speech vendor discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProviderKind {
    #[default]
    MiniMax,
    Azure,
    OpenAi,
    Volcengine,
    Iflytek,
}

impl fmt::Display for TtsProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TtsProviderKind::MiniMax => "minimax",
            TtsProviderKind::Azure => "azure",
            TtsProviderKind::OpenAi => "openai",
            TtsProviderKind::Volcengine => "volcengine",
            TtsProviderKind::Iflytek => "iflytek",
        };
        f.write_str(s)
    }
}

impl FromStr for TtsProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minimax" => Ok(TtsProviderKind::MiniMax),
            "azure" => Ok(TtsProviderKind::Azure),
            "openai" => Ok(TtsProviderKind::OpenAi),
            "volcengine" | "火山" => Ok(TtsProviderKind::Volcengine),
            "iflytek" | "xfyun" | "讯飞" => Ok(TtsProviderKind::Iflytek),
            other => Err(format!("Unknown TTS provider: {}", other)),
        }
    }
}

impl TtsProviderKind {
    /// Parse a discriminant; unset or unknown values fall back to MiniMax.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Self::default(),
            Some(s) => s.parse().unwrap_or_else(|e: String| {
                warn!(target: "moonpal::voice", error = %e, "Falling back to default TTS provider");
                Self::default()
            }),
        }
    }
}

/// Externally supplied configuration for one speech provider. No secrets are compiled in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsConfig {
    pub kind: TtsProviderKind,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub voice_id: Option<String>,
    pub group_id: Option<String>,
}

impl TtsConfig {
    /// Load from `TTS_*` environment variables. Unset values degrade to defaults.
    pub fn from_env() -> Self {
        Self {
            kind: TtsProviderKind::parse_or_default(env_opt_string("TTS_PROVIDER").as_deref()),
            api_key: env_opt_string("TTS_API_KEY").unwrap_or_default(),
            endpoint: env_opt_string("TTS_ENDPOINT"),
            model: env_opt_string("TTS_MODEL"),
            voice_id: env_opt_string("TTS_VOICE"),
            group_id: env_opt_string("TTS_GROUP_ID"),
        }
    }

    pub(crate) fn endpoint_or(&self, default: &str) -> String {
        self.endpoint.clone().unwrap_or_else(|| default.to_string())
    }

    pub(crate) fn model_or(&self, default: &str) -> String {
        self.model.clone().unwrap_or_else(|| default.to_string())
    }

    pub(crate) fn voice_or(&self, default: &str) -> String {
        self.voice_id.clone().unwrap_or_else(|| default.to_string())
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
