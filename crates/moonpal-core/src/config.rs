//! Ritual core configuration.
//!
//! Precedence: `LLM_*` / `TTS_*` env vars > `MOONPAL__*` env vars > config file
//! (`$MOONPAL_CONFIG` or `config/moonpal.toml`) > defaults.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | LLM_PROVIDER | fallback | zhipu \| minimax \| claude \| doubao \| qwen \| spark \| fallback |
//! | LLM_API_KEY | "" | Vendor credential. Missing → local fallback narrative. |
//! | LLM_ENDPOINT | vendor default | Required for zhipu, minimax, doubao and qwen. |
//! | LLM_MODEL | vendor default | Model identifier (Spark: chat domain). |
//! | LLM_TIMEOUT_SECS | 5 | Bounded wait for the Spark socket exchange. |

use moonpal_voice::{TtsConfig, TtsProviderKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Default bounded wait for socket-based text vendors.
pub const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 5;

/// Free-form provider block as it appears in the config file (`[llm]`, `[tts]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoonpalConfig {
    /// Directory of the sled database backing sessions, content and assets.
    pub storage_path: String,
    /// Prefix turning relative asset storage paths into public URLs.
    #[serde(default)]
    pub public_audio_base_url: String,
    /// Per-request timeout for HTTP vendors.
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub llm: ProviderSettings,
    #[serde(default)]
    pub tts: ProviderSettings,
}

impl MoonpalConfig {
    /// Load config from file and environment. Precedence: env `MOONPAL_CONFIG` path > `config/moonpal.toml` > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("MOONPAL_CONFIG").unwrap_or_else(|_| "config/moonpal.toml".to_string());
        let builder = config::Config::builder()
            .set_default("storage_path", "./data/moonpal")?
            .set_default("public_audio_base_url", "")?
            .set_default("request_timeout_secs", 20_i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("MOONPAL").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Text provider settings with `LLM_*` overrides applied.
    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig::from_settings(&self.llm).with_env_overrides()
    }

    /// Speech provider settings with `TTS_*` overrides applied.
    pub fn tts_config(&self) -> TtsConfig {
        let file = TtsConfig {
            kind: TtsProviderKind::parse_or_default(self.tts.provider.as_deref()),
            api_key: self.tts.api_key.clone().unwrap_or_default(),
            endpoint: non_blank(self.tts.endpoint.clone()),
            model: non_blank(self.tts.model.clone()),
            voice_id: non_blank(self.tts.voice_id.clone()),
            group_id: non_blank(self.tts.group_id.clone()),
        };
        let env = TtsConfig::from_env();
        TtsConfig {
            kind: if env_opt_string("TTS_PROVIDER").is_some() { env.kind } else { file.kind },
            api_key: if env.api_key.is_empty() { file.api_key } else { env.api_key },
            endpoint: env.endpoint.or(file.endpoint),
            model: env.model.or(file.model),
            voice_id: env.voice_id.or(file.voice_id),
            group_id: env.group_id.or(file.group_id),
        }
    }
}

impl Default for MoonpalConfig {
    fn default() -> Self {
        Self {
            storage_path: "./data/moonpal".to_string(),
            public_audio_base_url: String::new(),
            request_timeout_secs: 20,
            llm: ProviderSettings::default(),
            tts: ProviderSettings::default(),
        }
    }
}

/// Text-generation vendor discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    Zhipu,
    MiniMax,
    Claude,
    Doubao,
    Qwen,
    Spark,
    #[default]
    Fallback,
}

impl fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LlmProviderKind::Zhipu => "zhipu",
            LlmProviderKind::MiniMax => "minimax",
            LlmProviderKind::Claude => "claude",
            LlmProviderKind::Doubao => "doubao",
            LlmProviderKind::Qwen => "qwen",
            LlmProviderKind::Spark => "spark",
            LlmProviderKind::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

impl FromStr for LlmProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zhipu" | "glm" | "智谱" => Ok(LlmProviderKind::Zhipu),
            "minimax" => Ok(LlmProviderKind::MiniMax),
            "claude" | "anthropic" => Ok(LlmProviderKind::Claude),
            "doubao" | "豆包" => Ok(LlmProviderKind::Doubao),
            "qwen" | "dashscope" | "通义" => Ok(LlmProviderKind::Qwen),
            "spark" | "讯飞" => Ok(LlmProviderKind::Spark),
            "fallback" | "local" | "none" => Ok(LlmProviderKind::Fallback),
            other => Err(format!("Unknown LLM provider: {}", other)),
        }
    }
}

impl LlmProviderKind {
    /// Parse a discriminant; unset or unknown values select the local fallback.
    pub fn parse_or_fallback(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Self::Fallback,
            Some(s) => s.parse().unwrap_or_else(|e: String| {
                warn!(target: "moonpal::llm", error = %e, "Using local fallback narrative");
                Self::Fallback
            }),
        }
    }

    /// Vendors whose endpoint has no built-in default and must be configured.
    pub fn requires_endpoint(self) -> bool {
        matches!(
            self,
            LlmProviderKind::Zhipu | LlmProviderKind::MiniMax | LlmProviderKind::Doubao | LlmProviderKind::Qwen
        )
    }
}

/// Externally supplied configuration for one text provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub kind: LlmProviderKind,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    /// Bounded wait for socket vendors.
    pub socket_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            kind: LlmProviderKind::Fallback,
            api_key: String::new(),
            endpoint: None,
            model: None,
            socket_timeout: Duration::from_secs(DEFAULT_SOCKET_TIMEOUT_SECS),
        }
    }
}

impl LlmConfig {
    /// Load from `LLM_*` environment variables only.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self {
            kind: LlmProviderKind::parse_or_fallback(settings.provider.as_deref()),
            api_key: settings.api_key.clone().unwrap_or_default(),
            endpoint: non_blank(settings.endpoint.clone()),
            model: non_blank(settings.model.clone()),
            ..Self::default()
        }
    }

    /// Apply `LLM_*` variables that are set and non-blank.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(p) = env_opt_string("LLM_PROVIDER") {
            self.kind = LlmProviderKind::parse_or_fallback(Some(&p));
        }
        if let Some(k) = env_opt_string("LLM_API_KEY") {
            self.api_key = k;
        }
        if let Some(e) = env_opt_string("LLM_ENDPOINT") {
            self.endpoint = Some(e);
        }
        if let Some(m) = env_opt_string("LLM_MODEL") {
            self.model = Some(m);
        }
        if let Some(secs) = env_opt_string("LLM_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            self.socket_timeout = Duration::from_secs(secs.max(1));
        }
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_opt_string(name: &str) -> Option<String> {
    non_blank(std::env::var(name).ok())
}
