//! Companion text generation over several vendor backends.
//!
//! Every backend implements the fallible [`CompanionBackend`]; callers only ever see
//! [`TextGenerator`], which never fails and never returns empty text. Any vendor error
//! (network, status, malformed payload, timeout) is logged and replaced by
//! [`fallback_narrative`], shared by all variants.

mod chat;
mod claude;
mod dashscope;
mod narrative;
mod spark;

pub use chat::ChatCompletionBackend;
pub use claude::ClaudeBackend;
pub use dashscope::{DoubaoBackend, QwenBackend};
pub use narrative::{fallback_narrative, PRESENCE_PHRASES};
pub use spark::SparkBackend;

use crate::config::{LlmConfig, LlmProviderKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Companion role line shared by every prompt.
pub const COMPANION_ROLE: &str = "你是孩子的夜间陪伴者。";

/// System instruction: short presence narration only.
pub const SYSTEM_PROMPT: &str =
    "你是孩子的夜间陪伴者。只生成简短的陪伴式叙述（1-2句话），不要分析、不要教育、不要故事。";

/// What the generator knows about the turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanionContext {
    pub energy_level: f64,
    #[serde(default)]
    pub magic_note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub session_id: String,
}

impl CompanionContext {
    pub fn fallback(&self) -> String {
        fallback_narrative(self.energy_level, self.magic_note.as_deref())
    }
}

/// User turn: energy to one decimal, then the magic note when present.
pub fn user_prompt(ctx: &CompanionContext) -> String {
    let note = ctx
        .magic_note
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .map(|n| format!("用户输入：「{}」。", n))
        .unwrap_or_default();
    format!(
        "生成一句陪伴式叙述。能量等级：{:.1}（0-1）。{}只返回叙述文本。",
        ctx.energy_level, note
    )
}

/// Vendor call failures. Internal to text generation; never reach ritual callers.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Vendor returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No answer within {0:?}")]
    Timeout(Duration),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Vendor returned no text")]
    Empty,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Request(e.to_string())
    }
}

/// Uniform text interface used by the ritual orchestrator.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Always non-empty.
    async fn generate_companion_text(&self, ctx: &CompanionContext) -> String;

    fn kind(&self) -> LlmProviderKind;
}

/// One vendor text API; may fail.
#[async_trait::async_trait]
pub trait CompanionBackend: Send + Sync {
    async fn complete(&self, ctx: &CompanionContext) -> Result<String, LlmError>;

    fn kind(&self) -> LlmProviderKind;
}

/// Wraps a backend and substitutes the local narrative for every failure.
pub struct ResilientGenerator<B> {
    backend: B,
}

impl<B: CompanionBackend> ResilientGenerator<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl<B: CompanionBackend> TextGenerator for ResilientGenerator<B> {
    async fn generate_companion_text(&self, ctx: &CompanionContext) -> String {
        match self.backend.complete(ctx).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!(target: "moonpal::llm", provider = %self.backend.kind(), session_id = %ctx.session_id, "Empty vendor text; using fallback narrative");
                ctx.fallback()
            }
            Err(e) => {
                warn!(target: "moonpal::llm", provider = %self.backend.kind(), session_id = %ctx.session_id, error = %e, "Text vendor failed; using fallback narrative");
                ctx.fallback()
            }
        }
    }

    fn kind(&self) -> LlmProviderKind {
        self.backend.kind()
    }
}

/// No vendor at all: local narrative only.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

#[async_trait::async_trait]
impl TextGenerator for FallbackGenerator {
    async fn generate_companion_text(&self, ctx: &CompanionContext) -> String {
        ctx.fallback()
    }

    fn kind(&self) -> LlmProviderKind {
        LlmProviderKind::Fallback
    }
}

/// Build the configured text provider. Never fails: a missing credential, or a missing
/// endpoint for vendors without a default one, selects [`FallbackGenerator`].
pub fn create_text_generator(config: &LlmConfig, request_timeout: Duration) -> Arc<dyn TextGenerator> {
    if config.kind == LlmProviderKind::Fallback {
        info!(target: "moonpal::llm", "Text provider: local fallback narrative");
        return Arc::new(FallbackGenerator);
    }
    if config.api_key.trim().is_empty() {
        warn!(target: "moonpal::llm", provider = %config.kind, "LLM API key not set; using local fallback narrative");
        return Arc::new(FallbackGenerator);
    }
    if config.kind.requires_endpoint() && config.endpoint.is_none() {
        warn!(target: "moonpal::llm", provider = %config.kind, "LLM endpoint not set; using local fallback narrative");
        return Arc::new(FallbackGenerator);
    }

    info!(target: "moonpal::llm", provider = %config.kind, "Text provider ready");
    match config.kind {
        LlmProviderKind::Zhipu | LlmProviderKind::MiniMax => {
            Arc::new(ResilientGenerator::new(ChatCompletionBackend::new(config, request_timeout)))
        }
        LlmProviderKind::Claude => Arc::new(ResilientGenerator::new(ClaudeBackend::new(config, request_timeout))),
        LlmProviderKind::Doubao => Arc::new(ResilientGenerator::new(DoubaoBackend::new(config, request_timeout))),
        LlmProviderKind::Qwen => Arc::new(ResilientGenerator::new(QwenBackend::new(config, request_timeout))),
        LlmProviderKind::Spark => Arc::new(ResilientGenerator::new(SparkBackend::new(config))),
        LlmProviderKind::Fallback => Arc::new(FallbackGenerator),
    }
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Non-2xx → `LlmError::Status` with the body kept; otherwise the parsed JSON body.
pub(crate) async fn read_success_json(res: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    if !res.status().is_success() {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        return Err(LlmError::Status { status, body });
    }
    res.json()
        .await
        .map_err(|e| LlmError::Malformed(e.to_string()))
}

/// First non-blank string among JSON pointers.
pub(crate) fn first_text(value: &serde_json::Value, pointers: &[&str]) -> Result<String, LlmError> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(LlmError::Empty)
}
