//! `input`-envelope vendors: Doubao and Qwen (DashScope).

use super::{
    first_text, http_client, read_success_json, user_prompt, CompanionBackend, CompanionContext, LlmError,
    COMPANION_ROLE, SYSTEM_PROMPT,
};
use crate::config::{LlmConfig, LlmProviderKind};
use serde_json::json;
use std::time::Duration;

const DOUBAO_DEFAULT_MODEL: &str = "doubao-pro-32k";
const QWEN_DEFAULT_MODEL: &str = "qwen-turbo";

struct Envelope {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl Envelope {
    fn new(config: &LlmConfig, timeout: Duration, default_model: &str) -> Self {
        Self {
            client: http_client(timeout),
            endpoint: config.endpoint.clone().unwrap_or_default(),
            api_key: config.api_key.clone(),
            model: config.model.clone().unwrap_or_else(|| default_model.to_string()),
        }
    }

    async fn post(&self, body: serde_json::Value) -> Result<serde_json::Value, LlmError> {
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        read_success_json(res).await
    }
}

/// Doubao takes a single user message with the role line prepended; answer in `output.text`.
pub struct DoubaoBackend {
    inner: Envelope,
}

impl DoubaoBackend {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Self {
        Self { inner: Envelope::new(config, timeout, DOUBAO_DEFAULT_MODEL) }
    }
}

#[async_trait::async_trait]
impl CompanionBackend for DoubaoBackend {
    async fn complete(&self, ctx: &CompanionContext) -> Result<String, LlmError> {
        let body = json!({
            "input": {
                "messages": [{ "role": "user", "content": format!("{}{}", COMPANION_ROLE, user_prompt(ctx)) }],
            },
            "model": self.inner.model,
        });
        let value = self.inner.post(body).await?;
        first_text(&value, &["/output/text"])
    }

    fn kind(&self) -> LlmProviderKind {
        LlmProviderKind::Doubao
    }
}

/// Qwen takes system + user messages; answer in `output.text` or OpenAI-style `choices`.
pub struct QwenBackend {
    inner: Envelope,
}

impl QwenBackend {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Self {
        Self { inner: Envelope::new(config, timeout, QWEN_DEFAULT_MODEL) }
    }
}

#[async_trait::async_trait]
impl CompanionBackend for QwenBackend {
    async fn complete(&self, ctx: &CompanionContext) -> Result<String, LlmError> {
        let body = json!({
            "model": self.inner.model,
            "input": {
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": user_prompt(ctx) },
                ],
            },
        });
        let value = self.inner.post(body).await?;
        first_text(&value, &["/output/text", "/choices/0/message/content"])
    }

    fn kind(&self) -> LlmProviderKind {
        LlmProviderKind::Qwen
    }
}
