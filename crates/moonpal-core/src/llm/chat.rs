//! OpenAI-style chat-completion vendors (Zhipu GLM, MiniMax).

use super::{first_text, http_client, read_success_json, user_prompt, CompanionBackend, CompanionContext, LlmError, SYSTEM_PROMPT};
use crate::config::{LlmConfig, LlmProviderKind};
use serde::Serialize;
use std::time::Duration;

const ZHIPU_DEFAULT_MODEL: &str = "glm-4.5-flash";
const MINIMAX_DEFAULT_MODEL: &str = "abab6.5s-chat";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Bearer-authenticated `chat/completions` endpoint. The endpoint is always configured.
pub struct ChatCompletionBackend {
    kind: LlmProviderKind,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionBackend {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Self {
        let default_model = match config.kind {
            LlmProviderKind::MiniMax => MINIMAX_DEFAULT_MODEL,
            _ => ZHIPU_DEFAULT_MODEL,
        };
        Self {
            kind: config.kind,
            client: http_client(timeout),
            endpoint: config.endpoint.clone().unwrap_or_default(),
            api_key: config.api_key.clone(),
            model: config.model.clone().unwrap_or_else(|| default_model.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl CompanionBackend for ChatCompletionBackend {
    async fn complete(&self, ctx: &CompanionContext) -> Result<String, LlmError> {
        let prompt = user_prompt(ctx);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            temperature: 0.5,
            max_tokens: 100,
        };
        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let value = read_success_json(res).await?;
        first_text(&value, &["/choices/0/message/content"])
    }

    fn kind(&self) -> LlmProviderKind {
        self.kind
    }
}
