//! Anthropic messages API.

use super::{http_client, read_success_json, user_prompt, CompanionBackend, CompanionContext, LlmError, SYSTEM_PROMPT};
use crate::config::{LlmConfig, LlmProviderKind};
use serde::Serialize;
use std::time::Duration;

const CLAUDE_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

pub struct ClaudeBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ClaudeBackend {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            endpoint: config.endpoint.clone().unwrap_or_else(|| CLAUDE_ENDPOINT.to_string()),
            api_key: config.api_key.clone(),
            model: config.model.clone().unwrap_or_else(|| CLAUDE_DEFAULT_MODEL.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl CompanionBackend for ClaudeBackend {
    async fn complete(&self, ctx: &CompanionContext) -> Result<String, LlmError> {
        let prompt = user_prompt(ctx);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: 100,
            system: SYSTEM_PROMPT,
            messages: [UserMessage { role: "user", content: &prompt }],
        };
        let res = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let value = read_success_json(res).await?;

        // `content` is a list of blocks; join the text ones.
        let text: String = value
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect()
            })
            .ok_or_else(|| LlmError::Malformed("missing content blocks".to_string()))?;
        if text.trim().is_empty() {
            return Err(LlmError::Empty);
        }
        Ok(text.trim().to_string())
    }

    fn kind(&self) -> LlmProviderKind {
        LlmProviderKind::Claude
    }
}
