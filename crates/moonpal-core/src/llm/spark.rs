//! iFlytek Spark over WebSocket.
//!
//! The socket has no request timeout of its own, so the whole exchange (connect, send,
//! read frames) runs under `tokio::time::timeout`. On expiry the exchange future is
//! dropped, which closes the connection, and the caller falls back locally.

use super::{user_prompt, CompanionBackend, CompanionContext, LlmError, SYSTEM_PROMPT};
use crate::config::{LlmConfig, LlmProviderKind};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

const SPARK_ENDPOINT: &str = "wss://spark-api.xf-yun.com/v1.1/chat";
const SPARK_DEFAULT_DOMAIN: &str = "general";
const SPARK_UID: &str = "moonpal";

/// Frame status of the last answer frame.
const STATUS_LAST: i64 = 2;

pub struct SparkBackend {
    endpoint: String,
    app_id: String,
    domain: String,
    timeout: Duration,
}

impl SparkBackend {
    /// The app id is the credential's first `-`-separated segment.
    pub fn new(config: &LlmConfig) -> Self {
        let app_id = config.api_key.split('-').next().unwrap_or("").to_string();
        Self {
            endpoint: config.endpoint.clone().unwrap_or_else(|| SPARK_ENDPOINT.to_string()),
            app_id,
            domain: config.model.clone().unwrap_or_else(|| SPARK_DEFAULT_DOMAIN.to_string()),
            timeout: config.socket_timeout,
        }
    }

    fn socket_url(&self) -> Result<String, LlmError> {
        let mut url = reqwest::Url::parse(&self.endpoint).map_err(|e| LlmError::Socket(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("appid", &self.app_id)
            .append_pair("uid", SPARK_UID);
        Ok(url.to_string())
    }

    fn request_frame(&self, ctx: &CompanionContext) -> String {
        json!({
            "header": { "app_id": self.app_id, "uid": SPARK_UID },
            "parameter": { "chat": { "domain": self.domain } },
            "payload": {
                "message": {
                    "text": [
                        { "role": "system", "content": SYSTEM_PROMPT },
                        { "role": "user", "content": user_prompt(ctx) },
                    ]
                }
            }
        })
        .to_string()
    }

    async fn exchange(&self, ctx: &CompanionContext) -> Result<String, LlmError> {
        let url = self.socket_url()?;
        let (mut ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| LlmError::Socket(e.to_string()))?;
        ws.send(Message::Text(self.request_frame(ctx)))
            .await
            .map_err(|e| LlmError::Socket(e.to_string()))?;

        let mut answer = String::new();
        while let Some(msg) = ws.next().await {
            let text = match msg.map_err(|e| LlmError::Socket(e.to_string()))? {
                Message::Text(t) => t,
                Message::Close(_) => break,
                _ => continue,
            };
            let frame: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| LlmError::Malformed(e.to_string()))?;
            if let Some(done) = absorb_frame(&frame, &mut answer)? {
                debug!(target: "moonpal::llm", done, chars = answer.chars().count(), "Spark frame");
                if done {
                    let _ = ws.close(None).await;
                    break;
                }
            }
        }

        if answer.trim().is_empty() {
            return Err(LlmError::Empty);
        }
        Ok(answer)
    }
}

/// Append one frame's text to `answer`. Returns `Some(true)` on the last frame,
/// `Some(false)` for an intermediate one, `None` for frames without a header.
fn absorb_frame(frame: &serde_json::Value, answer: &mut String) -> Result<Option<bool>, LlmError> {
    let Some(header) = frame.get("header") else {
        return Ok(None);
    };
    let code = header.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
    if code != 0 {
        let message = header.get("message").and_then(|m| m.as_str()).unwrap_or_default();
        return Err(LlmError::Status {
            status: u16::try_from(code).unwrap_or(u16::MAX),
            body: message.to_string(),
        });
    }
    if let Some(parts) = frame.pointer("/payload/choices/text").and_then(|t| t.as_array()) {
        for part in parts {
            if let Some(content) = part.get("content").and_then(|c| c.as_str()) {
                answer.push_str(content);
            }
        }
    }
    let status = header.get("status").and_then(|s| s.as_i64()).unwrap_or(0);
    Ok(Some(status == STATUS_LAST))
}

#[async_trait::async_trait]
impl CompanionBackend for SparkBackend {
    async fn complete(&self, ctx: &CompanionContext) -> Result<String, LlmError> {
        tokio::time::timeout(self.timeout, self.exchange(ctx))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))?
    }

    fn kind(&self) -> LlmProviderKind {
        LlmProviderKind::Spark
    }
}
