//! Integration test: companion text vendors against in-process servers.
//!
//! Verifies that:
//! 1. Chat-completion, messages and input-envelope vendors send the companion prompt and
//!    return the vendor text trimmed.
//! 2. Vendor failures (500, empty body, malformed JSON, unreachable host) yield the local
//!    fallback narrative, never an error or empty text.
//! 3. The Spark socket vendor assembles multi-frame answers.
//! 4. A Spark server that never answers is abandoned after the bounded wait.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use moonpal_core::llm::SYSTEM_PROMPT;
use moonpal_core::{create_text_generator, fallback_narrative, CompanionContext, LlmConfig, LlmProviderKind};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

type Captured = Arc<Mutex<Option<(HeaderMap, Value)>>>;

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn config(kind: LlmProviderKind, endpoint: Option<String>) -> LlmConfig {
    LlmConfig {
        kind,
        api_key: "appid42-secret".to_string(),
        endpoint,
        model: None,
        socket_timeout: Duration::from_millis(500),
    }
}

fn ctx(note: Option<&str>) -> CompanionContext {
    CompanionContext {
        energy_level: 0.5,
        magic_note: note.map(str::to_string),
        tags: vec!["月亮".to_string()],
        session_id: "demo-vendor-test".to_string(),
    }
}

async fn chat_ok(State(seen): State<Captured>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    *seen.lock().unwrap() = Some((headers, body));
    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": "  月光轻轻的，我在这里。 " } }] }))
}

async fn claude_ok(State(seen): State<Captured>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    *seen.lock().unwrap() = Some((headers, body));
    Json(json!({ "content": [{ "type": "text", "text": "晚安，我陪着你。" }] }))
}

async fn envelope_ok(State(seen): State<Captured>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    *seen.lock().unwrap() = Some((headers, body));
    Json(json!({ "output": { "text": "夜很安静。" } }))
}

async fn qwen_choices() -> Json<Value> {
    Json(json!({ "output": {}, "choices": [{ "message": { "content": "星星睡了。" } }] }))
}

async fn server_error() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "vendor exploded")
}

async fn empty_choices() -> Json<Value> {
    Json(json!({ "choices": [] }))
}

async fn not_json() -> &'static str {
    "<html>gateway</html>"
}

fn captured() -> Captured {
    Arc::new(Mutex::new(None))
}

#[tokio::test]
async fn zhipu_sends_companion_prompt() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let seen = captured();
    let base = spawn(Router::new().route("/chat", post(chat_ok)).with_state(seen.clone())).await;
    let generator = create_text_generator(
        &config(LlmProviderKind::Zhipu, Some(format!("{}/chat", base))),
        Duration::from_secs(5),
    );
    assert_eq!(generator.kind(), LlmProviderKind::Zhipu);

    let text = generator.generate_companion_text(&ctx(Some("小熊"))).await;
    assert_eq!(text, "月光轻轻的，我在这里。");

    let (headers, body) = seen.lock().unwrap().clone().expect("request captured");
    assert_eq!(headers.get("authorization").unwrap(), "Bearer appid42-secret");
    assert_eq!(body["model"], "glm-4.5-flash");
    assert_eq!(body["temperature"], 0.5);
    assert_eq!(body["max_tokens"], 100);
    assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
    assert_eq!(
        body["messages"][1]["content"],
        "生成一句陪伴式叙述。能量等级：0.5（0-1）。用户输入：「小熊」。只返回叙述文本。"
    );
}

#[tokio::test]
async fn minimax_uses_its_default_model() {
    let seen = captured();
    let base = spawn(Router::new().route("/chat", post(chat_ok)).with_state(seen.clone())).await;
    let generator = create_text_generator(
        &config(LlmProviderKind::MiniMax, Some(format!("{}/chat", base))),
        Duration::from_secs(5),
    );
    generator.generate_companion_text(&ctx(None)).await;
    let (_, body) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "abab6.5s-chat");
}

#[tokio::test]
async fn claude_uses_messages_api() {
    let seen = captured();
    let base = spawn(Router::new().route("/v1/messages", post(claude_ok)).with_state(seen.clone())).await;
    let generator = create_text_generator(
        &config(LlmProviderKind::Claude, Some(format!("{}/v1/messages", base))),
        Duration::from_secs(5),
    );
    assert_eq!(generator.generate_companion_text(&ctx(None)).await, "晚安，我陪着你。");

    let (headers, body) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(headers.get("x-api-key").unwrap(), "appid42-secret");
    assert!(headers.get("anthropic-version").is_some());
    assert_eq!(body["model"], "claude-sonnet-4-20250514");
    assert_eq!(body["system"], SYSTEM_PROMPT);
    assert_eq!(body["messages"][0]["role"], "user");
}

#[tokio::test]
async fn doubao_and_qwen_envelopes() {
    let seen = captured();
    let base = spawn(
        Router::new()
            .route("/doubao", post(envelope_ok))
            .route("/qwen", post(qwen_choices))
            .with_state(seen.clone()),
    )
    .await;

    let doubao = create_text_generator(
        &config(LlmProviderKind::Doubao, Some(format!("{}/doubao", base))),
        Duration::from_secs(5),
    );
    assert_eq!(doubao.generate_companion_text(&ctx(None)).await, "夜很安静。");
    let (_, body) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "doubao-pro-32k");
    let content = body["input"]["messages"][0]["content"].as_str().unwrap();
    assert!(content.starts_with("你是孩子的夜间陪伴者。生成一句陪伴式叙述。"));

    let qwen = create_text_generator(
        &config(LlmProviderKind::Qwen, Some(format!("{}/qwen", base))),
        Duration::from_secs(5),
    );
    assert_eq!(qwen.generate_companion_text(&ctx(None)).await, "星星睡了。");
}

#[tokio::test]
async fn vendor_failures_fall_back_locally() {
    let base = spawn(
        Router::new()
            .route("/500", post(server_error))
            .route("/empty", post(empty_choices))
            .route("/html", post(not_json)),
    )
    .await;

    let expected = fallback_narrative(0.5, Some("小熊"));
    for path in ["/500", "/empty", "/html"] {
        let generator = create_text_generator(
            &config(LlmProviderKind::Zhipu, Some(format!("{}{}", base, path))),
            Duration::from_secs(5),
        );
        assert_eq!(generator.generate_companion_text(&ctx(Some("小熊"))).await, expected, "path {}", path);
    }

    // Nothing listens on port 9 of localhost.
    let unreachable = create_text_generator(
        &config(LlmProviderKind::Qwen, Some("http://127.0.0.1:9/qwen".to_string())),
        Duration::from_secs(2),
    );
    assert_eq!(unreachable.generate_companion_text(&ctx(Some("小熊"))).await, expected);
}

/// One-shot Spark server: reads the request frame, then replays `frames`.
async fn spawn_spark(frames: Vec<Value>) -> (String, tokio::sync::oneshot::Receiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        if let Some(Ok(Message::Text(request))) = ws.next().await {
            let _ = tx.send(serde_json::from_str::<Value>(&request).unwrap_or(Value::Null));
        }
        for frame in frames {
            if ws.send(Message::Text(frame.to_string())).await.is_err() {
                return;
            }
        }
        let _ = ws.close(None).await;
    });
    (format!("ws://{}/v1.1/chat", addr), rx)
}

#[tokio::test]
async fn spark_joins_frames_until_last() {
    let frames = vec![
        json!({ "header": { "code": 0, "status": 0 }, "payload": { "choices": { "text": [{ "content": "夜深了，" }] } } }),
        json!({ "header": { "code": 0, "status": 1 }, "payload": { "choices": { "text": [{ "content": "我在" }] } } }),
        json!({ "header": { "code": 0, "status": 2 }, "payload": { "choices": { "text": [{ "content": "这里。" }] } } }),
    ];
    let (url, request) = spawn_spark(frames).await;
    let generator = create_text_generator(&config(LlmProviderKind::Spark, Some(url)), Duration::from_secs(5));

    assert_eq!(generator.generate_companion_text(&ctx(None)).await, "夜深了，我在这里。");

    let request = request.await.unwrap();
    assert_eq!(request["header"]["app_id"], "appid42");
    assert_eq!(request["header"]["uid"], "moonpal");
    assert_eq!(request["parameter"]["chat"]["domain"], "general");
    assert_eq!(request["payload"]["message"]["text"][0]["content"], SYSTEM_PROMPT);
}

#[tokio::test]
async fn spark_error_code_falls_back() {
    let frames = vec![json!({ "header": { "code": 10013, "message": "audit failed", "status": 2 } })];
    let (url, _request) = spawn_spark(frames).await;
    let generator = create_text_generator(&config(LlmProviderKind::Spark, Some(url)), Duration::from_secs(5));
    assert_eq!(
        generator.generate_companion_text(&ctx(Some("小熊"))).await,
        fallback_narrative(0.5, Some("小熊"))
    );
}

#[tokio::test]
async fn silent_spark_server_times_out() {
    // Accepts TCP but never completes the WebSocket handshake.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let generator = create_text_generator(
        &config(LlmProviderKind::Spark, Some(format!("ws://{}/v1.1/chat", addr))),
        Duration::from_secs(5),
    );
    let started = Instant::now();
    let text = generator.generate_companion_text(&ctx(None)).await;
    let elapsed = started.elapsed();

    assert_eq!(text, fallback_narrative(0.5, None));
    assert!(elapsed >= Duration::from_millis(450), "returned before the bounded wait: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "bounded wait exceeded: {:?}", elapsed);
}
