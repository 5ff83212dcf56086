//! Shared fixtures for integration tests: a fake Coze upstream and a helper
//! that builds the bridge router pointed at it.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceExt;

use coze_bridge::server::build_router;
use coze_bridge::services;
use coze_bridge::services::coze::ResponseContent;
use coze_bridge::settings::{SettingValue, Settings};

pub const TOKEN: &str = "pat_test";

/// What the fake upstream saw on its last call.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

#[derive(Default)]
struct UpstreamState {
    status: u16,
    reply: String,
    calls: AtomicUsize,
    last: Mutex<Option<Recorded>>,
}

/// Fake `POST /open_api/v2/chat` returning a canned status and body.
#[derive(Clone)]
pub struct FakeUpstream {
    pub addr: SocketAddr,
    state: Arc<UpstreamState>,
}

impl FakeUpstream {
    pub async fn spawn(status: u16, reply: impl Into<String>) -> Self {
        let state = Arc::new(UpstreamState {
            status,
            reply: reply.into(),
            ..Default::default()
        });
        let app = Router::new()
            .route("/open_api/v2/chat", post(chat))
            .layer(DefaultBodyLimit::disable())
            .with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Recorded {
        self.state.last.lock().unwrap().clone().expect("upstream was not called")
    }
}

async fn chat(
    State(state): State<Arc<UpstreamState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    state.calls.fetch_add(1, Ordering::SeqCst);
    let body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    *state.last.lock().unwrap() = Some(Recorded { headers, body });
    (StatusCode::from_u16(state.status).unwrap(), state.reply.clone())
}

/// Coze reply with one user echo and the given answer.
pub fn reply_with_answer(answer: &str, conversation_id: &str) -> String {
    serde_json::json!({
        "messages": [
            {"role": "user", "type": "question", "content": "q", "content_type": "text"},
            {"role": "assistant", "type": "answer", "content": answer, "content_type": "text"},
            {"role": "assistant", "type": "follow_up", "content": "more?", "content_type": "text"}
        ],
        "conversation_id": conversation_id,
        "code": 0,
        "msg": "success"
    })
    .to_string()
}

/// Bridge router with the coze service enabled and pointed at `base_url`.
pub fn bridge(base_url: &str) -> Router {
    let svcs = services::builtin().unwrap();
    let settings = Settings::from_pairs([
        ("coze", SettingValue::Bool(true)),
        ("coze_token", SettingValue::String(TOKEN.into())),
        ("coze_url", SettingValue::String(base_url.into())),
    ]);
    build_router(&svcs, Arc::new(settings))
}

/// POST `body` to `uri` and decode the JSON response.
pub async fn post_txt2img(
    app: Router,
    uri: &str,
    content_type: &str,
    body: impl Into<Body>,
) -> (StatusCode, ResponseContent) {
    let req = Request::post(uri)
        .header("content-type", content_type)
        .body(body.into())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let content: ResponseContent = serde_json::from_slice(&bytes).unwrap();
    (status, content)
}
