//! Coze chat API client (`POST {base_url}/open_api/v2/chat`).
//!
//! One non-streaming round-trip per call, no retries. The wire types are
//! public so the handler can log them and tests can assert on them.

use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, error, trace};

use super::request::InboundRequest;

/// Fixed API version segment of the endpoint path.
pub const API_VERSION: &str = "v2";

/// Upper bound on how much of an error body is kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 512;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CallError {
    #[error("failed to build request: {0}")]
    Payload(String),
    #[error("failed to execute request: {0}")]
    Transport(String),
    #[error("received non-success response: {status}: {body}")]
    Status { status: String, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

// ── Wire types ────────────────────────────────────────────────────────────────

/// Token and endpoint, read from settings on every call.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub base_url: String,
}

/// Outbound request body.
///
/// `conversation_id` is skipped when `None`: upstream reads an empty string
/// as "continue conversation ''", not "start a new one".
#[derive(Debug, Serialize)]
pub struct ChatPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<&'a str>,
    pub bot_id: &'a str,
    pub user: &'a str,
    pub query: &'a str,
    pub stream: bool,
}

impl<'a> ChatPayload<'a> {
    pub fn from_request(req: &'a InboundRequest) -> Self {
        Self {
            conversation_id: Some(req.conversation_id.as_str()).filter(|c| !c.is_empty()),
            bot_id: &req.bot_id,
            user: &req.user_id,
            query: &req.prompt,
            stream: false,
        }
    }
}

/// Decoded upstream reply. Missing or `null` fields read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamReply {
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<Message>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conversation_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub msg: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_type: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Join the base URL with the fixed route. The base is used verbatim.
pub fn endpoint(base_url: &str) -> String {
    format!("{base_url}/open_api/{API_VERSION}/chat")
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Shared HTTP client for the chat API. Cheap to clone; `reqwest::Client` is
/// an `Arc` internally.
#[derive(Debug, Clone)]
pub struct CozeClient {
    http: Client,
}

impl CozeClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = Client::builder().build()?;
        Ok(Self { http })
    }

    /// Send one chat request and decode the reply.
    pub async fn chat(
        &self,
        req: &InboundRequest,
        creds: &Credentials,
    ) -> Result<UpstreamReply, CallError> {
        let url = endpoint(&creds.base_url);
        let payload = ChatPayload::from_request(req);
        let body = serde_json::to_vec(&payload)
            .map_err(|e| CallError::Payload(format!("failed to marshal request payload: {e}")))?;

        debug!(
            %url,
            bot_id = %payload.bot_id,
            new_conversation = payload.conversation_id.is_none(),
            query_len = payload.query.len(),
            "sending coze chat request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&creds.token)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "*/*")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!(%url, error = %e, "coze request failed");
                if e.is_builder() {
                    CallError::Payload(e.to_string())
                } else {
                    CallError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            let body = truncate(&body, ERROR_BODY_LIMIT);
            error!(%status, %body, "coze request returned HTTP error");
            return Err(CallError::Status { status: status.to_string(), body });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CallError::Transport(format!("failed to read response body: {e}")))?;

        if tracing::enabled!(tracing::Level::TRACE) {
            trace!(body = %String::from_utf8_lossy(&bytes), "full coze response payload");
        }

        let reply: UpstreamReply = serde_json::from_slice(&bytes)
            .map_err(|e| CallError::Decode(e.to_string()))?;

        debug!(
            messages = reply.messages.len(),
            conversation_id = %reply.conversation_id,
            code = reply.code,
            "received coze response"
        );
        Ok(reply)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(conversation_id: &str) -> InboundRequest {
        InboundRequest {
            user_id: "u1".into(),
            bot_id: "b1".into(),
            prompt: "draw a cat".into(),
            conversation_id: conversation_id.into(),
        }
    }

    #[test]
    fn payload_omits_empty_conversation_id() {
        let r = req("");
        let json = serde_json::to_value(ChatPayload::from_request(&r)).unwrap();
        assert!(json.get("conversation_id").is_none());
        assert_eq!(json["bot_id"], "b1");
        assert_eq!(json["user"], "u1");
        assert_eq!(json["query"], "draw a cat");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn payload_keeps_existing_conversation_id() {
        let r = req("c123");
        let json = serde_json::to_value(ChatPayload::from_request(&r)).unwrap();
        assert_eq!(json["conversation_id"], "c123");
    }

    #[test]
    fn endpoint_joins_version_route() {
        assert_eq!(endpoint("https://api.coze.cn"), "https://api.coze.cn/open_api/v2/chat");
    }

    #[test]
    fn reply_decodes_full_shape() {
        let body = r#"{
            "messages": [
                {"role":"user","type":"question","content":"hi","content_type":"text"},
                {"role":"assistant","type":"answer","content":"hello","content_type":"text"}
            ],
            "conversation_id": "c1",
            "code": 0,
            "msg": "success"
        }"#;
        let reply: UpstreamReply = serde_json::from_str(body).unwrap();
        assert_eq!(reply.messages.len(), 2);
        assert_eq!(reply.messages[1].kind, "answer");
        assert_eq!(reply.conversation_id, "c1");
        assert_eq!(reply.msg, "success");
    }

    #[test]
    fn reply_tolerates_missing_and_null_fields() {
        let reply: UpstreamReply =
            serde_json::from_str(r#"{"messages":null,"code":4000,"msg":"bad bot"}"#).unwrap();
        assert!(reply.messages.is_empty());
        assert_eq!(reply.conversation_id, "");
        assert_eq!(reply.code, 4000);

        let reply: UpstreamReply = serde_json::from_str(r#"{"messages":[{"role":"assistant"}]}"#).unwrap();
        assert_eq!(reply.messages[0].content, "");
    }

    #[test]
    fn reply_rejects_wrong_types() {
        assert!(serde_json::from_str::<UpstreamReply>(r#"{"messages":"nope"}"#).is_err());
        assert!(serde_json::from_str::<UpstreamReply>(r#"[1,2,3]"#).is_err());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        let t = truncate("ééééé", 3);
        assert_eq!(t, "é…");
    }
}
