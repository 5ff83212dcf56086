//! Axum handlers for the coze routes.
//!
//! Every `/txt2img` request ends in exactly one of four outcomes:
//!
//! | outcome                 | status | content                          |
//! |-------------------------|--------|----------------------------------|
//! | input did not validate  | 400    | `Invalid input`                  |
//! | upstream call failed    | 500    | `Failed to call chat API`        |
//! | reply had no answer     | 500    | `Sorry, no valid answer found`   |
//! | answer extracted        | 200    | the answer text                  |
//!
//! Failure detail goes to the log only.

use axum::{
    Json,
    body::Bytes,
    extract::{RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::CozeState;
use super::answer::extract_answer;
use super::request::normalize;

pub const INVALID_INPUT: &str = "Invalid input";
pub const CALL_FAILED: &str = "Failed to call chat API";
pub const NO_ANSWER: &str = "Sorry, no valid answer found";

const HELP_TEXT: &str = r#"POST /txt2img
curl -X POST http://localhost:8080/txt2img \
--header 'Content-Type: application/json' \
--data-raw '{
    "user_id": "12345",
    "botid": "7396***",
    "prompt": "draw a 1:1 anime-style illustration of a girl among falling leaves",
    "conversation_id": ""
}'

  user_id          your user ID
  botid            the Coze bot ID
  prompt           the prompt passed to the bot
  conversation_id  optional; pass the previous reply's value to continue a conversation

Form-encoded bodies with the same field names are accepted too.
"#;

/// Response body for `/txt2img`. `code` always equals the HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseContent {
    pub code: u16,
    pub content: String,
    pub conversation_id: String,
}

fn respond(status: StatusCode, content: impl Into<String>, conversation_id: String) -> Response {
    let body = ResponseContent {
        code: status.as_u16(),
        content: content.into(),
        conversation_id,
    };
    (status, Json(body)).into_response()
}

/// GET /help/coze
pub(super) async fn help() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        HELP_TEXT,
    )
        .into_response()
}

/// POST /txt2img
pub(super) async fn txt2img(
    State(state): State<CozeState>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let decoded = match normalize(&body, query.as_deref()) {
        Ok(decoded) => decoded,
        Err(e) => {
            error!(error = %e, "error binding request data");
            return respond(StatusCode::BAD_REQUEST, INVALID_INPUT, String::new());
        }
    };

    debug!(
        encoding = %decoded.encoding,
        user_id = %decoded.request.user_id,
        bot_id = %decoded.request.bot_id,
        conversation_id = %decoded.request.conversation_id,
        prompt = %decoded.request.prompt,
        "coze API request"
    );

    let creds = state.credentials();
    let client = state.client.clone();
    let request = decoded.request;

    // Spawned: an abandoned inbound connection must not cancel the upstream call.
    let call = tokio::spawn(async move { client.chat(&request, &creds).await });

    let reply = match call.await {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            error!(error = %e, "error calling chat API");
            return respond(StatusCode::INTERNAL_SERVER_ERROR, CALL_FAILED, String::new());
        }
        Err(e) => {
            error!(error = %e, "chat API task failed");
            return respond(StatusCode::INTERNAL_SERVER_ERROR, CALL_FAILED, String::new());
        }
    };

    debug!(?reply, "coze API response");

    match extract_answer(&reply) {
        Ok(answer) => respond(StatusCode::OK, answer, reply.conversation_id.clone()),
        Err(e) => {
            warn!(
                error = %e,
                code = reply.code,
                msg = %reply.msg,
                "coze reply carried no answer"
            );
            respond(StatusCode::INTERNAL_SERVER_ERROR, NO_ANSWER, String::new())
        }
    }
}
