//! Inbound request normalization.
//!
//! The body is decoded as JSON first. If that fails for any reason (syntax,
//! wrong field type, missing or empty required field) the same bytes are
//! decoded as `application/x-www-form-urlencoded` fields, with URL query
//! parameters filling in whatever the body lacks. The `Content-Type` header
//! is never consulted.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// A validated `/txt2img` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub user_id: String,
    pub bot_id: String,
    pub prompt: String,
    /// Empty means "start a new conversation".
    pub conversation_id: String,
}

/// Which decoder produced the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Form,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Json => f.write_str("json"),
            Encoding::Form => f.write_str("form"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub request: InboundRequest,
    pub encoding: Encoding,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed {encoding} body: {detail}")]
    Malformed { encoding: Encoding, detail: String },
    #[error("{encoding} body: required field '{field}' is missing or empty")]
    MissingField { encoding: Encoding, field: &'static str },
}

/// Field names as they appear on the wire. Note `botid`, not `bot_id`.
#[derive(Debug, Default, Deserialize)]
struct WireFields {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    botid: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
}

/// Decode and validate a request body. On double failure the error is the
/// form decoder's, since that was the last attempt.
pub fn normalize(body: &[u8], query: Option<&str>) -> Result<Decoded, ValidationError> {
    match decode_json(body) {
        Ok(request) => Ok(Decoded { request, encoding: Encoding::Json }),
        Err(json_err) => {
            debug!(error = %json_err, "json decode failed, trying form fields");
            let request = decode_form(body, query)?;
            Ok(Decoded { request, encoding: Encoding::Form })
        }
    }
}

fn decode_json(body: &[u8]) -> Result<InboundRequest, ValidationError> {
    let fields: WireFields = serde_json::from_slice(body).map_err(|e| ValidationError::Malformed {
        encoding: Encoding::Json,
        detail: e.to_string(),
    })?;
    validate(fields, Encoding::Json)
}

fn decode_form(body: &[u8], query: Option<&str>) -> Result<InboundRequest, ValidationError> {
    let body_pairs = parse_pairs(body)?;
    let query_pairs = match query {
        Some(q) => parse_pairs(q.as_bytes())?,
        None => Vec::new(),
    };

    let field = |name: &str| first_value(&body_pairs, name).or_else(|| first_value(&query_pairs, name));

    let fields = WireFields {
        user_id: field("user_id"),
        botid: field("botid"),
        prompt: field("prompt"),
        conversation_id: field("conversation_id"),
    };
    validate(fields, Encoding::Form)
}

fn parse_pairs(raw: &[u8]) -> Result<Vec<(String, String)>, ValidationError> {
    serde_urlencoded::from_bytes(raw).map_err(|e| ValidationError::Malformed {
        encoding: Encoding::Form,
        detail: e.to_string(),
    })
}

fn first_value(pairs: &[(String, String)], name: &str) -> Option<String> {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

fn validate(fields: WireFields, encoding: Encoding) -> Result<InboundRequest, ValidationError> {
    let required = |value: Option<String>, field: &'static str| {
        value
            .filter(|v| !v.is_empty())
            .ok_or(ValidationError::MissingField { encoding, field })
    };

    Ok(InboundRequest {
        user_id: required(fields.user_id, "user_id")?,
        bot_id: required(fields.botid, "botid")?,
        prompt: required(fields.prompt, "prompt")?,
        conversation_id: fields.conversation_id.unwrap_or_default(),
    })
}
