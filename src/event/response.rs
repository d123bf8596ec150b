//! Invocation result to HTTP response translation.
//!
//! # Responsibilities
//! - Read a handler's JSON result into an `InvocationResult`
//! - Synthesize results for timeouts and failed invocations
//! - Build the HTTP response, filling in defaults for missing fields
//!
//! # Design Decisions
//! - Missing status is 500, missing headers are `{}`, missing body is `""`
//! - Parsing is lenient: numeric strings are accepted as status codes and
//!   non-string header values or bodies are stringified
//! - Hop-by-hop headers set by a handler are dropped; the server owns framing
//! - Nothing here fails: an unusable field degrades to its default with a warning

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

const HOP_BY_HOP: [HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
];

/// A handler result that is not a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler result must be a JSON object, got {0}")]
pub struct MalformedResult(pub &'static str);

/// Outcome of one invocation, as the handler (or the engine) reported it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl InvocationResult {
    /// A result with every field present.
    pub fn new(status_code: u16, headers: BTreeMap<String, String>, body: impl Into<String>) -> Self {
        Self {
            status_code: Some(status_code),
            headers: Some(headers),
            body: Some(body.into()),
        }
    }

    /// `408 {"Error":"TIMEOUT"}`
    pub fn timeout() -> Self {
        Self::failure(408, "TIMEOUT")
    }

    /// `500 {"Error":"HANDLER_NOT_FOUND"}`
    pub fn handler_not_found() -> Self {
        Self::failure(500, "HANDLER_NOT_FOUND")
    }

    /// `500 {"Error":"HANDLER_ERROR"}`
    pub fn handler_error() -> Self {
        Self::failure(500, "HANDLER_ERROR")
    }

    fn failure(status_code: u16, error: &str) -> Self {
        Self {
            status_code: Some(status_code),
            headers: None,
            body: Some(serde_json::json!({ "Error": error }).to_string()),
        }
    }

    /// Read a handler's JSON result.
    pub fn from_value(value: Value) -> Result<Self, MalformedResult> {
        let mut object = match value {
            Value::Object(object) => object,
            other => return Err(MalformedResult(json_kind(&other))),
        };

        Ok(Self {
            status_code: object.remove("statusCode").and_then(status_from_value),
            headers: object.remove("headers").and_then(headers_from_value),
            body: object.remove("body").and_then(text_from_value),
        })
    }

    /// Effective status: the result's own if valid, else 500.
    pub fn status(&self) -> StatusCode {
        match self.status_code {
            None => StatusCode::INTERNAL_SERVER_ERROR,
            Some(code) => StatusCode::from_u16(code).unwrap_or_else(|_| {
                tracing::warn!(status_code = code, "Handler returned an invalid status code");
                StatusCode::INTERNAL_SERVER_ERROR
            }),
        }
    }

    /// Returns true if the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }
}

impl IntoResponse for InvocationResult {
    fn into_response(self) -> Response {
        let status = self.status();

        let mut response = Response::new(Body::from(self.body.unwrap_or_default()));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in self.headers.unwrap_or_default() {
            let parsed = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            );
            match parsed {
                (Ok(name), Ok(value)) => {
                    if HOP_BY_HOP.contains(&name) {
                        continue;
                    }
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }

        response
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn status_from_value(value: Value) -> Option<u16> {
    let code = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Null => return None,
        _ => None,
    };
    let status = code.and_then(|c| u16::try_from(c).ok());
    if status.is_none() {
        tracing::warn!(status_code = %value, "Ignoring unusable statusCode");
    }
    status
}

fn headers_from_value(value: Value) -> Option<BTreeMap<String, String>> {
    match value {
        Value::Object(map) => Some(
            map.into_iter()
                .filter_map(|(name, value)| text_from_value(value).map(|v| (name, v)))
                .collect(),
        ),
        Value::Null => None,
        other => {
            tracing::warn!(headers = %other, "Ignoring headers that are not an object");
            None
        }
    }
}

fn text_from_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl From<InvocationResult> for Value {
    fn from(result: InvocationResult) -> Self {
        let mut object = Map::new();
        if let Some(code) = result.status_code {
            object.insert("statusCode".into(), code.into());
        }
        if let Some(headers) = result.headers {
            object.insert(
                "headers".into(),
                headers.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
            );
        }
        if let Some(body) = result.body {
            object.insert("body".into(), body.into());
        }
        Value::Object(object)
    }
}
