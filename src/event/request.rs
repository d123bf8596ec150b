//! Request to event translation.
//!
//! # Responsibilities
//! - Capture method, path, query, headers and body of an inbound request
//! - Strip any query string from the path before path-derived fields are built
//! - Build the 1.0 or 2.0 event shape
//!
//! # Design Decisions
//! - Body is read once, as text; a request that declares no body is never read
//! - Header names are lowercase; repeated headers and query keys are joined with `,`
//! - Oversized bodies are rejected before anything is buffered past the limit

use std::collections::BTreeMap;

use axum::body::{Body, HttpBody};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use thiserror::Error;

use crate::event::{Event, EventV1, EventV2, HttpContext, PayloadVersion, RequestContext};

/// Header that overrides the synthesized 2.0 `routeKey`.
pub const ROUTE_KEY_HEADER: &str = "x-route-key";

/// Errors reading the request body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(#[from] axum::Error),
}

impl IntoResponse for BodyError {
    fn into_response(self) -> Response {
        let status = match self {
            BodyError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            BodyError::Read(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Transport-independent view of one HTTP request.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    method: Method,
    path: String,
    raw_query: String,
    headers: HeaderMap,
    body: String,
    path_parameters: BTreeMap<String, String>,
    request_id: Option<String>,
}

impl GatewayRequest {
    /// `target` is the request target as sent, e.g. `/items?limit=5`.
    pub fn new(method: Method, target: &str, headers: HeaderMap, body: impl Into<String>) -> Self {
        let (path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        let path = if path.is_empty() { "/" } else { path };

        Self {
            method,
            path: path.to_string(),
            raw_query: raw_query.to_string(),
            headers,
            body: body.into(),
            path_parameters: BTreeMap::new(),
            request_id: None,
        }
    }

    /// Read an axum request, buffering at most `limit` body bytes.
    pub async fn from_http(request: Request<Body>, limit: usize) -> Result<Self, BodyError> {
        let (parts, body) = request.into_parts();

        let declared_length = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared_length.is_some_and(|len| len > limit) {
            return Err(BodyError::TooLarge { limit });
        }

        let body = if body.is_end_stream() || declared_length == Some(0) {
            String::new()
        } else {
            let mut buffer = Vec::with_capacity(declared_length.unwrap_or(0));
            let mut chunks = body.into_data_stream();
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk?;
                if buffer.len() + chunk.len() > limit {
                    return Err(BodyError::TooLarge { limit });
                }
                buffer.extend_from_slice(&chunk);
            }
            String::from_utf8_lossy(&buffer).into_owned()
        };

        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Ok(Self::new(parts.method, target, parts.headers, body))
    }

    /// Values captured from the matched route template.
    pub fn with_path_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.path_parameters = parameters;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path without query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    fn header_map(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        for name in self.headers.keys() {
            let value = self
                .headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            headers.insert(name.as_str().to_string(), value);
        }
        headers
    }

    fn query_parameters(&self) -> BTreeMap<String, String> {
        let mut params: BTreeMap<String, String> = BTreeMap::new();
        for (key, value) in url::form_urlencoded::parse(self.raw_query.as_bytes()) {
            params
                .entry(key.into_owned())
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(&value);
                })
                .or_insert_with(|| value.clone().into_owned());
        }
        params
    }

    fn path_parameters(&self) -> Option<BTreeMap<String, String>> {
        (!self.path_parameters.is_empty()).then(|| self.path_parameters.clone())
    }

    /// `x-route-key` header if present, else `"<METHOD> <path>"`.
    pub fn route_key(&self) -> String {
        self.headers
            .get(ROUTE_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} {}", self.method, self.decoded_path()))
    }

    /// Request path with percent-escapes decoded; `rawPath` keeps the original.
    fn decoded_path(&self) -> String {
        percent_encoding::percent_decode_str(&self.path)
            .decode_utf8_lossy()
            .into_owned()
    }

    /// Build the event for `version`.
    pub fn to_event(&self, version: PayloadVersion) -> Event {
        match version {
            PayloadVersion::V1 => Event::V1(EventV1 {
                version,
                body: self.body.clone(),
                headers: self.header_map(),
                http_method: self.method.to_string(),
                path: self.decoded_path(),
                query_string_parameters: self.query_parameters(),
                path_parameters: self.path_parameters(),
                is_base64_encoded: false,
            }),
            PayloadVersion::V2 => Event::V2(EventV2 {
                version,
                body: self.body.clone(),
                route_key: self.route_key(),
                raw_path: self.path.clone(),
                raw_query_string: self.raw_query.clone(),
                headers: self.header_map(),
                query_string_parameters: self.query_parameters(),
                path_parameters: self.path_parameters(),
                request_context: RequestContext {
                    http: HttpContext {
                        method: self.method.to_string(),
                        path: self.decoded_path(),
                    },
                    request_id: self.request_id.clone(),
                },
                is_base64_encoded: false,
            }),
        }
    }
}
