//! Event translation subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → request.rs (GatewayRequest: path/query split, headers, body text)
//!     → Event (1.0 or 2.0 shape, picked by PayloadVersion)
//!     → invocation engine
//!     → InvocationResult
//!     → response.rs (defaults, header filtering)
//!     → HTTP response
//! ```
//!
//! # Design Decisions
//! - Pure and stateless: the same request and version always give the same event
//! - The version is chosen once per gateway, never per request
//! - Each shape is its own struct so a 1.0 event can never carry 2.0 fields

pub mod request;
pub mod response;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use request::{BodyError, GatewayRequest, ROUTE_KEY_HEADER};
pub use response::{InvocationResult, MalformedResult};

/// Event payload format version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum PayloadVersion {
    #[serde(rename = "1.0")]
    #[value(name = "1.0")]
    V1,
    #[default]
    #[serde(rename = "2.0")]
    #[value(name = "2.0")]
    V2,
}

impl PayloadVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadVersion::V1 => "1.0",
            PayloadVersion::V2 => "2.0",
        }
    }
}

impl fmt::Display for PayloadVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.0" => Ok(PayloadVersion::V1),
            "2.0" => Ok(PayloadVersion::V2),
            other => Err(format!("unknown payload version `{other}` (expected 1.0 or 2.0)")),
        }
    }
}

/// Version 1.0 event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventV1 {
    pub version: PayloadVersion,
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub http_method: String,
    pub path: String,
    pub query_string_parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_parameters: Option<BTreeMap<String, String>>,
    pub is_base64_encoded: bool,
}

/// Version 2.0 event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventV2 {
    pub version: PayloadVersion,
    pub body: String,
    pub route_key: String,
    pub raw_path: String,
    pub raw_query_string: String,
    pub headers: BTreeMap<String, String>,
    pub query_string_parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_parameters: Option<BTreeMap<String, String>>,
    pub request_context: RequestContext,
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub http: HttpContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpContext {
    pub method: String,
    pub path: String,
}

/// An inbound request in event form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    V1(EventV1),
    V2(EventV2),
}

impl Event {
    pub fn version(&self) -> PayloadVersion {
        match self {
            Event::V1(_) => PayloadVersion::V1,
            Event::V2(_) => PayloadVersion::V2,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Event::V1(e) => &e.body,
            Event::V2(e) => &e.body,
        }
    }

    /// JSON form handed to handlers.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse_and_display() {
        assert_eq!("1.0".parse::<PayloadVersion>().unwrap(), PayloadVersion::V1);
        assert_eq!("2.0".parse::<PayloadVersion>().unwrap(), PayloadVersion::V2);
        assert!("3.0".parse::<PayloadVersion>().is_err());
        assert_eq!(PayloadVersion::default().to_string(), "2.0");
    }

    #[test]
    fn test_version_serializes_as_string() {
        let json = serde_json::to_value(PayloadVersion::V1).unwrap();
        assert_eq!(json, serde_json::json!("1.0"));
    }
}
