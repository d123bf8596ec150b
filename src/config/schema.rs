//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::event::PayloadVersion;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Infrastructure description (SAM template or CDK source).
    pub template: Option<PathBuf>,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Event version, timeout and body limit.
    pub invocation: InvocationConfig,

    /// Where handler code lives and what environment it sees.
    pub handlers: HandlersConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub cors: CorsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Invocation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InvocationConfig {
    /// Per-invocation timeout in seconds; unset means wait forever.
    pub timeout_secs: Option<u64>,

    /// Event payload format version.
    pub payload_version: PayloadVersion,

    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl InvocationConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            payload_version: PayloadVersion::default(),
            max_body_bytes: 6 * 1024 * 1024,
        }
    }
}

/// Handler code settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandlersConfig {
    /// Directory endpoint code locations are relative to.
    pub base_path: PathBuf,

    /// JSON file of environment variable groups.
    pub env_file: Option<PathBuf>,

    /// Name of an environment-builder function in a CDK source description.
    pub env_builder: Option<String>,

    /// Resolve every handler at startup and refuse to start on a miss.
    pub eager_resolve: bool,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            env_file: None,
            env_builder: None,
            eager_resolve: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter, used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Prometheus endpoint bind address; no endpoint when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "lambda_gateway=info,tower_http=info".to_string(),
            metrics_address: None,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Answer preflights and add permissive CORS headers.
    pub enabled: bool,
}
