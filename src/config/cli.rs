//! Command-line interface.
//!
//! Flags override the TOML file given with `-c`, which overrides the
//! built-in defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{read_config, ConfigFileError};
use crate::config::schema::GatewayConfig;
use crate::config::validation::validate_config;
use crate::event::PayloadVersion;

/// Local API gateway for serverless function handlers.
#[derive(Debug, Parser)]
#[command(name = "lambda-gateway", disable_version_flag = true)]
pub struct Cli {
    /// SAM template (.yaml/.json) or CDK stack source (.ts/.js).
    #[arg(value_name = "TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Directory handler code locations are relative to.
    #[arg(short = 'B', long, value_name = "DIR")]
    pub base_path: Option<PathBuf>,

    /// Host (or host:port) to listen on.
    #[arg(short = 'b', long, value_name = "HOST")]
    pub bind: Option<String>,

    /// Port to listen on [default: 8000].
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Handler timeout.
    #[arg(short = 't', long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Event payload version.
    #[arg(short = 'V', long, value_enum)]
    pub payload_version: Option<PayloadVersion>,

    /// Print version and exit.
    #[arg(short = 'v', long = "version")]
    pub print_version: bool,

    /// TOML configuration file.
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON file of environment variable groups for handlers.
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Environment-builder function to read from a CDK source description.
    #[arg(long, value_name = "NAME")]
    pub env_builder: Option<String>,

    /// Enable permissive CORS.
    #[arg(long)]
    pub cors: bool,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_address: Option<String>,

    /// Log filter, e.g. `debug` or `lambda_gateway=trace`.
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Resolve handlers only when first requested.
    #[arg(long)]
    pub lazy: bool,
}

impl Cli {
    /// Build the effective configuration: defaults, then `--config`, then flags.
    pub fn into_config(self) -> Result<GatewayConfig, ConfigFileError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GatewayConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigFileError::Validation)?;
        Ok(config)
    }

    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(template) = &self.template {
            config.template = Some(template.clone());
        }
        if let Some(base_path) = &self.base_path {
            config.handlers.base_path = base_path.clone();
        }
        if self.bind.is_some() || self.port.is_some() {
            config.listener.bind_address =
                bind_address(&config.listener.bind_address, self.bind.as_deref(), self.port);
        }
        if let Some(timeout) = self.timeout {
            config.invocation.timeout_secs = Some(timeout);
        }
        if let Some(version) = self.payload_version {
            config.invocation.payload_version = version;
        }
        if let Some(env_file) = &self.env_file {
            config.handlers.env_file = Some(env_file.clone());
        }
        if let Some(builder) = &self.env_builder {
            config.handlers.env_builder = Some(builder.clone());
        }
        if self.lazy {
            config.handlers.eager_resolve = false;
        }
        if self.cors {
            config.cors.enabled = true;
        }
        if let Some(address) = &self.metrics_address {
            config.observability.metrics_address = Some(address.clone());
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

/// Combine `--bind` / `--port` with the configured address.
fn bind_address(current: &str, bind: Option<&str>, port: Option<u16>) -> String {
    let (current_host, current_port) = split_host_port(current);

    let (host, bind_port) = match bind {
        Some(bind) => match bind.parse::<std::net::SocketAddr>() {
            Ok(addr) => (addr.ip().to_string(), Some(addr.port().to_string())),
            Err(_) => (bind.trim_matches(|c| c == '[' || c == ']').to_string(), None),
        },
        None => (current_host, None),
    };
    let port = port
        .map(|p| p.to_string())
        .or(bind_port)
        .unwrap_or(current_port);

    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn split_host_port(address: &str) -> (String, String) {
    match address.rsplit_once(':') {
        Some((host, port)) => (
            host.trim_matches(|c| c == '[' || c == ']').to_string(),
            port.to_string(),
        ),
        None => (address.to_string(), "8000".to_string()),
    }
}
