//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve routes from the infrastructure description
//! - Build the handler environment overlay
//! - Build the invocation engine and, optionally, resolve every handler once
//! - Bind the listener last
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::{EnvironmentError, GatewayConfig, HandlerEnvironment};
use crate::http::GatewayServer;
use crate::invocation::{HandlerResolver, InvocationEngine, ProcessResolver, ResolutionError};
use crate::routing::{self, ConfigError, DescriptionKind, RouteTable, SourceScanResolver};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no infrastructure description configured")]
    MissingTemplate,

    #[error("invalid infrastructure description: {0}")]
    Routes(#[from] ConfigError),

    #[error("invalid handler environment: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("handler resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
}

/// A fully initialized gateway, not yet listening.
pub struct Gateway {
    pub config: GatewayConfig,
    pub server: GatewayServer,
}

impl Gateway {
    /// Build a gateway whose handlers run as local processes.
    pub fn bootstrap(config: &GatewayConfig) -> Result<Self, StartupError> {
        Self::bootstrap_with(config, Arc::new(ProcessResolver::new()))
    }

    /// Build a gateway over any handler resolver.
    pub fn bootstrap_with(config: &GatewayConfig, resolver: Arc<dyn HandlerResolver>) -> Result<Self, StartupError> {
        let template = config.template.as_deref().ok_or(StartupError::MissingTemplate)?;

        let endpoints = routing::resolve_routes(template)?;
        for endpoint in &endpoints {
            tracing::info!(
                route = %endpoint.route_key(),
                handler = %endpoint.handler,
                code_uri = %endpoint.code_uri.display(),
                "Registered route"
            );
        }
        let routes = RouteTable::new(endpoints)?;
        if routes.is_empty() {
            tracing::warn!(template = %template.display(), "No routes found");
        }

        let environment = build_environment(config, template)?;
        if !environment.is_empty() {
            tracing::info!(variables = environment.len(), "Handler environment loaded");
        }

        let engine = InvocationEngine::new(resolver, &config.handlers.base_path, config.invocation.timeout())
            .with_environment(environment);

        if config.handlers.eager_resolve {
            engine.preflight(routes.endpoints())?;
        }

        tracing::info!(
            routes = routes.len(),
            payload_version = %config.invocation.payload_version,
            timeout_secs = ?config.invocation.timeout_secs,
            "Gateway initialized"
        );

        let server = GatewayServer::new(routes, engine, config);
        Ok(Self {
            config: config.clone(),
            server,
        })
    }

    /// Bind the configured listener address.
    pub async fn bind(&self) -> Result<TcpListener, StartupError> {
        let address = &self.config.listener.bind_address;
        TcpListener::bind(address)
            .await
            .map_err(|source| StartupError::Bind {
                address: address.clone(),
                source,
            })
    }

    /// Serve until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        self.server.run(listener, shutdown).await
    }
}

/// Env file groups, narrowed through the env-builder mapping when one is
/// configured and the description is scannable source.
fn build_environment(config: &GatewayConfig, template: &Path) -> Result<HandlerEnvironment, StartupError> {
    let from_file = match &config.handlers.env_file {
        Some(path) => HandlerEnvironment::from_file(path)?,
        None => HandlerEnvironment::new(),
    };

    let Some(builder) = config.handlers.env_builder.as_deref() else {
        return Ok(from_file);
    };

    let content = std::fs::read_to_string(template).map_err(|source| ConfigError::Io {
        path: template.to_path_buf(),
        source,
    })?;
    if DescriptionKind::detect(template, &content) != DescriptionKind::Source {
        tracing::warn!(builder, "Environment builders are only read from source descriptions; ignoring");
        return Ok(from_file);
    }

    let bindings = SourceScanResolver::new(content).environment_bindings(builder);
    if bindings.is_empty() {
        tracing::warn!(builder, "Environment builder not found or empty");
    }
    Ok(HandlerEnvironment::from_bindings(&bindings, &from_file, |name| {
        std::env::var(name).ok()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::HandlerRegistry;
    use serde_json::json;

    const TEMPLATE: &str = "Resources:\n  Fn:\n    Type: AWS::Serverless::Function\n    Properties:\n      CodeUri: ./src\n      Handler: app.handler\n      Events:\n        Get:\n          Type: HttpApi\n          Properties:\n            Path: /items\n            Method: get\n";

    fn config_for(dir: &Path, file: &str, content: &str) -> GatewayConfig {
        let path = dir.join(file);
        std::fs::write(&path, content).unwrap();
        let mut config = GatewayConfig::default();
        config.template = Some(path);
        config.handlers.base_path = dir.to_path_buf();
        config.listener.bind_address = "127.0.0.1:0".into();
        config
    }

    #[test]
    fn test_eager_resolution_fails_on_missing_handler() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), "template.yaml", TEMPLATE);
        let result = Gateway::bootstrap(&config);
        assert!(matches!(result, Err(StartupError::Resolution(_))));
    }

    #[test]
    fn test_lazy_resolution_starts_anyway() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path(), "template.yaml", TEMPLATE);
        config.handlers.eager_resolve = false;
        let gateway = Gateway::bootstrap(&config).unwrap();
        assert_eq!(gateway.server.routes().len(), 1);
    }

    #[test]
    fn test_bootstrap_with_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), "template.yaml", TEMPLATE);
        let registry = HandlerRegistry::new().with("app.handler", |_e, _c| async { Ok(json!({})) });
        assert!(Gateway::bootstrap_with(&config, Arc::new(registry)).is_ok());
    }

    #[test]
    fn test_bad_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let bad = TEMPLATE.replace("Method: get", "Method: delete");
        let config = config_for(dir.path(), "template.yaml", &bad);
        assert!(matches!(
            Gateway::bootstrap(&config),
            Err(StartupError::Routes(ConfigError::UnsupportedMethod { .. }))
        ));
    }

    #[test]
    fn test_environment_from_builder_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let source = r#"
const env = (config: Config) => {
  return {
    TABLE_NAME: config.tableName,
  };
};
const fn = createLambda(this, 'Items', 'app.handler');
"#;
        let mut config = config_for(dir.path(), "stack.ts", source);
        let env_file = dir.path().join("env.json");
        std::fs::write(&env_file, r#"{"Shared": {"tableName": "items"}}"#).unwrap();
        config.handlers.env_file = Some(env_file);
        config.handlers.env_builder = Some("env".into());

        let environment = build_environment(&config, config.template.as_deref().unwrap()).unwrap();
        assert_eq!(environment.get("TABLE_NAME"), Some("items"));
        assert_eq!(environment.get("tableName"), None);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path(), "template.yaml", TEMPLATE);
        config.handlers.eager_resolve = false;
        let gateway = Gateway::bootstrap(&config).unwrap();
        let listener = gateway.bind().await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
