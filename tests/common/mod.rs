//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lambda_gateway::config::GatewayConfig;
use lambda_gateway::invocation::HandlerResolver;
use lambda_gateway::lifecycle::{Gateway, Shutdown};

/// Write `content` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Config for a description at `template` with handlers under `base_path`,
/// listening on an ephemeral loopback port.
pub fn config(template: PathBuf, base_path: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.template = Some(template);
    config.handlers.base_path = base_path.to_path_buf();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Bootstrap and serve a gateway in the background.
///
/// The returned `Shutdown` stops it; dropping it leaves it running until the
/// test runtime exits.
pub async fn start_gateway(config: &GatewayConfig, resolver: Option<Arc<dyn HandlerResolver>>) -> (SocketAddr, Shutdown) {
    let gateway = match resolver {
        Some(resolver) => Gateway::bootstrap_with(config, resolver),
        None => Gateway::bootstrap(config),
    }
    .expect("gateway bootstraps");

    let listener = gateway.bind().await.expect("listener binds");
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = gateway.serve(listener, stop).await;
    });

    (addr, shutdown)
}

/// Client that never pools or proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
