//! lambda-gateway
//!
//! Serves the HTTP routes declared in a SAM template or CDK stack and runs
//! the handlers behind them locally.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                    LAMBDA GATEWAY                     │
//!                     │                                                       │
//!   template.yaml ────┼─▶ routing (template | source scan) ─▶ RouteTable      │
//!   stack.ts          │                                          │            │
//!                     │                                          ▼            │
//!   Client Request ───┼─▶ http server ─▶ event (1.0 | 2.0) ─▶ invocation      │
//!                     │                                        engine         │
//!                     │                                          │            │
//!                     │                                          ▼            │
//!   Client Response ◀─┼── InvocationResult ◀── handler (process | registry)   │
//!                     │                                                       │
//!                     │  config · observability · resilience · lifecycle      │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use lambda_gateway::config::Cli;
use lambda_gateway::lifecycle::{signals, Gateway, Shutdown};
use lambda_gateway::observability::{logging, metrics};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if cli.print_version {
        println!("lambda-gateway {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("lambda-gateway: {err}");
            std::process::exit(2);
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lambda-gateway starting");

    if let Some(address) = &config.observability.metrics_address {
        metrics::init_metrics(address.parse()?)?;
    }

    let gateway = match Gateway::bootstrap(&config) {
        Ok(gateway) => gateway,
        Err(err) => {
            tracing::error!(error = %err, "Startup failed");
            std::process::exit(1);
        }
    };

    let listener = gateway.bind().await?;

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_termination().await;
        shutdown.trigger();
    });

    gateway.serve(listener, stop).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
