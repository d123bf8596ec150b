//! Local API gateway for serverless function handlers.
//!
//! Routes come from an infrastructure description (a SAM template or CDK
//! stack source), requests are translated into version 1.0 or 2.0 events,
//! handlers run under a timeout, and their results become HTTP responses.

pub mod config;
pub mod event;
pub mod http;
pub mod invocation;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use config::GatewayConfig;
pub use event::{Event, InvocationResult, PayloadVersion};
pub use http::GatewayServer;
pub use invocation::{HandlerRegistry, InvocationEngine, ProcessResolver};
pub use lifecycle::{Gateway, Shutdown};
pub use routing::{resolve_routes, Endpoint, RouteTable};
