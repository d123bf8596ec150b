//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, CORS)
//!     → RouteTable lookup (404 / 405 short-circuit)
//!     → event::GatewayRequest → Event
//!     → invocation::InvocationEngine
//!     → event::InvocationResult → response
//!     → Send to client
//! ```

pub mod server;

pub use server::{AppState, GatewayServer, X_REQUEST_ID};
