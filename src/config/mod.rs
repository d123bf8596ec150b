//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → config file, TOML (loader.rs)
//!     → command-line flags (cli.rs)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! env file (JSON groups) / recovered env-builder bindings
//!     → environment.rs
//!     → HandlerEnvironment, handed to the invocation engine
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod environment;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use environment::{EnvironmentError, HandlerEnvironment};
pub use loader::{load_config, ConfigFileError};
pub use schema::{CorsConfig, GatewayConfig, HandlersConfig, InvocationConfig, ListenerConfig, ObservabilityConfig};
