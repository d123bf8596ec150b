//! Handler invocation subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint + Event (JSON)
//!     → engine.rs (resolve, race the deadline, map outcome)
//!         → HandlerResolver::resolve (handler.rs)
//!             ├── registry.rs  in-process closures
//!             └── process.rs   script / executable per request (runtime.rs)
//!         → Invocable::invoke
//!     → InvocationResult + InvocationOutcome
//! ```
//!
//! # Design Decisions
//! - The engine only knows the `HandlerResolver` / `Invocable` traits
//! - Handlers are re-resolved for every request so edits on disk are picked up
//! - Startup may resolve every route once up front (`preflight`) to fail fast

pub mod engine;
pub mod error;
pub mod handler;
pub mod process;
pub mod registry;
pub mod runtime;

pub use engine::{Invocation, InvocationEngine, InvocationOutcome};
pub use error::{HandlerError, InvocationError, ResolutionError};
pub use handler::{HandlerResolver, Invocable, InvocationContext};
pub use process::ProcessResolver;
pub use registry::HandlerRegistry;
pub use runtime::Runtime;
