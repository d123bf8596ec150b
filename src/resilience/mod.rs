//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Invocation:
//!     → timeouts.rs (race against the configured deadline)
//!     → on expiry: cancel token fired, in-flight future dropped
//! ```
//!
//! # Design Decisions
//! - One attempt per request; there is no retry layer
//! - A timed-out invocation can never write into the response

pub mod timeouts;

pub use timeouts::{run_bounded, Bounded, CancelSource, CancelToken};
