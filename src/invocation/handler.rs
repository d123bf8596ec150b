//! The seam between the engine and whatever actually runs handler code.
//!
//! # Responsibilities
//! - Define the callable capability (`Invocable`) the engine executes
//! - Define how a handler reference becomes one (`HandlerResolver`)
//! - Carry per-invocation context: request id, deadline, environment, cancellation
//!
//! # Design Decisions
//! - Resolution is by module location and entry-point name only
//! - Invocations are `'static` boxed futures so the engine can drop them on timeout
//! - Environment is passed in, never read from or written to the gateway process

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::config::environment::HandlerEnvironment;
use crate::invocation::error::{InvocationError, ResolutionError};
use crate::resilience::CancelToken;
use crate::routing::HandlerRef;

/// Per-invocation context, the optional second argument to a handler.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub request_id: String,
    /// Handler reference, e.g. `app.handler`.
    pub function_name: String,
    pub deadline: Option<Instant>,
    pub environment: Arc<HandlerEnvironment>,
    pub cancel: CancelToken,
}

impl InvocationContext {
    /// Time left before the deadline, `None` if unbounded.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Deadline as Unix epoch milliseconds.
    pub fn deadline_ms(&self) -> Option<u128> {
        let remaining = self.remaining_time()?;
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
        Some((now + remaining).as_millis())
    }

    /// Wire form used by out-of-process handlers.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "requestId": self.request_id,
            "functionName": self.function_name,
            "deadlineMs": self.deadline_ms().map(|ms| ms as u64),
        })
    }
}

/// A resolved handler.
pub trait Invocable: Send + Sync {
    /// Run the handler once. The returned value is the handler's raw result.
    fn invoke(&self, event: Value, context: InvocationContext) -> BoxFuture<'static, Result<Value, InvocationError>>;
}

/// Turns a handler reference into an [`Invocable`].
pub trait HandlerResolver: Send + Sync {
    fn resolve(&self, code_location: &Path, handler: &HandlerRef) -> Result<Arc<dyn Invocable>, ResolutionError>;

    /// Startup check: the handler loads and its entry point exists. Nothing
    /// is invoked. Defaults to a plain [`resolve`](Self::resolve).
    fn check(
        &self,
        code_location: &Path,
        handler: &HandlerRef,
        _environment: &HandlerEnvironment,
    ) -> Result<(), ResolutionError> {
        self.resolve(code_location, handler).map(|_| ())
    }
}
