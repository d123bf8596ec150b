//! Bounded handler execution.
//!
//! # Responsibilities
//! - Resolve the handler for an endpoint, on every request
//! - Run it against an event, racing the configured timeout
//! - Turn every outcome into an `InvocationResult`
//!
//! # Design Decisions
//! - One attempt per request, no retries
//! - Nothing raised by a handler escapes: errors and panics become 500s,
//!   an expired deadline becomes a 408
//! - A timed-out invocation is dropped and its cancel token fired; its
//!   eventual output has nowhere to go
//!
//! # State Machine
//! ```text
//! PENDING → COMPLETED   handler returned an object
//!         → TIMED_OUT   deadline expired first
//!         → FAILED      resolution error, handler error, panic, malformed result
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::Value;

use crate::config::environment::HandlerEnvironment;
use crate::event::InvocationResult;
use crate::invocation::error::{HandlerError, InvocationError, ResolutionError};
use crate::invocation::handler::{HandlerResolver, InvocationContext};
use crate::resilience::{run_bounded, Bounded, CancelSource};
use crate::routing::{Endpoint, HandlerRef};

/// Terminal state of one invocation.
#[derive(Debug)]
pub enum InvocationOutcome {
    Completed,
    TimedOut(Duration),
    Failed(InvocationError),
}

impl InvocationOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            InvocationOutcome::Completed => "completed",
            InvocationOutcome::TimedOut(_) => "timed_out",
            InvocationOutcome::Failed(_) => "failed",
        }
    }
}

/// Result of [`InvocationEngine::invoke`].
#[derive(Debug)]
pub struct Invocation {
    pub result: InvocationResult,
    pub outcome: InvocationOutcome,
    pub elapsed: Duration,
}

/// Executes handlers under a timeout budget.
pub struct InvocationEngine {
    resolver: Arc<dyn HandlerResolver>,
    base_path: PathBuf,
    timeout: Option<Duration>,
    environment: Arc<HandlerEnvironment>,
}

impl InvocationEngine {
    /// `base_path` is joined with each endpoint's code location.
    pub fn new(resolver: Arc<dyn HandlerResolver>, base_path: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            resolver,
            base_path: base_path.into(),
            timeout,
            environment: Arc::new(HandlerEnvironment::new()),
        }
    }

    pub fn with_environment(mut self, environment: HandlerEnvironment) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn environment(&self) -> &HandlerEnvironment {
        &self.environment
    }

    /// Directory the endpoint's handler module is looked up in.
    pub fn code_location(&self, endpoint: &Endpoint) -> PathBuf {
        self.base_path.join(&endpoint.code_uri)
    }

    /// Check every endpoint's handler once, failing on the first whose
    /// module or entry point cannot be loaded.
    pub fn preflight<'a>(&self, endpoints: impl IntoIterator<Item = &'a Endpoint>) -> Result<(), ResolutionError> {
        for endpoint in endpoints {
            self.resolver
                .check(&self.code_location(endpoint), &endpoint.handler, &self.environment)?;
            tracing::debug!(handler = %endpoint.handler, route = %endpoint.route_key(), "Handler resolved");
        }
        Ok(())
    }

    /// Invoke the endpoint's handler with the engine's timeout.
    pub async fn invoke(&self, endpoint: &Endpoint, event: Value, request_id: &str) -> Invocation {
        self.invoke_handler(&self.code_location(endpoint), &endpoint.handler, event, request_id, self.timeout)
            .await
    }

    /// Resolve `handler` under `code_location` and run it, bounded by `timeout`.
    pub async fn invoke_handler(
        &self,
        code_location: &Path,
        handler: &HandlerRef,
        event: Value,
        request_id: &str,
        timeout: Option<Duration>,
    ) -> Invocation {
        let started = Instant::now();

        let (result, outcome) = match self.resolver.resolve(code_location, handler) {
            Err(err) => failure(err.into()),
            Ok(invocable) => {
                let cancel = CancelSource::new();
                let context = InvocationContext {
                    request_id: request_id.to_string(),
                    function_name: handler.to_string(),
                    deadline: timeout.map(|t| started + t),
                    environment: Arc::clone(&self.environment),
                    cancel: cancel.token(),
                };
                let call = AssertUnwindSafe(invocable.invoke(event, context)).catch_unwind();

                match run_bounded(timeout, &cancel, call).await {
                    Bounded::Completed(Ok(Ok(value))) => match InvocationResult::from_value(value) {
                        Ok(result) => (result, InvocationOutcome::Completed),
                        Err(err) => failure(err.into()),
                    },
                    Bounded::Completed(Ok(Err(err))) => failure(err),
                    Bounded::Completed(Err(panic)) => {
                        failure(HandlerError::Panicked(panic_message(panic.as_ref())).into())
                    }
                    Bounded::TimedOut => (
                        InvocationResult::timeout(),
                        InvocationOutcome::TimedOut(timeout.unwrap_or_default()),
                    ),
                }
            }
        };

        let elapsed = started.elapsed();
        match &outcome {
            InvocationOutcome::Completed => tracing::info!(
                request_id,
                handler = %handler,
                status = result.status().as_u16(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Invocation completed"
            ),
            InvocationOutcome::TimedOut(limit) => tracing::warn!(
                request_id,
                handler = %handler,
                timeout = ?limit,
                "Invocation timed out"
            ),
            InvocationOutcome::Failed(err) => tracing::error!(
                request_id,
                handler = %handler,
                error = %err,
                elapsed_ms = elapsed.as_millis() as u64,
                "Invocation failed"
            ),
        }

        Invocation {
            result,
            outcome,
            elapsed,
        }
    }
}

impl std::fmt::Debug for InvocationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationEngine")
            .field("base_path", &self.base_path)
            .field("timeout", &self.timeout)
            .field("environment", &self.environment.len())
            .finish()
    }
}

fn failure(err: InvocationError) -> (InvocationResult, InvocationOutcome) {
    let result = match &err {
        InvocationError::Resolution(_) => InvocationResult::handler_not_found(),
        InvocationError::Handler(_) => InvocationResult::handler_error(),
    };
    (result, InvocationOutcome::Failed(err))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
