//! In-process handlers.
//!
//! Async closures registered under a handler reference. Used when the
//! gateway is embedded as a library and throughout the tests.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::invocation::error::{HandlerError, InvocationError, ResolutionError};
use crate::invocation::handler::{HandlerResolver, Invocable, InvocationContext};
use crate::routing::HandlerRef;

type HandlerFn =
    Arc<dyn Fn(Value, InvocationContext) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

/// Handlers keyed by their `<module>.<entry-point>` reference.
///
/// Code locations are ignored; a reference resolves to the same closure
/// whatever route it is declared on.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `reference`, replacing any previous one.
    pub fn register<F, Fut>(&mut self, reference: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Value, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |event, context| Box::pin(handler(event, context)));
        self.handlers.insert(reference.into().trim().to_string(), handler);
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F, Fut>(mut self, reference: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.register(reference, handler);
        self
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.handlers.contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct RegisteredHandler {
    handler: HandlerFn,
}

impl Invocable for RegisteredHandler {
    fn invoke(&self, event: Value, context: InvocationContext) -> BoxFuture<'static, Result<Value, InvocationError>> {
        let handler = Arc::clone(&self.handler);
        // The closure runs inside the returned future so a panic in its
        // synchronous part is still caught by the engine.
        Box::pin(async move { handler(event, context).await.map_err(InvocationError::from) })
    }
}

impl HandlerResolver for HandlerRegistry {
    fn resolve(&self, _code_location: &Path, handler: &HandlerRef) -> Result<Arc<dyn Invocable>, ResolutionError> {
        let key = handler.to_string();
        let handler = self
            .handlers
            .get(&key)
            .cloned()
            .ok_or(ResolutionError::NotRegistered(key))?;
        Ok(Arc::new(RegisteredHandler { handler }))
    }
}
