use std::path::PathBuf;

use thiserror::Error;

use crate::event::MalformedResult;

/// A handler reference that cannot be turned into something callable.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no module for {handler} under {} (tried {tried})", .code_location.display())]
    ModuleNotFound {
        handler: String,
        code_location: PathBuf,
        tried: String,
    },

    #[error("entry point `{entry_point}` not found in module {module}")]
    EntryPointNotFound { module: String, entry_point: String },

    #[error("module {module} failed to import: {detail}")]
    ImportFailed { module: String, detail: String },

    #[error("no handler registered for {0}")]
    NotRegistered(String),
}

/// A failure inside the handler itself.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Reported by the handler.
    #[error("{0}")]
    Failed(String),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    MalformedResult(#[from] MalformedResult),

    #[error("cannot encode event: {0}")]
    Event(#[source] serde_json::Error),

    #[error("failed to run handler process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("handler process exited with {}: {stderr}", exit_label(.code))]
    Exited { code: Option<i32>, stderr: String },

    #[error("handler output is not JSON: {0}")]
    InvalidOutput(#[source] serde_json::Error),
}

impl HandlerError {
    /// Convenience for handlers returning an error message.
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

/// Any reason an invocation did not produce a result.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl From<MalformedResult> for InvocationError {
    fn from(err: MalformedResult) -> Self {
        InvocationError::Handler(err.into())
    }
}
