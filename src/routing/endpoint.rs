//! Route model shared by both resolver strategies.
//!
//! # Responsibilities
//! - Describe one discovered route (code location, handler, path, method)
//! - Parse dotted handler references into module path + entry point
//! - Define the supported HTTP method set
//!
//! # Design Decisions
//! - Endpoints are plain immutable values; the route table owns them
//! - Handler references are only parsed here, never resolved (resolution is
//!   the invocation engine's job and happens lazily per request)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use axum::http::Method;
use serde::Serialize;
use thiserror::Error;

/// HTTP methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Matches every request method.
    Any,
}

impl RouteMethod {
    /// Lowercase name, as written in templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "get",
            RouteMethod::Post => "post",
            RouteMethod::Put => "put",
            RouteMethod::Patch => "patch",
            RouteMethod::Delete => "delete",
            RouteMethod::Head => "head",
            RouteMethod::Options => "options",
            RouteMethod::Any => "any",
        }
    }

    /// Returns true if a request with `method` should be dispatched to this route.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            RouteMethod::Any => true,
            RouteMethod::Get => method == Method::GET,
            RouteMethod::Post => method == Method::POST,
            RouteMethod::Put => method == Method::PUT,
            RouteMethod::Patch => method == Method::PATCH,
            RouteMethod::Delete => method == Method::DELETE,
            RouteMethod::Head => method == Method::HEAD,
            RouteMethod::Options => method == Method::OPTIONS,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for method names outside [`RouteMethod`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown HTTP method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for RouteMethod {
    type Err = UnknownMethod;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(RouteMethod::Get),
            "post" => Ok(RouteMethod::Post),
            "put" => Ok(RouteMethod::Put),
            "patch" => Ok(RouteMethod::Patch),
            "delete" => Ok(RouteMethod::Delete),
            "head" => Ok(RouteMethod::Head),
            "options" => Ok(RouteMethod::Options),
            "any" => Ok(RouteMethod::Any),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// A `<module-path>.<entry-point>` handler reference.
///
/// The split happens at the last dot, so `pkg.app.handler` names entry point
/// `handler` in module `pkg.app` (file `pkg/app.<ext>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct HandlerRef {
    module: String,
    entry_point: String,
}

/// Error for malformed handler references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler reference `{0}` must look like <module>.<entry-point>")]
pub struct InvalidHandlerRef(pub String);

impl HandlerRef {
    /// Dotted module path, e.g. `pkg.app`.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Relative file path of the module, without extension.
    pub fn module_path(&self) -> PathBuf {
        self.module.split('.').collect()
    }
}

impl FromStr for HandlerRef {
    type Err = InvalidHandlerRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidHandlerRef(s.to_string());
        let (module, entry_point) = s.trim().rsplit_once('.').ok_or_else(invalid)?;
        if module.is_empty()
            || entry_point.is_empty()
            || module.split('.').any(str::is_empty)
        {
            return Err(invalid());
        }
        Ok(Self {
            module: module.to_string(),
            entry_point: entry_point.to_string(),
        })
    }
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.entry_point)
    }
}

impl From<HandlerRef> for String {
    fn from(handler: HandlerRef) -> Self {
        handler.to_string()
    }
}

/// One discovered route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// Code location, relative to the gateway's handler base path.
    pub code_uri: PathBuf,
    pub handler: HandlerRef,
    /// URL path template, e.g. `/items/{id}`.
    pub path: String,
    pub method: RouteMethod,
}

impl Endpoint {
    pub fn new(
        code_uri: impl AsRef<Path>,
        handler: HandlerRef,
        path: impl Into<String>,
        method: RouteMethod,
    ) -> Self {
        Self {
            code_uri: code_uri.as_ref().to_path_buf(),
            handler,
            path: path.into(),
            method,
        }
    }

    /// Route label used in logs and metrics, e.g. `GET /items`.
    pub fn route_key(&self) -> String {
        format!("{} {}", self.method.as_str().to_ascii_uppercase(), self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Endpoint({}, {}, {}, {})",
            self.code_uri.display(),
            self.handler,
            self.path,
            self.method
        )
    }
}
