//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Discovery (at startup):
//!     infrastructure description (template.yaml | stack.ts)
//!     → RouteResolver (template.rs | source_scan.rs)
//!     → Endpoint[] (endpoint.rs)
//!     → RouteTable (router.rs + matcher.rs), frozen
//!
//! Per request:
//!     method + path → RouteTable::lookup → Endpoint + path parameters
//! ```
//!
//! # Design Decisions
//! - Both strategies sit behind `RouteResolver`; callers never know which
//!   one produced the table
//! - Strategy is picked from the file extension, falling back to sniffing
//!   the content for a `Resources` mapping
//! - The template strategy fails fast; the source-scanning strategy never fails

pub mod endpoint;
pub mod matcher;
pub mod router;
pub mod scanner;
pub mod source_scan;
pub mod template;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use endpoint::{Endpoint, HandlerRef, InvalidHandlerRef, RouteMethod};
pub use router::{RouteMatch, RouteTable};
pub use source_scan::{EnvBinding, EnvSource, SourceScanResolver};
pub use template::TemplateResolver;

/// Fatal errors in the infrastructure description.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed template: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("`{method}` not supported in {resource} / {event}")]
    UnsupportedMethod {
        method: String,
        resource: String,
        event: String,
    },

    #[error("{resource} is missing required property `{property}`")]
    MissingProperty { resource: String, property: String },

    #[error("{resource}: `{property}` must be {expected}")]
    InvalidProperty {
        resource: String,
        property: String,
        expected: &'static str,
    },

    #[error("{resource}: {source}")]
    InvalidHandler {
        resource: String,
        source: InvalidHandlerRef,
    },

    #[error("invalid route path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("route {method} {path} is declared more than once")]
    DuplicateRoute { method: RouteMethod, path: String },
}

/// Produces the endpoints declared by an infrastructure description.
///
/// The sequence is lazy and finite; calling `endpoints` again walks the
/// description again. Collect into `Result<Vec<_>, _>` to abort on the first
/// error.
pub trait RouteResolver: Send + Sync {
    fn endpoints(&self) -> Box<dyn Iterator<Item = Result<Endpoint, ConfigError>> + '_>;
}

/// Which resolver strategy a description file needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionKind {
    Template,
    Source,
}

impl DescriptionKind {
    /// Pick a strategy from the file extension, or from `content` if the
    /// extension is not conclusive.
    pub fn detect(path: &Path, content: &str) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("yaml" | "yml" | "json" | "template") => DescriptionKind::Template,
            Some("ts" | "js" | "mjs" | "cjs" | "mts" | "cts") => DescriptionKind::Source,
            _ => {
                let looks_like_template = serde_yaml::from_str::<serde_yaml::Value>(content)
                    .map(|doc| doc.get("Resources").is_some())
                    .unwrap_or(false);
                if looks_like_template {
                    DescriptionKind::Template
                } else {
                    DescriptionKind::Source
                }
            }
        }
    }
}

/// Read `path` and return the matching resolver.
pub fn resolver_for(path: &Path) -> Result<Box<dyn RouteResolver>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let resolver: Box<dyn RouteResolver> = match DescriptionKind::detect(path, &content) {
        DescriptionKind::Template => Box::new(TemplateResolver::from_yaml(&content)?),
        DescriptionKind::Source => Box::new(SourceScanResolver::new(content)),
    };
    Ok(resolver)
}

/// Resolve every endpoint declared in `path`, aborting on the first error.
pub fn resolve_routes(path: &Path) -> Result<Vec<Endpoint>, ConfigError> {
    resolver_for(path)?.endpoints().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(
            DescriptionKind::detect(Path::new("template.yaml"), ""),
            DescriptionKind::Template
        );
        assert_eq!(
            DescriptionKind::detect(Path::new("lib/stack.TS"), ""),
            DescriptionKind::Source
        );
    }

    #[test]
    fn test_detect_by_content() {
        assert_eq!(
            DescriptionKind::detect(Path::new("template"), "Resources: {}"),
            DescriptionKind::Template
        );
        assert_eq!(
            DescriptionKind::detect(Path::new("stack"), "const x = createLambda(this, 'a', 'b.c');"),
            DescriptionKind::Source
        );
    }

    #[test]
    fn test_resolve_routes_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "Resources:\n  Fn:\n    Type: AWS::Serverless::Function\n    Properties:\n      CodeUri: ./src\n      Handler: app.handler\n      Events:\n        Get:\n          Type: HttpApi\n          Properties:\n            Path: /items\n            Method: get"
        )
        .unwrap();

        let endpoints = resolve_routes(file.path()).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].to_string(), "Endpoint(./src, app.handler, /items, get)");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            resolve_routes(Path::new("/definitely/not/here.yaml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
