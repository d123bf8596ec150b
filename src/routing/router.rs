//! Route table lookup.
//!
//! # Responsibilities
//! - Compile resolved endpoints into path patterns
//! - Look up the endpoint for a request method and path
//! - Distinguish "no such path" from "path exists, method not allowed"
//!
//! # Design Decisions
//! - Built once at startup, read-only afterwards (shared via `Arc`, no locks)
//! - Two endpoints for the same path and method are a configuration error
//! - Most specific path wins; within a path an exact method beats `ANY`

use std::collections::BTreeMap;

use axum::http::Method;

use crate::routing::endpoint::{Endpoint, RouteMethod};
use crate::routing::matcher::PathPattern;
use crate::routing::ConfigError;

#[derive(Debug)]
struct CompiledRoute {
    pattern: PathPattern,
    endpoints: Vec<Endpoint>,
}

impl CompiledRoute {
    fn endpoint_for(&self, method: &Method) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.method != RouteMethod::Any && e.method.accepts(method))
            .or_else(|| self.endpoints.iter().find(|e| e.method == RouteMethod::Any))
    }
}

/// Result of a route lookup.
#[derive(Debug, PartialEq)]
pub enum RouteMatch<'a> {
    Found {
        endpoint: &'a Endpoint,
        path_parameters: BTreeMap<String, String>,
    },
    /// The path exists but not for this method.
    MethodNotAllowed { allowed: Vec<RouteMethod> },
    NotFound,
}

/// Immutable route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Compile endpoints into a route table.
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Result<Self, ConfigError> {
        let mut routes: Vec<CompiledRoute> = Vec::new();

        for endpoint in endpoints {
            let pattern = PathPattern::parse(&endpoint.path)?;
            let canonical = pattern.canonical();

            match routes
                .iter_mut()
                .find(|r| r.pattern.canonical() == canonical)
            {
                Some(route) => {
                    if route.endpoints.iter().any(|e| e.method == endpoint.method) {
                        return Err(ConfigError::DuplicateRoute {
                            method: endpoint.method,
                            path: endpoint.path,
                        });
                    }
                    route.endpoints.push(endpoint);
                }
                None => routes.push(CompiledRoute {
                    pattern,
                    endpoints: vec![endpoint],
                }),
            }
        }

        // Stable: equally specific routes keep declaration order.
        routes.sort_by(|a, b| b.pattern.specificity().cmp(&a.pattern.specificity()));

        Ok(Self { routes })
    }

    /// Find the endpoint for `method` and `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let mut allowed: Vec<RouteMethod> = Vec::new();

        for route in &self.routes {
            let Some(path_parameters) = route.pattern.matches(path) else {
                continue;
            };
            if let Some(endpoint) = route.endpoint_for(method) {
                return RouteMatch::Found {
                    endpoint,
                    path_parameters,
                };
            }
            for endpoint in &route.endpoints {
                if !allowed.contains(&endpoint.method) {
                    allowed.push(endpoint.method);
                }
            }
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed { allowed }
        }
    }

    /// All endpoints, most specific path first.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.routes.iter().flat_map(|r| r.endpoints.iter())
    }

    pub fn len(&self) -> usize {
        self.routes.iter().map(|r| r.endpoints.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(handler: &str, path: &str, method: RouteMethod) -> Endpoint {
        Endpoint::new(".", handler.parse().unwrap(), path, method)
    }

    fn handler_of(m: RouteMatch<'_>) -> String {
        match m {
            RouteMatch::Found { endpoint, .. } => endpoint.handler.to_string(),
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn test_lookup_by_path_and_method() {
        let table = RouteTable::new(vec![
            endpoint("items.list", "/items", RouteMethod::Get),
            endpoint("items.create", "/items", RouteMethod::Post),
        ])
        .unwrap();

        assert_eq!(handler_of(table.lookup(&Method::GET, "/items")), "items.list");
        assert_eq!(handler_of(table.lookup(&Method::POST, "/items")), "items.create");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_method_not_allowed_and_not_found() {
        let table = RouteTable::new(vec![endpoint("items.list", "/items", RouteMethod::Get)]).unwrap();

        assert_eq!(
            table.lookup(&Method::DELETE, "/items"),
            RouteMatch::MethodNotAllowed {
                allowed: vec![RouteMethod::Get]
            }
        );
        assert_eq!(table.lookup(&Method::GET, "/other"), RouteMatch::NotFound);
    }

    #[test]
    fn test_literal_beats_parameter() {
        let table = RouteTable::new(vec![
            endpoint("items.get", "/items/{id}", RouteMethod::Get),
            endpoint("items.new", "/items/new", RouteMethod::Get),
        ])
        .unwrap();

        assert_eq!(handler_of(table.lookup(&Method::GET, "/items/new")), "items.new");
        match table.lookup(&Method::GET, "/items/7") {
            RouteMatch::Found { path_parameters, .. } => {
                assert_eq!(path_parameters.get("id").map(String::as_str), Some("7"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_exact_method_beats_any() {
        let table = RouteTable::new(vec![
            endpoint("catch.all", "/x", RouteMethod::Any),
            endpoint("x.get", "/x", RouteMethod::Get),
        ])
        .unwrap();

        assert_eq!(handler_of(table.lookup(&Method::GET, "/x")), "x.get");
        assert_eq!(handler_of(table.lookup(&Method::PATCH, "/x")), "catch.all");
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let err = RouteTable::new(vec![
            endpoint("a.handler", "/items/{id}", RouteMethod::Get),
            endpoint("b.handler", "/items/{itemId}", RouteMethod::Get),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute { .. }));
    }

    #[test]
    fn test_invalid_path_rejected() {
        let err = RouteTable::new(vec![endpoint("a.handler", "items", RouteMethod::Get)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath { .. }));
    }
}
