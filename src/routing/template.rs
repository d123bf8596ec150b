//! Declarative template resolver.
//!
//! # Responsibilities
//! - Parse a SAM-style YAML/JSON template
//! - Walk `Resources`, keeping `AWS::Serverless::Function` entries
//! - Yield one endpoint per (function, `HttpApi` event)
//!
//! # Design Decisions
//! - Schema-driven: any malformed property is a `ConfigError`, never skipped
//! - Only `get` and `post` are accepted, compared case-insensitively
//! - Intrinsic-function tags (`!Ref`, `!Sub`, ...) are not evaluated; a tagged
//!   value where a literal is required is an error

use serde_yaml::{Mapping, Value};

use crate::routing::endpoint::{Endpoint, HandlerRef, RouteMethod};
use crate::routing::{ConfigError, RouteResolver};

/// Resource type that declares a function.
pub const FUNCTION_TYPE: &str = "AWS::Serverless::Function";

/// Event type that declares an HTTP trigger.
pub const HTTP_EVENT_TYPE: &str = "HttpApi";

const ALLOWED_METHODS: [RouteMethod; 2] = [RouteMethod::Get, RouteMethod::Post];

/// Resolver over a parsed template document.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    document: Value,
}

impl TemplateResolver {
    /// Parse a template from YAML (or JSON) text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let document: Value = serde_yaml::from_str(content)?;
        if !(document.is_mapping() || document.is_null()) {
            return Err(ConfigError::InvalidProperty {
                resource: "<template>".to_string(),
                property: "<root>".to_string(),
                expected: "a mapping",
            });
        }
        Ok(Self { document })
    }

    fn resources(&self) -> Result<Option<&Mapping>, ConfigError> {
        match self.document.get("Resources") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Mapping(resources)) => Ok(Some(resources)),
            Some(_) => Err(ConfigError::InvalidProperty {
                resource: "<template>".to_string(),
                property: "Resources".to_string(),
                expected: "a mapping",
            }),
        }
    }
}

impl RouteResolver for TemplateResolver {
    fn endpoints(&self) -> Box<dyn Iterator<Item = Result<Endpoint, ConfigError>> + '_> {
        let resources = match self.resources() {
            Ok(resources) => resources,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        Box::new(
            resources
                .into_iter()
                .flat_map(|resources| resources.iter())
                .filter(|(_, resource)| {
                    resource.get("Type").and_then(literal_str) == Some(FUNCTION_TYPE)
                })
                .flat_map(|(name, resource)| function_endpoints(&key_name(name), resource)),
        )
    }
}

/// Endpoints for a single function resource, in event declaration order.
fn function_endpoints(name: &str, resource: &Value) -> Vec<Result<Endpoint, ConfigError>> {
    match try_function_endpoints(name, resource) {
        Ok(endpoints) => endpoints.into_iter().map(Ok).collect(),
        Err(e) => vec![Err(e)],
    }
}

fn try_function_endpoints(name: &str, resource: &Value) -> Result<Vec<Endpoint>, ConfigError> {
    let empty = Mapping::new();
    let properties = optional_mapping(resource, "Properties", name)?.unwrap_or(&empty);

    let code_uri = match properties.get("CodeUri") {
        None | Some(Value::Null) => ".",
        Some(value) => literal_str(value).ok_or_else(|| ConfigError::InvalidProperty {
            resource: name.to_string(),
            property: "CodeUri".to_string(),
            expected: "a local path string",
        })?,
    };

    let handler = match properties.get("Handler") {
        None | Some(Value::Null) => {
            return Err(ConfigError::MissingProperty {
                resource: name.to_string(),
                property: "Handler".to_string(),
            })
        }
        Some(value) => literal_str(value).ok_or_else(|| ConfigError::InvalidProperty {
            resource: name.to_string(),
            property: "Handler".to_string(),
            expected: "a string",
        })?,
    };
    let handler: HandlerRef = handler.parse().map_err(|source| ConfigError::InvalidHandler {
        resource: name.to_string(),
        source,
    })?;

    let events = match properties.get("Events") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Mapping(events)) => events,
        Some(_) => {
            return Err(ConfigError::InvalidProperty {
                resource: name.to_string(),
                property: "Events".to_string(),
                expected: "a mapping",
            })
        }
    };

    let mut endpoints = Vec::new();
    for (event_name, event) in events {
        if event.get("Type").and_then(literal_str) != Some(HTTP_EVENT_TYPE) {
            continue;
        }
        let event_name = key_name(event_name);
        let event_props = optional_mapping(event, "Properties", name)?;

        let path = string_or_default(event_props, "Path", "/", name)?;
        let method = string_or_default(event_props, "Method", "get", name)?;

        let method = method
            .parse::<RouteMethod>()
            .ok()
            .filter(|m| ALLOWED_METHODS.contains(m))
            .ok_or_else(|| ConfigError::UnsupportedMethod {
                method: method.to_string(),
                resource: name.to_string(),
                event: event_name.clone(),
            })?;

        endpoints.push(Endpoint::new(code_uri, handler.clone(), path, method));
    }
    Ok(endpoints)
}

fn optional_mapping<'a>(
    value: &'a Value,
    key: &str,
    resource: &str,
) -> Result<Option<&'a Mapping>, ConfigError> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Mapping(mapping)) => Ok(Some(mapping)),
        Some(_) => Err(ConfigError::InvalidProperty {
            resource: resource.to_string(),
            property: key.to_string(),
            expected: "a mapping",
        }),
    }
}

fn string_or_default<'a>(
    properties: Option<&'a Mapping>,
    key: &str,
    default: &'a str,
    resource: &str,
) -> Result<&'a str, ConfigError> {
    match properties.and_then(|p| p.get(key)) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => literal_str(value).ok_or_else(|| ConfigError::InvalidProperty {
            resource: resource.to_string(),
            property: key.to_string(),
            expected: "a string",
        }),
    }
}

/// A plain string scalar. `Value::as_str` looks through tags, so `!Ref X`
/// would otherwise read as the literal `X`.
fn literal_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "<unnamed>".to_string()),
    }
}
