//! Best-effort resolver for infrastructure written as CDK source code.
//!
//! # Responsibilities
//! - Recover `createLambda(...)` bindings (variable → handler)
//! - Recover `addRoutes({...})` registrations and join them to bindings
//! - Recover the environment-variable mapping of a named builder function
//!
//! # Design Decisions
//! - Failure is empty: anything that does not match contributes nothing and
//!   never raises an error
//! - Registrations are the only source of routes; bindings never referenced
//!   by a registration are dropped
//! - Code location is inferred once per file from the first
//!   `Code.fromAsset('...')` literal (default `.`). Files mixing several asset
//!   paths therefore share one location for every handler.
//! - Nested blocks are bounded with the depth-counting scanner, not regexes

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::routing::endpoint::{Endpoint, HandlerRef, RouteMethod};
use crate::routing::scanner::{balanced_block, balanced_span, CodeChars};
use crate::routing::{ConfigError, RouteResolver};

static FACTORY_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*createLambda\(\s*[^,]+,\s*['"`]([^'"`]+)['"`]\s*,\s*['"`]([^'"`]+)['"`][^)]*\)"#,
    )
    .expect("factory pattern is valid")
});

static ASSET_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Code\.fromAsset\(\s*['"`]([^'"`]+)['"`]\s*\)"#).expect("asset pattern is valid")
});

static ADD_ROUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\baddRoutes\s*\(\s*\{").expect("addRoutes pattern is valid"));

static ROUTE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bpath\s*:\s*['"`]([^'"`]+)['"`]"#).expect("path pattern is valid")
});

static ROUTE_METHODS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bmethods\s*:\s*\[").expect("methods pattern is valid"));

static HTTP_METHOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"HttpMethod\.([A-Z]+)").expect("method pattern is valid"));

static INTEGRATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bintegration\s*:\s*new\s+HttpLambdaIntegration\s*\(\s*[^,]+,\s*([A-Za-z_$][\w$]*)\s*[,)]")
        .expect("integration pattern is valid")
});

static ENV_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*['"]?([A-Za-z_][A-Za-z0-9_]*)['"]?\s*:\s*(.*?)\s*,?\s*$"#)
        .expect("environment line pattern is valid")
});

static DOTTED_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][\w$]*(?:\??\.[A-Za-z_$][\w$]*)*\??\.([A-Za-z_$][\w$]*)!?$")
        .expect("dotted source pattern is valid")
});

/// A handler bound to a variable by a factory call.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HandlerBinding {
    handler: HandlerRef,
    code_uri: PathBuf,
}

/// Where an environment variable takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSource {
    /// `NAME: source.key`; look `key` up in the configuration values.
    ConfigKey(String),
    /// No recognisable source; read `NAME` from the live environment.
    Live,
}

/// One `NAME: source` line recovered from an environment builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvBinding {
    pub name: String,
    pub source: EnvSource,
}

/// Resolver over CDK-style TypeScript/JavaScript source.
#[derive(Debug, Clone)]
pub struct SourceScanResolver {
    source: String,
}

impl SourceScanResolver {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// File-global code location: first `Code.fromAsset` literal, else `.`.
    pub fn inferred_code_uri(&self) -> PathBuf {
        ASSET_PATH
            .captures(&self.source)
            .map(|caps| PathBuf::from(&caps[1]))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Pass 1: variable name → handler binding.
    fn bindings(&self) -> HashMap<String, HandlerBinding> {
        let code_uri = self.inferred_code_uri();
        let mut bindings = HashMap::new();
        for caps in FACTORY_CALL.captures_iter(&self.source) {
            let Ok(handler) = caps[3].parse::<HandlerRef>() else {
                tracing::debug!(handler = &caps[3], "Skipping malformed handler reference");
                continue;
            };
            bindings.insert(
                caps[1].to_string(),
                HandlerBinding {
                    handler,
                    code_uri: code_uri.clone(),
                },
            );
        }
        bindings
    }

    /// Recover the `NAME: source.key` lines of the function named `builder`.
    ///
    /// Returns an empty list when the function cannot be located.
    pub fn environment_bindings(&self, builder: &str) -> Vec<EnvBinding> {
        let Some(body) = self.builder_body(builder) else {
            tracing::debug!(builder, "Environment builder not found");
            return Vec::new();
        };

        let mut bindings: Vec<EnvBinding> = Vec::new();
        for line in body.lines() {
            let Some(caps) = ENV_LINE.captures(line) else {
                continue;
            };
            let value = &caps[2];
            if value.is_empty() || value.starts_with('{') || value.starts_with('[') {
                continue;
            }
            let source = DOTTED_SOURCE
                .captures(value)
                .map(|key| EnvSource::ConfigKey(key[1].to_string()))
                .unwrap_or(EnvSource::Live);
            let binding = EnvBinding {
                name: caps[1].to_string(),
                source,
            };
            match bindings.iter_mut().find(|b| b.name == binding.name) {
                Some(existing) => *existing = binding,
                None => bindings.push(binding),
            }
        }
        bindings
    }

    /// Body of the first definition of `builder`: the identifier, a balanced
    /// parameter list, an optional return type or `=>`, then a `{` block.
    fn builder_body(&self, builder: &str) -> Option<&str> {
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(builder))).ok()?;
        let source = self.source.as_str();

        let body = pattern.find_iter(source).find_map(|m| {
            let (next, c) = significant(source, m.end()).next()?;
            let params_open = match c {
                '(' => next,
                // `const build = (config) => ...` / `= function (config) {`
                '=' => CodeChars::new(source, next)
                    .find(|(_, c)| *c == '(' || *c == ';')
                    .filter(|(_, c)| *c == '(')?
                    .0,
                _ => return None,
            };
            let params = balanced_span(source, params_open)?;
            let body_open = body_after_params(source, params.end)?;
            balanced_block(source, body_open)
        });
        body
    }
}

/// Code characters from `from`, whitespace skipped.
fn significant(source: &str, from: usize) -> impl Iterator<Item = (usize, char)> + '_ {
    CodeChars::new(source, from).filter(|(_, c)| !c.is_whitespace())
}

/// Offset of the `{` opening a function body whose parameter list ends at
/// `from`. Call sites (`build(props);`) yield `None`.
fn body_after_params(source: &str, from: usize) -> Option<usize> {
    let mut chars = significant(source, from);
    match chars.next()? {
        (offset, '{') => Some(offset),
        (_, '=') => arrow_body(chars),
        (_, ':') => {
            // return type annotation, e.g. `: Record<string, string> {`
            let mut angle = 0usize;
            while let Some((offset, c)) = chars.next() {
                match c {
                    '<' => angle += 1,
                    '>' if angle > 0 => angle -= 1,
                    '{' if angle == 0 => return Some(offset),
                    '=' if angle == 0 => return arrow_body(chars),
                    ';' | ',' | ')' | ']' | '}' if angle == 0 => return None,
                    _ => {}
                }
            }
            None
        }
        _ => None,
    }
}

/// After an `=`: expects `>` then `{` or `({`.
fn arrow_body(mut chars: impl Iterator<Item = (usize, char)>) -> Option<usize> {
    if chars.next()?.1 != '>' {
        return None;
    }
    match chars.next()? {
        (offset, '{') => Some(offset),
        (_, '(') => match chars.next()? {
            (offset, '{') => Some(offset),
            _ => None,
        },
        _ => None,
    }
}

impl RouteResolver for SourceScanResolver {
    fn endpoints(&self) -> Box<dyn Iterator<Item = Result<Endpoint, ConfigError>> + '_> {
        let bindings = self.bindings();
        let source = self.source.as_str();

        // Pass 2: registrations joined to bindings. Pass 3 is implicit: a binding
        // no registration refers to is never emitted.
        Box::new(
            ADD_ROUTES
                .find_iter(source)
                .filter_map(move |m| balanced_block(source, m.end() - 1))
                .flat_map(move |block| registration_endpoints(block, &bindings))
                .map(Ok),
        )
    }
}

fn registration_endpoints(block: &str, bindings: &HashMap<String, HandlerBinding>) -> Vec<Endpoint> {
    let Some(path) = ROUTE_PATH.captures(block).map(|caps| caps[1].to_string()) else {
        return Vec::new();
    };
    let Some(binding) = INTEGRATION
        .captures(block)
        .and_then(|caps| bindings.get(&caps[1]))
    else {
        return Vec::new();
    };

    route_methods(block)
        .into_iter()
        .map(|method| Endpoint::new(&binding.code_uri, binding.handler.clone(), path.clone(), method))
        .collect()
}

/// `methods: [HttpMethod.X, ...]`. A list without recognisable members means
/// GET; a registration without `methods` at all means ANY.
fn route_methods(block: &str) -> Vec<RouteMethod> {
    let Some(list_open) = ROUTE_METHODS.find(block).map(|m| m.end() - 1) else {
        return vec![RouteMethod::Any];
    };
    let Some(list) = balanced_block(block, list_open) else {
        return Vec::new();
    };

    let names: Vec<&str> = HTTP_METHOD
        .captures_iter(list)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if names.is_empty() {
        return vec![RouteMethod::Get];
    }

    let mut methods = Vec::new();
    for name in names {
        match name.parse::<RouteMethod>() {
            Ok(method) if !methods.contains(&method) => methods.push(method),
            Ok(_) => {}
            Err(_) => tracing::debug!(method = name, "Skipping unknown HttpMethod member"),
        }
    }
    methods
}
