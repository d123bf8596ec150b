//! Handler environment overlay.
//!
//! # Responsibilities
//! - Flatten a JSON file of named variable groups into one overlay
//! - Resolve a recovered `NAME → config key` mapping against that overlay,
//!   falling back to the live environment
//!
//! # Design Decisions
//! - The overlay is an explicit value threaded into every invocation; the
//!   gateway's own process environment is never written
//! - Later groups override earlier ones; groups are visited in key order
//! - Strings are taken verbatim, scalars are stringified, objects and arrays
//!   become JSON text, `null` is skipped

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::routing::{EnvBinding, EnvSource};

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("cannot read env file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("env file {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("env file must be a JSON object of groups")]
    NotAnObject,
}

/// Variables handed to every handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerEnvironment {
    vars: BTreeMap<String, String>,
}

impl HandlerEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and flatten a JSON env file.
    pub fn from_file(path: &Path) -> Result<Self, EnvironmentError> {
        let content = std::fs::read_to_string(path).map_err(|source| EnvironmentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Value =
            serde_json::from_str(&content).map_err(|source| EnvironmentError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_groups(document)
    }

    /// Flatten `{ "Group": { "KEY": value, .. }, .. }`.
    ///
    /// A top-level entry that is not itself an object is taken as a single
    /// variable.
    pub fn from_groups(document: Value) -> Result<Self, EnvironmentError> {
        let Value::Object(groups) = document else {
            return Err(EnvironmentError::NotAnObject);
        };

        let mut environment = Self::new();
        let ordered: BTreeMap<String, Value> = groups.into_iter().collect();
        for (name, group) in ordered {
            match group {
                Value::Object(vars) => {
                    for (key, value) in vars {
                        environment.set_value(key, value);
                    }
                }
                other => environment.set_value(name, other),
            }
        }
        Ok(environment)
    }

    /// Resolve recovered bindings. `ConfigKey` bindings look up `config`
    /// first and the live environment second; `Live` bindings only the
    /// live environment. Variables with neither are omitted.
    pub fn from_bindings<F>(bindings: &[EnvBinding], config: &HandlerEnvironment, live: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut environment = Self::new();
        for binding in bindings {
            let value = match &binding.source {
                EnvSource::ConfigKey(key) => config
                    .get(key)
                    .map(str::to_string)
                    .or_else(|| live(&binding.name)),
                EnvSource::Live => live(&binding.name),
            };
            match value {
                Some(value) => environment.set(binding.name.clone(), value),
                None => tracing::debug!(variable = %binding.name, "No value for environment variable"),
            }
        }
        environment
    }

    fn set_value(&mut self, name: String, value: Value) {
        let text = match value {
            Value::Null => return,
            Value::String(s) => s,
            other => other.to_string(),
        };
        self.vars.insert(name, text);
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl FromIterator<(String, String)> for HandlerEnvironment {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}
