//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigFileError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigFileError::Io(e) => write!(f, "IO error: {}", e),
            ConfigFileError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigFileError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigFileError::Io(e) => Some(e),
            ConfigFileError::Parse(e) => Some(e),
            ConfigFileError::Validation(_) => None,
        }
    }
}

/// Parse a TOML configuration file without validating it.
///
/// Use this when command-line overrides still have to be applied.
pub fn read_config(path: &Path) -> Result<GatewayConfig, ConfigFileError> {
    let content = fs::read_to_string(path).map_err(ConfigFileError::Io)?;
    toml::from_str(&content).map_err(ConfigFileError::Parse)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigFileError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigFileError::Validation)?;
    Ok(config)
}
