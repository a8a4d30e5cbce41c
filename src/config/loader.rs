//! Configuration loading.
//!
//! Sources, lowest precedence first: defaults, TOML file, environment
//! (`ADDR`, `DEBUG`), command-line overrides. Validation runs once on the
//! merged result.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable holding the listen address.
pub const ENV_ADDR: &str = "ADDR";
/// Environment variable enabling debug logging.
pub const ENV_DEBUG: &str = "DEBUG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for environment variable {name}")]
    Env { name: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub debug: bool,
}

/// Parse a TOML configuration file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Apply `ADDR` and `DEBUG` from `lookup`. Empty values are ignored.
pub fn apply_env<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(addr) = var(ENV_ADDR) {
        config.listener.bind_address = addr;
    }

    if let Some(value) = var(ENV_DEBUG) {
        config.observability.debug = parse_bool(&value).ok_or(ConfigError::Env {
            name: ENV_DEBUG,
            value,
        })?;
    }

    Ok(())
}

/// Merge every source and validate the result.
pub fn resolve_config<F>(
    path: Option<&Path>,
    lookup: F,
    overrides: &ConfigOverrides,
) -> Result<ProxyConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    apply_env(&mut config, lookup)?;

    if let Some(addr) = &overrides.bind_address {
        config.listener.bind_address = addr.clone();
    }
    if overrides.debug {
        config.observability.debug = true;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Boolean spellings accepted for flags set through the environment.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
