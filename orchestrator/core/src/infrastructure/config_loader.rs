// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Loads `AppConfig` from a YAML file (§6.4): the path is either given
//! explicitly or read from `ORCHESTRATOR_CONFIG_PATH`, the file is parsed
//! with `serde_yaml`, and the result is run through `AppConfig::validate()`
//! before it is handed to the rest of the application.

use std::path::Path;

use crate::domain::config::{AppConfig, ConfigError};

pub const CONFIG_PATH_ENV_VAR: &str = "ORCHESTRATOR_CONFIG_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("no config path given and {CONFIG_PATH_ENV_VAR} is not set")]
    NoPathProvided,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Resolve the config path: an explicit CLI argument wins over the env var.
pub fn resolve_path(cli_path: Option<&Path>) -> Result<std::path::PathBuf, ConfigLoadError> {
    if let Some(path) = cli_path {
        return Ok(path.to_path_buf());
    }
    std::env::var(CONFIG_PATH_ENV_VAR)
        .map(std::path::PathBuf::from)
        .map_err(|_| ConfigLoadError::NoPathProvided)
}

/// Load and validate the config at `path`.
pub fn load(path: &Path) -> Result<AppConfig, ConfigLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let config: AppConfig = serde_yaml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Resolve the path (CLI arg, falling back to the env var) and load it.
pub fn resolve_and_load(cli_path: Option<&Path>) -> Result<AppConfig, ConfigLoadError> {
    let path = resolve_path(cli_path)?;
    load(&path)
}
