// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

// Intake configuration, in a separate crate so both the trust store and its
// embedders can use it.
use log::Level;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

const SCHEMA: &str = include_str!("../config.schema.json");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to deserialize JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config does not match schema 'config.schema.json': {0}")]
    Schema(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub logging_level: Option<String>,
    pub roots: Vec<PathBuf>,
}

impl AppConfig {
    /// Parses a JSON config, checking it against `config.schema.json` first.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not JSON or does not match the schema.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let json: serde_json::Value = serde_json::from_str(contents)?;
        let schema: serde_json::Value = serde_json::from_str(SCHEMA)?;
        jsonschema::validate(&schema, &json).map_err(|e| ConfigError::Schema(e.to_string()))?;
        Ok(serde_json::from_value(json)?)
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid config.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// The configured log level, or [`Level::Info`] if unset or unknown.
    pub fn log_level(&self) -> Level {
        self.logging_level
            .as_deref()
            .and_then(|level| Level::from_str(level).ok())
            .unwrap_or(Level::Info)
    }
}
