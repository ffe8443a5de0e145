//! Configuration for the `bp` CLI.
//!
//! A single TOML document at `~/.config/bugpen/config.toml` holds user
//! preferences. Precedence for each setting: CLI flag / environment
//! variable > config file > built-in default.
//!
//! ```toml
//! # ~/.config/bugpen/config.toml
//! principal = "auth0|1234"
//! data_dir = "/srv/bugpen"
//! issuer = "https://example.us.auth0.com"
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// User preferences loaded from the config file.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default principal when `--as` / `BP_PRINCIPAL` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,

    /// Data directory override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Identity-provider base URL for `bp auth verify`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Config {
    /// Load the config file if present; a missing file is an empty config.
    pub fn load() -> Result<Self> {
        let Some(path) = config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Other(format!("Could not parse {}: {}", path.display(), e)))
    }

    /// Resolve the effective principal: explicit flag/env beats the file.
    pub fn resolve_principal(&self, explicit: Option<String>) -> Result<String> {
        explicit
            .or_else(|| self.principal.clone())
            .filter(|p| !p.is_empty())
            .ok_or(Error::NotAuthenticated)
    }

    /// Resolve the effective data directory.
    pub fn resolve_data_dir(&self, explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = explicit {
            return Ok(dir);
        }
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        crate::storage::get_data_dir()
    }

    /// Resolve the effective issuer URL for identity verification.
    pub fn resolve_issuer(&self, explicit: Option<String>) -> Result<String> {
        explicit
            .or_else(|| self.issuer.clone())
            .ok_or_else(|| Error::InvalidInput("no identity issuer configured".to_string()))
    }
}

/// Path of the config file: `~/.config/bugpen/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bugpen").join("config.toml"))
}
