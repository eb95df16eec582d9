//! Binding configuration
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`B3ND_ATTRIBUTE`, `B3ND_DEBOUNCE_MS`)
//! 2. Config file (`b3nd.toml`, passed explicitly)
//! 3. Defaults

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{B3ndError, Result};

pub const DEFAULT_ATTRIBUTE: &str = "data-model-bind";
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BindConfig {
    /// Attribute holding the binding declaration
    pub attribute: String,

    /// Delay of debounced write-back handlers (`textarea`)
    pub debounce_ms: u64,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            attribute: DEFAULT_ATTRIBUTE.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl BindConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| B3ndError::Config {
            reason: format!("Failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| B3ndError::Config {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    /// Unparseable numbers are reported and ignored.
    pub fn with_env(mut self) -> Self {
        if let Ok(attribute) = std::env::var("B3ND_ATTRIBUTE") {
            if !attribute.trim().is_empty() {
                self.attribute = attribute.trim().to_string();
            }
        }

        if let Ok(raw) = std::env::var("B3ND_DEBOUNCE_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.debounce_ms = ms,
                Err(_) => warn!(value = %raw, "ignoring invalid B3ND_DEBOUNCE_MS"),
            }
        }

        self
    }

    fn validate(&self) -> Result<()> {
        if self.attribute.trim().is_empty() {
            return Err(B3ndError::Config {
                reason: "attribute must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
