// src/config.rs

//! Engine configuration.
//!
//! A small TOML file covers the handful of knobs the engine needs;
//! everything has a sensible default so a missing file is not an error.
//!
//! # Example config.toml
//!
//! ```toml
//! # Root directory under which digital object files live
//! storage_root = "/var/lib/custodia/uploads"
//!
//! # Algorithms generated for objects with no stored checksums
//! default_algorithms = ["sha256"]
//!
//! # Objects verified longer ago than this are due for fixity again
//! staleness_days = 7
//!
//! # Agent name recorded in preservation events
//! agent = "custodia"
//!
//! # Per-invocation deadline for external tools, in seconds
//! tool_timeout_secs = 300
//! ```

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/custodia/config.toml";

/// Engine-wide configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Root directory under which digital object files are resolved
    pub storage_root: PathBuf,

    /// Algorithms generated for objects that have no checksums yet
    pub default_algorithms: Vec<String>,

    /// Fixity staleness window in days
    pub staleness_days: i64,

    /// Agent name written into preservation events
    pub agent: String,

    /// Deadline for a single external tool invocation, in seconds
    pub tool_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("/var/lib/custodia/uploads"),
            default_algorithms: vec!["sha256".to_string()],
            staleness_days: 7,
            agent: "custodia".to_string(),
            tool_timeout_secs: 300,
        }
    }
}

impl EngineConfig {
    /// Load configuration from an explicit path, or from the default
    /// location if it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.staleness_days < 0 {
            return Err(Error::Config("staleness_days must be non-negative".into()));
        }
        if self.default_algorithms.is_empty() {
            return Err(Error::Config("default_algorithms must not be empty".into()));
        }
        // Fail early on typos rather than mid-batch
        self.parsed_default_algorithms()?;
        Ok(())
    }

    /// The configured default algorithms, parsed
    pub fn parsed_default_algorithms(&self) -> Result<Vec<HashAlgorithm>> {
        self.default_algorithms
            .iter()
            .map(|s| s.parse::<HashAlgorithm>())
            .collect()
    }
}
