//! Configuration for the PIM integration core.
//!
//! Every section is `#[serde(default)]`, so a partial `config.toml` only needs
//! to name the values it overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PimError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PimConfig {
    /// Native dispatch settings.
    pub invoker: InvokerConfig,
    /// Startup / module readiness settings.
    pub startup: StartupConfig,
    /// Contact resolution settings.
    pub contacts: ContactsConfig,
}

/// Native dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Budget for an ordinary command, in milliseconds.
    pub timeout_ms: u64,
    /// Budget for a permission probe, in milliseconds.
    pub probe_timeout_ms: u64,
    /// Maximum items any generated enumeration script may return.
    pub max_items: usize,
    /// Maximum characters of free text any generated script may return per item.
    pub max_content_chars: usize,
    /// Path of the script interpreter binary.
    pub osascript_path: PathBuf,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            probe_timeout_ms: 5_000,
            max_items: 500,
            max_content_chars: 2_000,
            osascript_path: PathBuf::from("/usr/bin/osascript"),
        }
    }
}

impl InvokerConfig {
    /// Ordinary command budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Permission probe budget.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Startup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// How long the eager bulk initialization may run before safe mode is
    /// entered, in milliseconds.
    pub eager_timeout_ms: u64,
    /// Budget for a single on-demand module load, in milliseconds.
    pub module_load_timeout_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            eager_timeout_ms: 5_000,
            module_load_timeout_ms: 15_000,
        }
    }
}

impl StartupConfig {
    /// Eager phase budget.
    pub fn eager_timeout(&self) -> Duration {
        Duration::from_millis(self.eager_timeout_ms)
    }

    /// Per-module load budget.
    pub fn module_load_timeout(&self) -> Duration {
        Duration::from_millis(self.module_load_timeout_ms)
    }
}

/// Contact resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactsConfig {
    /// Minimum number of trailing digits two phone numbers must share to be
    /// considered equivalent when one carries a country code and the other
    /// does not.
    pub min_suffix_digits: usize,
    /// Budget for the directory fetch, in milliseconds.  Directory
    /// enumeration is the slowest query the core issues.
    pub fetch_timeout_ms: u64,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            min_suffix_digits: 10,
            fetch_timeout_ms: 20_000,
        }
    }
}

impl ContactsConfig {
    /// Directory fetch budget.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl PimConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PimError::Config(e.to_string()))
    }

    /// Load configuration from `path`, using defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| PimError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config_dir>/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::pim_dirs::config_dir().join("config.toml")
    }
}
