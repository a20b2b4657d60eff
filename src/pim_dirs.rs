//! Application directory paths for the PIM host.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution, which is
//! sandbox-transparent on macOS.
//!
//! # Environment Overrides
//!
//! - `FAE_PIM_DATA_DIR`: overrides [`data_dir`]
//! - `FAE_PIM_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Resolves to `dirs::data_dir()/fae-pim/` by default.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FAE_PIM_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("fae-pim"))
        .unwrap_or_else(|| PathBuf::from("/tmp/fae-pim-data"))
}

/// Application config directory (holds `config.toml`).
///
/// Resolves to `dirs::config_dir()/fae-pim/` by default.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FAE_PIM_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("fae-pim"))
        .unwrap_or_else(|| PathBuf::from("/tmp/fae-pim-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_dir_is_under_data_dir() {
        assert!(logs_dir().starts_with(data_dir()));
        assert!(logs_dir().ends_with("logs"));
    }

    #[test]
    fn config_dir_is_not_empty() {
        assert!(!config_dir().as_os_str().is_empty());
    }
}
