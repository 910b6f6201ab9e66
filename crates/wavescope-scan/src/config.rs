//! Scanner configuration.
//!
//! [`ScanConfig`] holds every tunable of the scan loop and the reconciler.
//! It is serializable via [`serde`] so it can be kept in a JSON file next
//! to the user's other settings; missing keys take their defaults.
//!
//! # Example
//!
//! ```rust
//! use wavescope_scan::config::ScanConfig;
//!
//! let cfg = ScanConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.refresh_interval_seconds, 5);
//! assert_eq!(cfg.linger_window_seconds, 60);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// ScanConfig
// ---------------------------------------------------------------------------

/// Complete configuration for a scanning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Seconds between poll ticks, 1-30. Default: **5**.
    pub refresh_interval_seconds: u64,

    /// How long an AP absent from the latest batch stays visible as a ghost.
    /// 0 removes it on the first cycle it is missing. Default: **60**.
    pub linger_window_seconds: u64,

    /// Consecutive unreported cycles a sticky field survives before it is
    /// cleared. Default: **5**.
    pub sticky_miss_threshold: u32,

    /// Run two back-to-back cycles and union them before the first publish.
    /// Default: **true**.
    pub startup_double_scan: bool,

    /// Upper bound on one whole poll, every tool invocation included,
    /// 1-120 s. Default: **30**.
    pub scan_timeout_seconds: u64,

    /// Request an active rescan every this many polls; other polls read the
    /// tool's cached results. Default: **5**.
    pub rescan_every_cycles: u64,

    /// Wireless interface for `iw`. Detected with `iw dev` when unset.
    pub interface: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            refresh_interval_seconds: 5,
            linger_window_seconds: 60,
            sticky_miss_threshold: 5,
            startup_double_scan: true,
            scan_timeout_seconds: 30,
            rescan_every_cycles: 5,
            interface: None,
        }
    }
}

impl ScanConfig {
    /// Load and validate a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON for this type, and
    /// [`ConfigError::InvalidValue`] if a field fails validation.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: ScanConfig =
            serde_json::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write the configuration as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Check every field, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=30).contains(&self.refresh_interval_seconds) {
            return Err(ConfigError::invalid_value(
                "refresh_interval_seconds",
                "must be in [1, 30]",
            ));
        }
        if self.sticky_miss_threshold == 0 {
            return Err(ConfigError::invalid_value(
                "sticky_miss_threshold",
                "must be >= 1",
            ));
        }
        if !(1..=120).contains(&self.scan_timeout_seconds) {
            return Err(ConfigError::invalid_value(
                "scan_timeout_seconds",
                "must be in [1, 120]",
            ));
        }
        if self.rescan_every_cycles == 0 {
            return Err(ConfigError::invalid_value(
                "rescan_every_cycles",
                "must be >= 1",
            ));
        }
        if let Some(iface) = &self.interface {
            if iface.trim().is_empty() || iface.contains(char::is_whitespace) {
                return Err(ConfigError::invalid_value(
                    "interface",
                    "must be a non-empty name without whitespace",
                ));
            }
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    /// Linger window as a [`Duration`].
    pub fn linger_window(&self) -> Duration {
        Duration::from_secs(self.linger_window_seconds)
    }

    /// External tool timeout as a [`Duration`].
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_seconds)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        ScanConfig::default()
            .validate()
            .expect("default config should be valid");
    }

    #[test]
    fn json_round_trip() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("wavescope.json");

        let original = ScanConfig {
            interface: Some("wlan0".into()),
            linger_window_seconds: 15,
            ..ScanConfig::default()
        };
        original.to_json(&path).expect("serialization should succeed");

        let loaded = ScanConfig::from_json(&path).expect("deserialization should succeed");
        assert_eq!(loaded, original);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let cfg = ScanConfig::from_json_str(r#"{"refresh_interval_seconds": 2}"#).unwrap();
        assert_eq!(cfg.refresh_interval_seconds, 2);
        assert_eq!(cfg.sticky_miss_threshold, 5);
        assert!(cfg.startup_double_scan);
    }

    #[test]
    fn interval_out_of_range_is_invalid() {
        for secs in [0, 31] {
            let cfg = ScanConfig {
                refresh_interval_seconds: secs,
                ..ScanConfig::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::InvalidValue {
                    field: "refresh_interval_seconds",
                    ..
                })
            ));
        }
    }

    #[test]
    fn zero_threshold_is_invalid() {
        let cfg = ScanConfig {
            sticky_miss_threshold: 0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_linger_is_allowed() {
        let cfg = ScanConfig {
            linger_window_seconds: 0,
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.linger_window(), Duration::ZERO);
    }

    #[test]
    fn blank_interface_is_invalid() {
        let cfg = ScanConfig {
            interface: Some("  ".into()),
            ..ScanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            ScanConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn unwritable_path_is_write_error() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let err = ScanConfig::default()
            .to_json(&blocker.join("wavescope.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileWrite { .. }));
    }

    #[test]
    fn missing_file_is_read_error() {
        let tmp = tempdir().unwrap();
        let err = ScanConfig::from_json(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
