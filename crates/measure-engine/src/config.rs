//! Run configuration for a measurement pass.

use measure_core::{MeasureError, MeasurePolicy, PcrIndex, Result};
use measure_tpm::MAX_EVENT_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where to read, what to extend and where to write the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasureConfig {
    /// Configuration directory to measure (default: /config).
    #[serde(default = "default_config_root")]
    pub config_root: PathBuf,

    /// Event log destination (default: /run/measurefs/tpm_log.bin).
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// TPM resource manager node (default: /dev/tpmrm0).
    #[serde(default = "default_device_path")]
    pub device_path: PathBuf,

    /// PCR extended with the configuration measurement (default: 14).
    #[serde(default = "default_pcr_index")]
    pub pcr_index: PcrIndex,

    /// Largest chunk passed to one extend (default: 1024).
    #[serde(default = "default_max_event_size")]
    pub max_event_size: usize,

    /// Content-exclude and presence-sensitive lists.
    #[serde(default)]
    pub policy: MeasurePolicy,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            config_root: default_config_root(),
            log_path: default_log_path(),
            device_path: default_device_path(),
            pcr_index: default_pcr_index(),
            max_event_size: default_max_event_size(),
            policy: MeasurePolicy::default(),
        }
    }
}

impl MeasureConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| MeasureError::io(path, e))?;
            toml::from_str(&content)
                .map_err(|e| MeasureError::Config(format!("{}: {e}", path.display())))?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.max_event_size == 0 || self.max_event_size > MAX_EVENT_SIZE {
            return Err(MeasureError::Config(format!(
                "max_event_size {} not in 1..={MAX_EVENT_SIZE}",
                self.max_event_size
            )));
        }
        if self.config_root.as_os_str().is_empty() {
            return Err(MeasureError::Config("config_root is empty".into()));
        }
        if self.log_path.file_name().is_none() {
            return Err(MeasureError::Config(format!(
                "log_path {} does not name a file",
                self.log_path.display()
            )));
        }
        Ok(())
    }
}

// Default value functions for serde.
fn default_config_root() -> PathBuf {
    PathBuf::from("/config")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("/run/measurefs/tpm_log.bin")
}

fn default_device_path() -> PathBuf {
    PathBuf::from("/dev/tpmrm0")
}

const fn default_pcr_index() -> PcrIndex {
    PcrIndex::CONFIG
}

const fn default_max_event_size() -> usize {
    MAX_EVENT_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MeasureConfig::default();
        assert_eq!(config.config_root, Path::new("/config"));
        assert_eq!(config.log_path, Path::new("/run/measurefs/tpm_log.bin"));
        assert_eq!(config.device_path, Path::new("/dev/tpmrm0"));
        assert_eq!(config.pcr_index.value(), 14);
        assert_eq!(config.max_event_size, 1024);
        assert_eq!(config.policy, MeasurePolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: MeasureConfig = toml::from_str(
            r#"
            config_root = "/tmp/cfg"

            [policy]
            presence_sensitive = ["/tmp/cfg/marker"]
            "#,
        )
        .unwrap();
        assert_eq!(config.config_root, Path::new("/tmp/cfg"));
        assert_eq!(config.device_path, Path::new("/dev/tpmrm0"));
        assert_eq!(config.policy.presence_sensitive, vec!["/tmp/cfg/marker"]);
        assert_eq!(config.policy.content_exclude.len(), 6);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = MeasureConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, MeasureConfig::default());
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("measure.toml");

        std::fs::write(&path, "max_event_size = 2048\n").unwrap();
        assert!(matches!(
            MeasureConfig::load(&path),
            Err(MeasureError::Config(_))
        ));

        std::fs::write(&path, "pcr_index = 24\n").unwrap();
        assert!(matches!(
            MeasureConfig::load(&path),
            Err(MeasureError::Config(_))
        ));

        std::fs::write(&path, "config_root = [").unwrap();
        assert!(MeasureConfig::load(&path).is_err());
    }
}
