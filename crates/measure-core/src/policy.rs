//! Static path lists that shape the inventory.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Files whose content is unique per device. Their presence is measured,
/// their content never is.
pub const DEFAULT_CONTENT_EXCLUDE: &[&str] = &[
    "/config/tpm_credential",
    "/config/device.cert.pem",
    "/config/device.key.pem",
    "/config/onboard.cert.pem",
    "/config/onboard.key.pem",
    "/config/soft_serial",
];

/// Files that normally do not exist but whose later appearance matters.
/// They always get an inventory entry so a verifier can diff logs for the
/// absent-to-present transition.
pub const DEFAULT_PRESENCE_SENSITIVE: &[&str] = &[
    "/config/bootstrap-config.pb",
    "/config/DevicePortConfig/override.json",
    "/config/GlobalConfig/global.json",
    "/config/Force-API-V1",
];

/// Immutable policy lists passed to the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurePolicy {
    /// Paths measured for presence only
    #[serde(default = "default_content_exclude")]
    pub content_exclude: Vec<String>,

    /// Paths always present in the inventory, even when missing
    #[serde(default = "default_presence_sensitive")]
    pub presence_sensitive: Vec<String>,
}

impl MeasurePolicy {
    /// Policy with explicit lists
    #[must_use]
    pub fn new(content_exclude: Vec<String>, presence_sensitive: Vec<String>) -> Self {
        Self {
            content_exclude,
            presence_sensitive,
        }
    }

    /// Returns true if the content of `path` must not be hashed
    #[must_use]
    pub fn excludes_content(&self, path: &Path) -> bool {
        self.content_exclude.iter().any(|p| Path::new(p) == path)
    }

    /// Every path that must appear in the inventory regardless of the walk
    pub fn listed_paths(&self) -> impl Iterator<Item = &str> {
        self.content_exclude
            .iter()
            .chain(&self.presence_sensitive)
            .map(String::as_str)
    }
}

impl Default for MeasurePolicy {
    fn default() -> Self {
        Self {
            content_exclude: default_content_exclude(),
            presence_sensitive: default_presence_sensitive(),
        }
    }
}

fn default_content_exclude() -> Vec<String> {
    DEFAULT_CONTENT_EXCLUDE.iter().map(ToString::to_string).collect()
}

fn default_presence_sensitive() -> Vec<String> {
    DEFAULT_PRESENCE_SENSITIVE
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_lists() {
        let policy = MeasurePolicy::default();
        assert_eq!(policy.content_exclude.len(), 6);
        assert_eq!(policy.presence_sensitive.len(), 4);
        assert!(policy.excludes_content(Path::new("/config/device.key.pem")));
        assert!(!policy.excludes_content(Path::new("/config/bootstrap-config.pb")));
        assert_eq!(policy.listed_paths().count(), 10);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let policy: MeasurePolicy =
            serde_json::from_str(r#"{"content_exclude":["/x/key"]}"#).unwrap();
        assert_eq!(policy.content_exclude, vec!["/x/key".to_string()]);
        assert_eq!(policy.presence_sensitive.len(), 4);
    }
}
