//! Engine and host configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application metadata exposed to scripts as the `_appInfo` global.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub application: String,
    pub application_version: String,
    pub locale: String,
    pub development: bool,
}

/// Heap limits applied when the default isolate provider creates an isolate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    pub heap_initial_mb: usize,
    pub heap_max_mb: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            heap_initial_mb: 1,
            heap_max_mb: 128,
        }
    }
}

impl EngineLimits {
    pub(crate) fn heap_initial_bytes(&self) -> usize {
        self.heap_initial_mb * 1024 * 1024
    }

    pub(crate) fn heap_max_bytes(&self) -> usize {
        self.heap_max_mb * 1024 * 1024
    }
}

/// Settings for the default (tokio-backed) host providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Worker threads of the runtime driving file I/O and timers.
    pub io_threads: usize,
    /// Relative paths given to the default file system resolve against this.
    pub base_dir: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            io_threads: 2,
            base_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_info_uses_camel_case() {
        let info = AppInfo {
            application_version: "1.2".to_string(),
            development: true,
            ..Default::default()
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["applicationVersion"], "1.2");
        assert_eq!(json["development"], true);
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let limits: EngineLimits = serde_json::from_str(r#"{"heap_max_mb": 64}"#).unwrap();
        assert_eq!(limits.heap_max_mb, 64);
        assert_eq!(limits.heap_initial_mb, EngineLimits::default().heap_initial_mb);

        let host: HostConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(host, HostConfig::default());
    }

    #[test]
    fn test_limits_in_bytes() {
        let limits = EngineLimits {
            heap_initial_mb: 2,
            heap_max_mb: 8,
        };
        assert_eq!(limits.heap_initial_bytes(), 2 * 1024 * 1024);
        assert_eq!(limits.heap_max_bytes(), 8 * 1024 * 1024);
    }
}
