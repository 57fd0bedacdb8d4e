use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Which document store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One file per document in a flat directory
    #[default]
    Disk,
    /// Process-local, lost on restart
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disk => write!(f, "disk"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Store directory for the disk backend (defaults to ~/.cache/pdf-assembler)
    pub path: Option<PathBuf>,

    /// Memory backend capacity in megabytes
    #[serde(default = "default_memory_max_mb")]
    pub memory_max_mb: u64,

    /// Documents older than this are purged by the server (0 = keep forever)
    #[serde(default)]
    pub retention_seconds: u64,
}

const fn default_memory_max_mb() -> u64 {
    512
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            memory_max_mb: default_memory_max_mb(),
            retention_seconds: 0,
        }
    }
}

impl StoreConfig {
    /// In-memory store, used by the CLI and tests.
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            ..Default::default()
        }
    }

    /// Disk store rooted at `path`.
    pub fn disk(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreBackend::Disk,
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(crate::util::default_store_path)
    }
}

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum number of files accepted per upload request
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Maximum request body size in megabytes
    #[serde(default = "default_max_body_mb")]
    pub max_body_mb: usize,
}

const fn default_max_files() -> usize {
    10
}

const fn default_max_body_mb() -> usize {
    100
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_body_mb: default_max_body_mb(),
        }
    }
}

impl UploadConfig {
    pub const fn max_body_bytes(&self) -> usize {
        self.max_body_mb.saturating_mul(1024 * 1024)
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub upload: UploadConfig,
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations (~/.config/pdf-assembler/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-assembler").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Reject values that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        if self.upload.max_files == 0 {
            return Err(Error::ConfigInvalid {
                field: "upload.max_files".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.upload.max_body_mb == 0 {
            return Err(Error::ConfigInvalid {
                field: "upload.max_body_mb".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.store.backend == StoreBackend::Memory && self.store.memory_max_mb == 0 {
            return Err(Error::ConfigInvalid {
                field: "store.memory_max_mb".to_string(),
                reason: "must be at least 1 for the memory backend".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Disk);
        assert_eq!(config.upload.max_files, 10);
        assert_eq!(config.store.retention_seconds, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [store]
            backend = "memory"
            memory_max_mb = 64
            "#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.memory_max_mb, 64);
        assert_eq!(config.upload.max_body_mb, 100);
    }

    #[test]
    fn test_rejects_zero_max_files() {
        let result = AppConfig::from_toml("[upload]\nmax_files = 0\n");
        assert!(matches!(result, Err(Error::ConfigInvalid { .. })));
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let result = AppConfig::from_toml("[store]\nbackend = \"s3\"\n");
        assert!(matches!(result, Err(Error::ConfigLoad(_))));
    }

    #[test]
    fn test_max_body_bytes() {
        let upload = UploadConfig {
            max_files: 1,
            max_body_mb: 2,
        };
        assert_eq!(upload.max_body_bytes(), 2 * 1024 * 1024);
    }
}
