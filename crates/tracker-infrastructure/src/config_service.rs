//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the tracker configuration
//! from a TOML file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracker_core::config::TrackerConfig;
use tracker_core::error::{Result, TrackerError};

/// Configuration service that loads and caches the tracker configuration.
///
/// A missing file yields the default configuration; a file that fails to
/// parse is a `Config` error.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<TrackerConfig>>>,
}

impl ConfigService {
    /// Creates a ConfigService reading from `path`.
    ///
    /// The configuration is loaded lazily on first access.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets the configuration, loading from file if not cached.
    pub async fn get_config(&self) -> Result<TrackerConfig> {
        {
            let cached = self.config.read().await;
            if let Some(ref config) = *cached {
                return Ok(config.clone());
            }
        }

        let loaded = self.load_config().await?;
        *self.config.write().await = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub async fn invalidate_cache(&self) {
        *self.config.write().await = None;
    }

    async fn load_config(&self) -> Result<TrackerConfig> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            tracing::debug!("No config at {:?}, using defaults", self.path);
            return Ok(TrackerConfig::default());
        }

        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            TrackerError::config(format!("Failed to read {:?}: {}", self.path, e))
        })?;
        TrackerConfig::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::with_path(temp_dir.path().join("tracker.toml"));
        assert_eq!(service.get_config().await.unwrap(), TrackerConfig::default());
    }

    #[tokio::test]
    async fn test_load_and_invalidate() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracker.toml");
        tokio::fs::write(&path, "retry_limit = 3\n").await.unwrap();

        let service = ConfigService::with_path(&path);
        assert_eq!(service.get_config().await.unwrap().retry_limit, 3);

        // Cached until invalidated.
        tokio::fs::write(&path, "retry_limit = 5\n").await.unwrap();
        assert_eq!(service.get_config().await.unwrap().retry_limit, 3);

        service.invalidate_cache().await;
        assert_eq!(service.get_config().await.unwrap().retry_limit, 5);
    }

    #[tokio::test]
    async fn test_parse_error_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracker.toml");
        tokio::fs::write(&path, "default_ttl_secs = [").await.unwrap();

        let service = ConfigService::with_path(&path);
        let err = service.get_config().await.unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
    }
}
