//! Client configuration.

use crate::crypto::KdfParams;
use crate::platform;
use crate::{Result, SealboxError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the sealbox server.
    pub server_url: String,
    /// Local cache file. Defaults to the platform data directory.
    pub cache_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// Cost of deriving the field key. Must match on every device of a user.
    pub kdf: KdfParams,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8744".to_string(),
            cache_path: None,
            request_timeout_secs: 30,
            kdf: KdfParams::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SealboxError::Config(format!("{}: {}", path.display(), e)))?;
        config
            .kdf
            .validate()
            .map_err(|e| SealboxError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Load `path`, or the platform default, falling back to defaults when the file is absent.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(platform::get_default_config_path);
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(platform::get_default_cache_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "server_url = \"https://vault.example.net\"\n\n[kdf]\nmem_cost = 8192\ntime_cost = 1\nparallelism = 1\n",
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.server_url, "https://vault.example.net");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.kdf.mem_cost, 8192);
    }

    #[test]
    fn weak_kdf_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[kdf]\nmem_cost = 16\ntime_cost = 1\nparallelism = 1\n").unwrap();

        assert!(matches!(
            ClientConfig::load(&path),
            Err(SealboxError::Config(_))
        ));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_or_default(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert!(config.cache_path().ends_with("cache.db"));
    }
}
