//! Server configuration.

use anyhow::Context;
use rand::RngCore;
use sealbox_core::KdfParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub storage_path: PathBuf,
    /// Hex-encoded HMAC key for bearer tokens. Random per process when unset.
    pub token_secret: Option<String>,
    pub token_ttl_secs: u64,
    /// Upper bound on each store operation.
    pub store_timeout_ms: u64,
    pub max_payload_size: usize,
    /// Cost of account password hashes.
    pub kdf: KdfParams,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8744".to_string(),
            storage_path: PathBuf::from("sealbox-server.db"),
            token_secret: None,
            token_ttl_secs: 86_400,
            store_timeout_ms: 2_000,
            max_payload_size: 16 * 1024 * 1024,
            kdf: KdfParams::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.kdf.validate()?;
        Ok(config)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Decode the configured token key, or generate a random one.
    ///
    /// A generated key invalidates every token on restart.
    pub fn token_secret_bytes(&self) -> anyhow::Result<Vec<u8>> {
        match &self.token_secret {
            Some(hex_secret) => {
                let secret = hex::decode(hex_secret.trim()).context("token_secret is not hex")?;
                if secret.len() < MIN_SECRET_LEN {
                    anyhow::bail!(
                        "token_secret must be at least {} bytes, got {}",
                        MIN_SECRET_LEN,
                        secret.len()
                    );
                }
                Ok(secret)
            }
            None => {
                tracing::warn!("No token_secret configured; tokens will not survive a restart");
                let mut secret = vec![0u8; MIN_SECRET_LEN];
                rand::thread_rng().fill_bytes(&mut secret);
                Ok(secret)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8744");
        assert_eq!(config.store_timeout(), Duration::from_secs(2));
        assert_eq!(config.token_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServerConfig =
            toml::from_str("listen_addr = \"0.0.0.0:9000\"\nstore_timeout_ms = 500\n").unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.store_timeout_ms, 500);
        assert_eq!(config.token_ttl_secs, 86_400);
    }

    #[test]
    fn token_secret_decoding() {
        let mut config = ServerConfig::default();
        config.token_secret = Some("ab".repeat(32));
        assert_eq!(config.token_secret_bytes().unwrap(), vec![0xab; 32]);

        config.token_secret = Some("abcd".to_string());
        assert!(config.token_secret_bytes().is_err());

        config.token_secret = Some("zz".repeat(32));
        assert!(config.token_secret_bytes().is_err());

        config.token_secret = None;
        assert_eq!(config.token_secret_bytes().unwrap().len(), MIN_SECRET_LEN);
    }
}
