//! `sekisou.toml` configuration.
//!
//! ```toml
//! [store]
//! image = "/var/lib/sekisou/store.db"
//!
//! [tiers]
//! hot_max_size = "1M"
//! warm_max_size = "100M"
//! promotion_policy = "on-access"
//! warm_dir = "/var/lib/sekisou/warm"
//! cold_dir = "/mnt/archive/sekisou"
//! ```
//!
//! Every key is optional. Without `warm_dir`/`cold_dir` only the hot tier
//! exists.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::tier::{LocalTier, TierConfig, TieredFs};
use crate::vfs::MemoryFs;

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub tiers: TiersConfig,
}

/// Where the hot store is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite image. `None` keeps the store in memory only.
    pub image: Option<PathBuf>,
}

/// Tier thresholds plus host directories for the slower tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiersConfig {
    #[serde(flatten)]
    pub limits: TierConfig,
    pub warm_dir: Option<PathBuf>,
    pub cold_dir: Option<PathBuf>,
}

impl Config {
    /// Parse configuration text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Build a tier manager over `store`, with a [`LocalTier`] for each
    /// configured directory.
    pub fn tiered(&self, store: Arc<MemoryFs>) -> TieredFs {
        let mut tiered = TieredFs::new(store, self.tiers.limits);
        if let Some(dir) = &self.tiers.warm_dir {
            tiered = tiered.with_warm(Arc::new(LocalTier::new("warm", dir)));
        }
        if let Some(dir) = &self.tiers.cold_dir {
            tiered = tiered.with_cold(Arc::new(LocalTier::new("cold", dir)));
        }
        tiered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::{DEFAULT_HOT_MAX_SIZE, DEFAULT_WARM_MAX_SIZE, PromotionPolicy};
    use crate::vfs::Tier;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tiers.limits.hot_max_size, DEFAULT_HOT_MAX_SIZE);
        assert_eq!(config.tiers.limits.warm_max_size, DEFAULT_WARM_MAX_SIZE);
        assert!(config.store.image.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [store]
            image = "/tmp/store.db"

            [tiers]
            hot_max_size = "64K"
            warm_max_size = 1048576
            promotion_policy = "aggressive"
            warm_dir = "/tmp/warm"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.image, Some(PathBuf::from("/tmp/store.db")));
        assert_eq!(config.tiers.limits.hot_max_size, 64 * 1024);
        assert_eq!(config.tiers.limits.warm_max_size, 1024 * 1024);
        assert_eq!(config.tiers.limits.promotion_policy, PromotionPolicy::Aggressive);
        assert_eq!(config.tiers.warm_dir, Some(PathBuf::from("/tmp/warm")));
        assert!(config.tiers.cold_dir.is_none());
    }

    #[test]
    fn test_bad_config() {
        assert!(matches!(
            Config::from_toml("[tiers]\nhot_max_size = \"huge\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_toml("[tiers]\npromotion_policy = \"sometimes\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::load("/nonexistent/sekisou.toml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_tiered_from_config() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("sekisou.toml");
        std::fs::write(
            &config_path,
            format!(
                "[tiers]\nhot_max_size = 4\ncold_dir = {:?}\n",
                temp.path().join("cold")
            ),
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        let tiered = config.tiered(Arc::new(MemoryFs::new()));
        assert_eq!(tiered.select_tier(2), Tier::Hot);
        assert_eq!(tiered.select_tier(100), Tier::Cold);

        let tier = tiered.write_file("/big.bin", b"0123456789").await.unwrap();
        assert_eq!(tier, Tier::Cold);
        assert!(temp.path().join("cold/big.bin").exists());
    }
}
