//! Tier thresholds and promotion policy.

use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

use crate::size::parse_size;

/// When reads move payloads to faster tiers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PromotionPolicy {
    /// Payloads stay where they were written.
    None,
    /// Promote when the payload fits a faster tier's threshold.
    #[default]
    OnAccess,
    /// Promote straight to hot on every warm or cold read.
    Aggressive,
}

pub const DEFAULT_HOT_MAX_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_WARM_MAX_SIZE: u64 = 100 * 1024 * 1024;

/// Size thresholds for tier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Largest payload kept hot.
    #[serde(default = "default_hot_max", deserialize_with = "deserialize_size")]
    pub hot_max_size: u64,

    /// Largest payload kept warm.
    #[serde(default = "default_warm_max", deserialize_with = "deserialize_size")]
    pub warm_max_size: u64,

    #[serde(default)]
    pub promotion_policy: PromotionPolicy,
}

fn default_hot_max() -> u64 {
    DEFAULT_HOT_MAX_SIZE
}

fn default_warm_max() -> u64 {
    DEFAULT_WARM_MAX_SIZE
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            hot_max_size: DEFAULT_HOT_MAX_SIZE,
            warm_max_size: DEFAULT_WARM_MAX_SIZE,
            promotion_policy: PromotionPolicy::default(),
        }
    }
}

impl TierConfig {
    pub fn with_hot_max_size(mut self, size: u64) -> Self {
        self.hot_max_size = size;
        self
    }

    pub fn with_warm_max_size(mut self, size: u64) -> Self {
        self.warm_max_size = size;
        self
    }

    pub fn with_policy(mut self, policy: PromotionPolicy) -> Self {
        self.promotion_policy = policy;
        self
    }
}

/// Accept either an integer byte count or a size string.
fn deserialize_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bytes(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bytes(n) => Ok(n),
        Raw::Text(s) => {
            parse_size(&s).map_err(|reason| serde::de::Error::custom(format!("{s:?}: {reason}")))
        }
    }
}
