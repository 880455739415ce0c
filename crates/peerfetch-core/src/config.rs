//! Aggregator configuration.
//!
//! Plain data with serde support so adapters can load it from whatever
//! settings source they use.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What happens to the selection when the selected transfer fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionPolicy {
    /// Select the next live transfer in roster order, wrapping around.
    #[default]
    NextStandby,
    /// Keep the failed transfer selected; standbys can still win.
    Retain,
}

impl fmt::Display for PromotionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NextStandby => f.write_str("next_standby"),
            Self::Retain => f.write_str("retain"),
        }
    }
}

/// Configuration for a transfer aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Selection policy applied when the selected transfer fails.
    pub promotion: PromotionPolicy,
    /// Seed for the roster shuffle. `None` draws from thread-local entropy.
    pub shuffle_seed: Option<u64>,
}

impl AggregatorConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the promotion policy.
    #[must_use]
    pub const fn with_promotion(mut self, promotion: PromotionPolicy) -> Self {
        self.promotion = promotion;
        self
    }

    /// Make the roster shuffle reproducible.
    #[must_use]
    pub const fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }
}
