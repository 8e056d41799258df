//! Engine tuning knobs.
//!
//! Every field has a default, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! match_threshold: 0.6
//! rolling_window: 7
//! clean:
//!   normalize_text: false
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    clean::CleanOptions, error::AnalyticsError, matcher::DEFAULT_MATCH_THRESHOLD,
    stats::DEFAULT_OUTLIER_MULTIPLIER,
};

pub const DEFAULT_ROLLING_WINDOW: usize = 3;
pub const DEFAULT_NTILE_BUCKETS: usize = 4;
pub const DEFAULT_LAG_OFFSET: usize = 1;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Minimum score for a non-exact column match.
    pub match_threshold: f64,
    pub clean: CleanOptions,
    /// IQR multiplier used by outlier insights.
    pub outlier_multiplier: f64,
    pub rolling_window: usize,
    pub ntile_buckets: usize,
    /// Row offset used by LAG and LEAD.
    pub lag_offset: usize,
    /// Conversation turns retained per session.
    pub history_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            clean: CleanOptions::default(),
            outlier_multiplier: DEFAULT_OUTLIER_MULTIPLIER,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            ntile_buckets: DEFAULT_NTILE_BUCKETS,
            lag_offset: DEFAULT_LAG_OFFSET,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl EngineOptions {
    pub fn from_yaml_str(source: &str) -> Result<Self, serde_yaml::Error> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(source)
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(AnalyticsError::InvalidOption(format!(
                "match_threshold must be within [0, 1], got {}",
                self.match_threshold
            )));
        }
        if !self.outlier_multiplier.is_finite() || self.outlier_multiplier < 0.0 {
            return Err(AnalyticsError::InvalidOption(format!(
                "outlier_multiplier must be a non-negative number, got {}",
                self.outlier_multiplier
            )));
        }
        if self.rolling_window == 0 {
            return Err(AnalyticsError::InvalidOption(
                "rolling_window must be at least 1".to_string(),
            ));
        }
        if self.ntile_buckets == 0 {
            return Err(AnalyticsError::InvalidOption(
                "ntile_buckets must be at least 1".to_string(),
            ));
        }
        if self.clean.sample_size == 0 {
            return Err(AnalyticsError::InvalidOption(
                "clean.sample_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
