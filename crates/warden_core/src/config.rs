//! Tunable configuration loaded from RON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::search::SearchLimits;
use crate::utility::UtilityConfig;

/// Planner settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// DFS node budget.
    pub budget: u32,
    /// MCTS iterations per run.
    pub mcts_steps: u32,
    /// MCTS rollout seed.
    pub seed: u64,
    /// Longest MCTS rollout, in actions.
    pub rollout_depth: u32,
    /// Branching bounds shared by both planners.
    pub limits: SearchLimits,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            budget: 50_000,
            mcts_steps: 2_000,
            seed: 0,
            rollout_depth: 64,
            limits: SearchLimits::default(),
        }
    }
}

/// Everything the decision core can be tuned with.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Utility scorer constants.
    pub utility: UtilityConfig,
    /// Planner settings.
    pub search: SearchConfig,
}

impl WardenConfig {
    /// Load and validate a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Parse and validate a configuration from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ConfigError> {
        let config: WardenConfig = ron::from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scorers and planners cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let u = &self.utility;
        if u.nearby_radius <= 0 {
            return Err(invalid("utility.nearby_radius", "must be positive"));
        }
        for (field, value) in [
            ("utility.caution", u.caution),
            ("utility.force_range", u.force_range),
            ("utility.force_exponent", u.force_exponent),
            ("utility.threat_range", u.threat_range),
            ("utility.threat_exponent", u.threat_exponent),
            ("utility.value_range", u.value_range),
            ("utility.value_exponent", u.value_exponent),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(field, format!("must be a positive number, got {value}")));
            }
        }
        if u.outrange_margin < 0 {
            return Err(invalid("utility.outrange_margin", "must not be negative"));
        }
        if u.detector_coverage == 0 {
            return Err(invalid("utility.detector_coverage", "must be positive"));
        }

        let s = &self.search;
        if s.budget == 0 {
            return Err(invalid("search.budget", "must be positive"));
        }
        if s.mcts_steps == 0 {
            return Err(invalid("search.mcts_steps", "must be positive"));
        }
        if s.limits.max_depth == 0 {
            return Err(invalid("search.limits.max_depth", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        message: message.into(),
    }
}
