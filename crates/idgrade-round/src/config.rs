use std::time::Duration;

pub use idgrade_address::geocode::GeocodeConfig;
use serde::{Deserialize, Serialize};

/// Knobs of a grading run. None of them changes scoring formulas.
///
/// Every field has a default, so a partial JSON object such as
/// `{"round_seed": 42}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    /// Seeds the per-worker address sampling.
    pub round_seed: u64,
    /// Worker threads; `None` uses the available parallelism.
    pub parallelism: Option<usize>,
    /// Upper bound on the wall-clock time spent geocoding in a round.
    pub round_deadline_ms: u64,
    pub geocode: GeocodeConfig,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            round_seed: 0,
            parallelism: None,
            round_deadline_ms: 600_000,
            geocode: GeocodeConfig::default(),
        }
    }
}

impl GradingConfig {
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
            .unwrap_or_else(idgrade_core::parallel::default_width)
            .max(1)
    }

    #[must_use]
    pub fn round_deadline(&self) -> Duration {
        Duration::from_millis(self.round_deadline_ms)
    }
}
