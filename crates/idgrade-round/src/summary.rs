use idgrade_core::WorkerScoreBreakdown;
use idgrade_stats::descriptive::DescriptiveStats;
use serde::{Deserialize, Serialize};

/// Round-level overview of the reward distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub worker_count: usize,
    pub seed_count: usize,
    /// Workers with a nonzero anti-collusion penalty.
    pub penalized_workers: usize,
    pub raw_reward: Option<DescriptiveStats>,
    pub final_reward: Option<DescriptiveStats>,
}

impl RoundSummary {
    #[must_use]
    pub fn new(seed_count: usize, workers: &[WorkerScoreBreakdown]) -> Self {
        Self {
            worker_count: workers.len(),
            seed_count,
            penalized_workers: workers
                .iter()
                .filter(|w| w.anti_collusion_penalty > 0.0)
                .count(),
            raw_reward: DescriptiveStats::new(workers.iter().map(|w| w.raw_reward)),
            final_reward: DescriptiveStats::new(workers.iter().map(|w| w.final_reward)),
        }
    }
}
