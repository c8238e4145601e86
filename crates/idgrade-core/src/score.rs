use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{RuleId, WorkerId};

/// Rules satisfied by a single variation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCompliance {
    pub satisfied: BTreeSet<RuleId>,
}

impl RuleCompliance {
    #[must_use]
    pub fn is_compliant(&self) -> bool {
        !self.satisfied.is_empty()
    }
}

/// Outcome of the address pipeline for one address.
///
/// `geocode_score` is `None` when the address was not sampled for geocoding or
/// never reached that stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressVerdict {
    pub looks_valid: bool,
    pub region_match: bool,
    pub geocode_score: Option<f64>,
    pub bounding_area_m2: Option<f64>,
}

/// Per-seed part of a worker's breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedScore {
    pub seed_name: String,
    pub answered: bool,
    pub name_quality: f64,
    pub dob_score: f64,
}

/// Everything a worker scored in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerScoreBreakdown {
    pub worker_id: WorkerId,
    /// Mean name quality over all seeds.
    pub name_score: f64,
    /// Mean DOB coverage over all seeds.
    pub dob_score: f64,
    pub address_score: f64,
    /// Fraction of seeds answered with at least one variation.
    pub completeness: f64,
    pub raw_reward: f64,
    pub anti_collusion_penalty: f64,
    pub final_reward: f64,
    pub seeds: Vec<SeedScore>,
}

impl WorkerScoreBreakdown {
    /// Sets the collusion penalty and derives `final_reward` from it.
    ///
    /// The penalty is capped at 1.0 so the final reward never goes negative.
    pub fn apply_penalty(&mut self, penalty: f64) {
        let penalty = penalty.clamp(0.0, 1.0);
        self.anti_collusion_penalty = penalty;
        self.final_reward = self.raw_reward * (1.0 - penalty);
    }
}

/// Individual penalty contributions of one [`CollusionSignal`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyComponents {
    pub address_duplication: f64,
    pub cross_worker_overlap: f64,
    pub exact_signature: f64,
    pub special_characters: f64,
    pub reward_bucket: f64,
}

impl PenaltyComponents {
    /// Sum of all components, capped at 1.0.
    #[must_use]
    pub fn total(&self) -> f64 {
        (self.address_duplication
            + self.cross_worker_overlap
            + self.exact_signature
            + self.special_characters
            + self.reward_bucket)
            .min(1.0)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.total() <= 0.0
    }
}

/// Why a worker was penalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollusionEvidence {
    DuplicateAddresses {
        distinct: usize,
        total: usize,
    },
    StrictOverlap {
        peer: WorkerId,
        flagged_seeds: usize,
        shared_seeds: usize,
    },
    GlobalOverlap {
        peer: WorkerId,
        shared_seeds: usize,
    },
    SharedSignature {
        signature: String,
        peers: Vec<WorkerId>,
    },
    SpecialCharacterAbuse {
        abusive: usize,
        total: usize,
    },
    RewardBucket {
        reward: f64,
        group_size: usize,
    },
}

/// Anti-collusion finding for one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollusionSignal {
    pub worker_id: WorkerId,
    pub components: PenaltyComponents,
    pub evidence: Vec<CollusionEvidence>,
}

impl CollusionSignal {
    #[must_use]
    pub fn penalty(&self) -> f64 {
        self.components.total()
    }
}
