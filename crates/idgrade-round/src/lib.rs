//! Grading of one complete round.
//!
//! [`grade_round`] wires the per-worker scorers and the round-wide
//! anti-collusion pass together:
//!
//! 1. Validate the [`ScoringSpec`](idgrade_core::ScoringSpec); an invalid spec is the only fatal error.
//! 2. Score every worker on a bounded pool. Address geocoding shares a single
//!    rate-limited [`GeocodeGate`] across all workers.
//! 3. Build an immutable [`RoundSnapshot`] of all raw rewards and run the
//!    collusion detectors over it.
//! 4. Apply each worker's penalty and summarize the round.
//!
//! Malformed submissions, unreachable geocoders and rate limits all degrade
//! scores instead of failing the round.

use std::{collections::BTreeMap, sync::Arc, time::Instant};

use idgrade_address::{
    gazetteer::Gazetteer,
    geocode::{GeocodeGate, Geocoder},
    pipeline::{AddressScore, score_addresses},
};
use idgrade_collusion::detector::{RoundSnapshot, detect};
use idgrade_core::{
    CollusionSignal, Round, SpecError, Submission, WorkerId, WorkerScoreBreakdown, parallel,
};
use idgrade_evaluator::reward::score_worker;
use serde::{Deserialize, Serialize};

pub use self::{config::*, summary::*};

mod config;
mod summary;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum RoundError {
    #[display("invalid scoring spec: {_0}")]
    InvalidSpec(SpecError),
}

/// Everything produced by grading one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    /// Final breakdowns, in worker-id order.
    pub workers: Vec<WorkerScoreBreakdown>,
    pub addresses: BTreeMap<WorkerId, AddressScore>,
    pub signals: Vec<CollusionSignal>,
    pub summary: RoundSummary,
}

impl RoundReport {
    #[must_use]
    pub fn worker(&self, worker_id: &WorkerId) -> Option<&WorkerScoreBreakdown> {
        self.workers.iter().find(|w| &w.worker_id == worker_id)
    }
}

/// Grades every submission of `round`.
pub fn grade_round(
    round: &Round,
    config: &GradingConfig,
    geocoder: Arc<dyn Geocoder>,
    gazetteer: &dyn Gazetteer,
) -> Result<RoundReport, RoundError> {
    round.spec.validate()?;

    let width = config.parallelism();
    // a deadline too far out to represent means no deadline
    let deadline = Instant::now().checked_add(config.round_deadline());
    let gate = GeocodeGate::new(geocoder, config.geocode.clone(), deadline);
    tracing::info!(
        seeds = round.seeds.len(),
        workers = round.submissions.len(),
        width,
        "grading round"
    );

    let entries = round.submissions.iter().collect::<Vec<(&WorkerId, &Submission)>>();
    let scored = parallel::map_bounded(&entries, width, |&(worker_id, submission)| {
        let address = score_addresses(
            worker_id,
            &round.seeds,
            submission,
            &gate,
            gazetteer,
            config.round_seed,
        );
        let breakdown = score_worker(
            worker_id,
            &round.seeds,
            submission,
            &round.spec,
            address.score,
        );
        (breakdown, address)
    });

    let mut addresses = BTreeMap::new();
    let mut workers = Vec::with_capacity(scored.len());
    for (breakdown, address) in scored {
        addresses.insert(breakdown.worker_id.clone(), address);
        workers.push(breakdown);
    }

    let snapshot = RoundSnapshot::new(&round.submissions, &workers);
    let signals = detect(&snapshot, width);
    let penalties = signals
        .iter()
        .map(|s| (&s.worker_id, s.penalty()))
        .collect::<BTreeMap<_, _>>();
    for worker in &mut workers {
        let penalty = penalties.get(&worker.worker_id).copied().unwrap_or(0.0);
        worker.apply_penalty(penalty);
    }

    let summary = RoundSummary::new(round.seeds.len(), &workers);
    tracing::info!(
        penalized = summary.penalized_workers,
        mean_final = summary.final_reward.as_ref().map(|s| s.mean),
        "round graded"
    );

    Ok(RoundReport {
        workers,
        addresses,
        signals,
        summary,
    })
}
