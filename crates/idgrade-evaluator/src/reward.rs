//! Per-worker reward aggregation.
//!
//! ```text
//! raw_reward = (0.2·avg(name_quality) + 0.1·avg(dob) + 0.7·address) × completeness
//! ```
//!
//! Averages run over *all* seeds of the round, so an unanswered seed drags the
//! averages down in addition to lowering completeness.

use idgrade_core::{ScoringSpec, SeedIdentity, SeedScore, Submission, WorkerId, WorkerScoreBreakdown};

use crate::{dob::score_dob, name_quality::score_name};

pub const NAME_WEIGHT: f64 = 0.2;
pub const DOB_WEIGHT: f64 = 0.1;
pub const ADDRESS_WEIGHT: f64 = 0.7;

/// Fraction of seeds answered with a non-empty variation list.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn completeness(seeds: &[SeedIdentity], submission: &Submission) -> f64 {
    if seeds.is_empty() {
        return 0.0;
    }
    let answered = seeds.iter().filter(|seed| submission.answers(&seed.name)).count();
    answered as f64 / seeds.len() as f64
}

#[must_use]
pub fn raw_reward(name_score: f64, dob_score: f64, address_score: f64, completeness: f64) -> f64 {
    let weighted = NAME_WEIGHT * name_score + DOB_WEIGHT * dob_score + ADDRESS_WEIGHT * address_score;
    (weighted * completeness).clamp(0.0, 1.0)
}

/// Name and DOB scores of one seed; unanswered seeds score zero.
///
/// Only the first [`ScoringSpec::max_scored_variations`] variations are
/// scored.
#[must_use]
pub fn score_seed(seed: &SeedIdentity, submission: &Submission, spec: &ScoringSpec) -> SeedScore {
    let mut variations = submission.variations_for(&seed.name);
    let limit = spec.max_scored_variations();
    if variations.len() > limit {
        tracing::debug!(
            seed = %seed.name,
            submitted = variations.len(),
            limit,
            "variation list truncated"
        );
        variations = &variations[..limit];
    }
    if variations.is_empty() {
        tracing::debug!(seed = %seed.name, "seed not answered");
        return SeedScore {
            seed_name: seed.name.clone(),
            answered: false,
            name_quality: 0.0,
            dob_score: 0.0,
        };
    }
    let names = variations.iter().map(|v| v.name.as_str()).collect::<Vec<_>>();
    let name = score_name(&seed.name, &names, spec);
    let dob = score_dob(&seed.date_of_birth, variations.iter().map(|v| v.dob.as_str()));
    SeedScore {
        seed_name: seed.name.clone(),
        answered: true,
        name_quality: name.score,
        dob_score: dob.score,
    }
}

/// Scores a worker's submission, given its address score.
///
/// The returned breakdown carries no penalty yet; anti-collusion runs after all
/// workers are scored.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn score_worker(
    worker_id: &WorkerId,
    seeds: &[SeedIdentity],
    submission: &Submission,
    spec: &ScoringSpec,
    address_score: f64,
) -> WorkerScoreBreakdown {
    let seed_scores = seeds
        .iter()
        .map(|seed| score_seed(seed, submission, spec))
        .collect::<Vec<_>>();
    let n = seeds.len().max(1) as f64;
    let name_score = seed_scores.iter().map(|s| s.name_quality).sum::<f64>() / n;
    let dob_score = seed_scores.iter().map(|s| s.dob_score).sum::<f64>() / n;
    let completeness = completeness(seeds, submission);
    let raw_reward = raw_reward(name_score, dob_score, address_score, completeness);

    tracing::debug!(
        worker = %worker_id,
        name_score,
        dob_score,
        address_score,
        completeness,
        raw_reward,
        "worker scored"
    );

    WorkerScoreBreakdown {
        worker_id: worker_id.clone(),
        name_score,
        dob_score,
        address_score,
        completeness,
        raw_reward,
        anti_collusion_penalty: 0.0,
        final_reward: raw_reward,
        seeds: seed_scores,
    }
}
