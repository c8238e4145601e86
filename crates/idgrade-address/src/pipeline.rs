//! Per-worker address scoring: FORMAT → REGION → GEOCODE → SCORED.

use std::collections::BTreeSet;

use idgrade_core::{AddressVerdict, SeedIdentity, Submission, WorkerId};
use rand::{SeedableRng as _, seq::IndexedRandom as _};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::{
    format::check_format,
    gazetteer::Gazetteer,
    geocode::{CallOutcome, GeocodeGate},
    region::{extract_region, region_matches},
};

/// Score when geocoding could not confirm the sampled addresses.
pub const SOFT_FAIL_SCORE: f64 = 0.3;

/// Why the pipeline stopped, if it did not score by geocoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressStage {
    NoAddresses,
    Format,
    Region,
    Geocode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressScore {
    pub score: f64,
    /// Stage that decided the score.
    pub decided_by: AddressStage,
    /// One verdict per submitted address, in seed order.
    pub verdicts: Vec<AddressVerdict>,
    /// Outcomes of the sampled geocoding calls.
    pub calls: Vec<(String, CallOutcome)>,
}

/// Seed for the per-worker sampling RNG.
fn sampling_seed(round_seed: u64, worker_id: &WorkerId) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(round_seed.to_le_bytes());
    hasher.update(worker_id.as_str().as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Scores every address a worker submitted.
///
/// Any address failing FORMAT or REGION zeroes the score without geocoding.
/// Otherwise a deterministic sample of distinct addresses is geocoded: any
/// failed or timed-out call gives [`SOFT_FAIL_SCORE`], and all-successful calls
/// give their mean score.
pub fn score_addresses(
    worker_id: &WorkerId,
    seeds: &[SeedIdentity],
    submission: &Submission,
    gate: &GeocodeGate,
    gazetteer: &dyn Gazetteer,
    round_seed: u64,
) -> AddressScore {
    let mut verdicts = vec![];
    let mut addresses = vec![];
    for seed in seeds {
        let seed_region = extract_region(&seed.address, gazetteer);
        for variation in submission.variations_for(&seed.name) {
            let looks_valid = check_format(&variation.address).is_valid();
            let region_match = looks_valid
                && region_matches(&extract_region(&variation.address, gazetteer), &seed_region);
            verdicts.push(AddressVerdict {
                looks_valid,
                region_match,
                geocode_score: None,
                bounding_area_m2: None,
            });
            addresses.push(variation.address.trim());
        }
    }

    let stop = |decided_by, verdicts| AddressScore {
        score: 0.0,
        decided_by,
        verdicts,
        calls: vec![],
    };
    if verdicts.is_empty() {
        return stop(AddressStage::NoAddresses, verdicts);
    }
    if let Some(index) = verdicts.iter().position(|v| !v.looks_valid) {
        tracing::debug!(worker = %worker_id, address = addresses[index], "address format rejected");
        return stop(AddressStage::Format, verdicts);
    }
    if let Some(index) = verdicts.iter().position(|v| !v.region_match) {
        tracing::debug!(worker = %worker_id, address = addresses[index], "address outside seed region");
        return stop(AddressStage::Region, verdicts);
    }

    let distinct = addresses.iter().copied().collect::<BTreeSet<_>>();
    let distinct = distinct.into_iter().collect::<Vec<_>>();
    let mut rng = Pcg64::seed_from_u64(sampling_seed(round_seed, worker_id));
    let sample = distinct
        .choose_multiple(&mut rng, gate.config().sample_size)
        .copied()
        .collect::<Vec<_>>();

    let calls = sample
        .iter()
        .map(|address| ((*address).to_owned(), gate.call(address)))
        .collect::<Vec<_>>();
    for (address, outcome) in &calls {
        if let CallOutcome::Success {
            score,
            bounding_area_m2,
        } = outcome
        {
            for (verdict, _) in verdicts
                .iter_mut()
                .zip(&addresses)
                .filter(|(_, a)| **a == address.as_str())
            {
                verdict.geocode_score = Some(*score);
                verdict.bounding_area_m2 = *bounding_area_m2;
            }
        }
    }

    let score = aggregate_calls(calls.iter().map(|(_, outcome)| outcome));
    tracing::debug!(worker = %worker_id, sampled = calls.len(), score, "addresses geocoded");
    AddressScore {
        score,
        decided_by: AddressStage::Geocode,
        verdicts,
        calls,
    }
}

/// Soft-fails on any failure or when nothing succeeded; else the mean score.
#[expect(clippy::cast_precision_loss)]
fn aggregate_calls<'a, I>(outcomes: I) -> f64
where
    I: IntoIterator<Item = &'a CallOutcome>,
{
    let mut total = 0.0;
    let mut successes = 0_usize;
    for outcome in outcomes {
        match outcome {
            CallOutcome::Success { score, .. } => {
                total += score;
                successes += 1;
            }
            CallOutcome::Failed | CallOutcome::TimedOut => return SOFT_FAIL_SCORE,
        }
    }
    if successes == 0 {
        SOFT_FAIL_SCORE
    } else {
        total / successes as f64
    }
}
