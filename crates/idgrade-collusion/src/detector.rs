//! Round-wide anti-collusion detectors.
//!
//! Detection runs once, after every worker has a final raw reward. It reads an
//! immutable [`RoundSnapshot`] and produces one [`CollusionSignal`] per worker;
//! nothing is written back until all detectors have finished.
//!
//! | Detector | Penalty |
//! |---|---|
//! | Duplicate addresses within a worker | `min(0.2, 0.2·(1 − distinct/total))` |
//! | Cross-worker overlap (strict / global) | 0.25 / 0.5, largest pair wins |
//! | Identical submission signature | 0.8 |
//! | Special-character abuse | `0.5·(fraction − 0.5)/0.5` above 50% |
//! | Reward bucket (> 5 workers, same reward < 0.95) | 0.3 |
//!
//! Components are summed and capped at 1.0.

use std::collections::{BTreeMap, BTreeSet};

use idgrade_core::{
    CollusionEvidence, CollusionSignal, PenaltyComponents, Submission, WorkerId,
    WorkerScoreBreakdown, parallel,
};
use sha2::{Digest as _, Sha256};

use crate::canonical::{address_key, name_key};

const DUPLICATION_CAP: f64 = 0.2;

const GLOBAL_OVERLAP: f64 = 0.95;
const GLOBAL_JACCARD: f64 = 0.90;
const GLOBAL_PENALTY: f64 = 0.5;
const STRICT_OVERLAP: f64 = 0.75;
const STRICT_JACCARD: f64 = 0.70;
const STRICT_PENALTY: f64 = 0.25;

const SIGNATURE_PENALTY: f64 = 0.8;

const NAME_PUNCTUATION_WHITELIST: &[char] = &[' ', '-', '\'', '.', ','];
const MAX_NAME_PUNCTUATION: usize = 2;
const ABUSE_FRACTION: f64 = 0.5;
const ABUSE_MAX_PENALTY: f64 = 0.5;

const BUCKET_MIN_GROUP: usize = 6;
const BUCKET_MAX_REWARD: f64 = 0.95;
const BUCKET_PENALTY: f64 = 0.3;

/// Canonicalized view of one worker's submission.
#[derive(Debug, Clone)]
pub struct WorkerSnapshot {
    pub worker_id: WorkerId,
    pub raw_reward: f64,
    /// Seed name → canonical keys of the variation names.
    pub name_keys: BTreeMap<String, BTreeSet<String>>,
    pub address_keys: Vec<String>,
    /// Hex SHA-256 over the canonicalized submission.
    pub signature: String,
    pub abusive_variations: usize,
    pub total_variations: usize,
}

impl WorkerSnapshot {
    #[must_use]
    pub fn new(worker_id: WorkerId, submission: &Submission, raw_reward: f64) -> Self {
        let mut name_keys = BTreeMap::new();
        let mut address_keys = vec![];
        let mut hasher = Sha256::new();
        let mut abusive_variations = 0;
        let mut total_variations = 0;

        for (seed, variations) in submission.iter() {
            if variations.is_empty() {
                continue;
            }
            let mut keyed = variations
                .iter()
                .map(|v| {
                    format!(
                        "{}|{}|{}",
                        name_key(&v.name),
                        v.dob.trim(),
                        address_key(&v.address)
                    )
                })
                .collect::<Vec<_>>();
            keyed.sort_unstable();
            hasher.update(name_key(seed).as_bytes());
            hasher.update([0x1e_u8]);
            for key in &keyed {
                hasher.update(key.as_bytes());
                hasher.update([0x1f_u8]);
            }
            hasher.update([0x1d_u8]);

            name_keys.insert(
                seed.to_owned(),
                variations.iter().map(|v| name_key(&v.name)).collect(),
            );
            address_keys.extend(variations.iter().map(|v| address_key(&v.address)));
            abusive_variations += variations
                .iter()
                .filter(|v| is_abusive_name(&v.name))
                .count();
            total_variations += variations.len();
        }

        Self {
            worker_id,
            raw_reward,
            name_keys,
            address_keys,
            signature: hex::encode(hasher.finalize()),
            abusive_variations,
            total_variations,
        }
    }
}

/// Whether a name carries more symbols than ordinary names do.
#[must_use]
pub fn is_abusive_name(name: &str) -> bool {
    name.chars()
        .filter(|c| !c.is_alphanumeric() && !NAME_PUNCTUATION_WHITELIST.contains(c))
        .count()
        > MAX_NAME_PUNCTUATION
}

/// Immutable view of a whole round, built once before detection.
#[derive(Debug, Clone)]
pub struct RoundSnapshot {
    workers: Vec<WorkerSnapshot>,
}

impl RoundSnapshot {
    /// Builds the snapshot from every scored worker.
    ///
    /// Workers without a breakdown are skipped.
    #[must_use]
    pub fn new(
        submissions: &BTreeMap<WorkerId, Submission>,
        breakdowns: &[WorkerScoreBreakdown],
    ) -> Self {
        let workers = breakdowns
            .iter()
            .filter_map(|b| {
                let submission = submissions.get(&b.worker_id)?;
                Some(WorkerSnapshot::new(
                    b.worker_id.clone(),
                    submission,
                    b.raw_reward,
                ))
            })
            .collect();
        Self { workers }
    }

    #[must_use]
    pub fn from_workers(workers: Vec<WorkerSnapshot>) -> Self {
        Self { workers }
    }

    #[must_use]
    pub fn workers(&self) -> &[WorkerSnapshot] {
        &self.workers
    }
}

#[derive(Debug, Default)]
struct Finding {
    components: PenaltyComponents,
    evidence: Vec<CollusionEvidence>,
}

/// Runs every detector and returns one signal per worker, in snapshot order.
///
/// The pairwise comparison uses at most `parallelism` threads.
#[must_use]
pub fn detect(snapshot: &RoundSnapshot, parallelism: usize) -> Vec<CollusionSignal> {
    let workers = snapshot.workers();
    let mut findings = workers.iter().map(|_| Finding::default()).collect::<Vec<_>>();

    for (worker, finding) in workers.iter().zip(&mut findings) {
        address_duplication(worker, finding);
        special_characters(worker, finding);
    }
    cross_worker_overlap(workers, &mut findings, parallelism);
    exact_signatures(workers, &mut findings);
    reward_buckets(workers, &mut findings);

    let signals = workers
        .iter()
        .zip(findings)
        .map(|(worker, finding)| CollusionSignal {
            worker_id: worker.worker_id.clone(),
            components: finding.components,
            evidence: finding.evidence,
        })
        .collect::<Vec<_>>();

    let flagged = signals.iter().filter(|s| !s.components.is_zero()).count();
    tracing::info!(workers = workers.len(), flagged, "collusion detection finished");
    signals
}

#[expect(clippy::cast_precision_loss)]
fn address_duplication(worker: &WorkerSnapshot, finding: &mut Finding) {
    let total = worker.address_keys.len();
    if total == 0 {
        return;
    }
    let distinct = worker.address_keys.iter().collect::<BTreeSet<_>>().len();
    if distinct == total {
        return;
    }
    let penalty = (DUPLICATION_CAP * (1.0 - distinct as f64 / total as f64)).min(DUPLICATION_CAP);
    finding.components.address_duplication = penalty;
    finding
        .evidence
        .push(CollusionEvidence::DuplicateAddresses { distinct, total });
}

#[expect(clippy::cast_precision_loss)]
fn special_characters(worker: &WorkerSnapshot, finding: &mut Finding) {
    if worker.total_variations == 0 {
        return;
    }
    let fraction = worker.abusive_variations as f64 / worker.total_variations as f64;
    if fraction <= ABUSE_FRACTION {
        return;
    }
    finding.components.special_characters =
        ABUSE_MAX_PENALTY * (fraction - ABUSE_FRACTION) / (1.0 - ABUSE_FRACTION);
    finding.evidence.push(CollusionEvidence::SpecialCharacterAbuse {
        abusive: worker.abusive_variations,
        total: worker.total_variations,
    });
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PairVerdict {
    Global { shared_seeds: usize },
    Strict { flagged_seeds: usize, shared_seeds: usize },
}

impl PairVerdict {
    fn penalty(self) -> f64 {
        match self {
            Self::Global { .. } => GLOBAL_PENALTY,
            Self::Strict { .. } => STRICT_PENALTY,
        }
    }

    fn evidence(self, peer: &WorkerId) -> CollusionEvidence {
        match self {
            Self::Global { shared_seeds } => CollusionEvidence::GlobalOverlap {
                peer: peer.clone(),
                shared_seeds,
            },
            Self::Strict {
                flagged_seeds,
                shared_seeds,
            } => CollusionEvidence::StrictOverlap {
                peer: peer.clone(),
                flagged_seeds,
                shared_seeds,
            },
        }
    }
}

/// Overlap coefficient and Jaccard index of two key sets.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn set_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> (f64, f64) {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return (0.0, 0.0);
    }
    let common = a.intersection(b).count();
    let union = a.len() + b.len() - common;
    (common as f64 / smaller as f64, common as f64 / union as f64)
}

fn compare_pair(a: &WorkerSnapshot, b: &WorkerSnapshot) -> Option<PairVerdict> {
    let mut shared_seeds = 0;
    let mut global = 0;
    let mut strict = 0;
    for (seed, a_keys) in &a.name_keys {
        let Some(b_keys) = b.name_keys.get(seed) else {
            continue;
        };
        shared_seeds += 1;
        let (overlap, jaccard) = set_similarity(a_keys, b_keys);
        if overlap > GLOBAL_OVERLAP || jaccard > GLOBAL_JACCARD {
            global += 1;
        }
        if overlap > STRICT_OVERLAP || jaccard > STRICT_JACCARD {
            strict += 1;
        }
    }
    if shared_seeds == 0 {
        None
    } else if global == shared_seeds {
        Some(PairVerdict::Global { shared_seeds })
    } else if strict * 2 > shared_seeds {
        Some(PairVerdict::Strict {
            flagged_seeds: strict,
            shared_seeds,
        })
    } else {
        None
    }
}

fn cross_worker_overlap(workers: &[WorkerSnapshot], findings: &mut [Finding], parallelism: usize) {
    let pairs = (0..workers.len())
        .flat_map(|i| (i + 1..workers.len()).map(move |j| (i, j)))
        .collect::<Vec<_>>();
    let verdicts = parallel::map_bounded(&pairs, parallelism, |&(i, j)| {
        compare_pair(&workers[i], &workers[j])
    });

    for (&(i, j), verdict) in pairs.iter().zip(verdicts) {
        let Some(verdict) = verdict else {
            continue;
        };
        tracing::debug!(
            a = %workers[i].worker_id,
            b = %workers[j].worker_id,
            ?verdict,
            "submissions overlap"
        );
        for (me, peer) in [(i, j), (j, i)] {
            let finding = &mut findings[me];
            finding.components.cross_worker_overlap =
                finding.components.cross_worker_overlap.max(verdict.penalty());
            finding.evidence.push(verdict.evidence(&workers[peer].worker_id));
        }
    }
}

fn exact_signatures(workers: &[WorkerSnapshot], findings: &mut [Finding]) {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, worker) in workers.iter().enumerate() {
        if worker.raw_reward > 0.0 && worker.total_variations > 0 {
            groups.entry(worker.signature.as_str()).or_default().push(i);
        }
    }
    for (signature, members) in groups.into_iter().filter(|(_, m)| m.len() >= 2) {
        for &i in &members {
            let peers = members
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| workers[j].worker_id.clone())
                .collect();
            findings[i].components.exact_signature = SIGNATURE_PENALTY;
            findings[i].evidence.push(CollusionEvidence::SharedSignature {
                signature: signature.to_owned(),
                peers,
            });
        }
    }
}

#[expect(clippy::cast_possible_truncation)]
fn reward_bucket_key(reward: f64) -> i64 {
    (reward * 10_000.0).round() as i64
}

#[expect(clippy::cast_precision_loss)]
fn reward_buckets(workers: &[WorkerSnapshot], findings: &mut [Finding]) {
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, worker) in workers.iter().enumerate() {
        if worker.raw_reward > 0.0 {
            groups
                .entry(reward_bucket_key(worker.raw_reward))
                .or_default()
                .push(i);
        }
    }
    for (key, members) in groups {
        let reward = key as f64 / 10_000.0;
        if members.len() < BUCKET_MIN_GROUP || reward >= BUCKET_MAX_REWARD {
            continue;
        }
        for &i in &members {
            findings[i].components.reward_bucket = BUCKET_PENALTY;
            findings[i].evidence.push(CollusionEvidence::RewardBucket {
                reward,
                group_size: members.len(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use idgrade_core::Variation;

    use super::*;

    fn submission(entries: &[(&str, &[(&str, &str)])]) -> Submission {
        entries
            .iter()
            .map(|(seed, variations)| {
                let variations = variations
                    .iter()
                    .map(|(name, address)| Variation::new(*name, "1990-06-16", *address))
                    .collect();
                ((*seed).to_owned(), variations)
            })
            .collect()
    }

    fn worker(id: &str, submission: &Submission, raw_reward: f64) -> WorkerSnapshot {
        WorkerSnapshot::new(WorkerId::new(id), submission, raw_reward)
    }

    fn signal<'a>(signals: &'a [CollusionSignal], id: &str) -> &'a CollusionSignal {
        signals
            .iter()
            .find(|s| s.worker_id.as_str() == id)
            .unwrap()
    }

    const A1: &str = "12 Elm Street, Springfield, 12345, Example Country";
    const A2: &str = "14 Oak Avenue, Springfield, 12345, Example Country";
    const A3: &str = "7 Lake Road, Riverton, 54321, Example Country";
    const A4: &str = "3 Hill Lane, Lakeside, 67890, Example Country";

    #[test]
    fn test_identical_submissions_share_signature() {
        let s = submission(&[("John Smith", &[("Jon Smith", A1), ("John Smyth", A2)])]);
        let snapshot = RoundSnapshot::from_workers(vec![worker("a", &s, 0.6), worker("b", &s, 0.6)]);
        let signals = detect(&snapshot, 2);
        for id in ["a", "b"] {
            let signal = signal(&signals, id);
            assert_eq!(signal.components.exact_signature, SIGNATURE_PENALTY);
            assert_eq!(signal.components.cross_worker_overlap, GLOBAL_PENALTY);
            assert_eq!(signal.penalty(), 1.0);
        }
    }

    #[test]
    fn test_reordered_and_respelled_submission_has_same_signature() {
        let a = submission(&[("John Smith", &[("Jon Smith", A1), ("John Smyth", A2)])]);
        let b = submission(&[("John Smith", &[("JOHN SMYTH", A2), ("J0n Smith", A1)])]);
        assert_eq!(worker("a", &a, 0.5).signature, worker("b", &b, 0.5).signature);
    }

    #[test]
    fn test_zero_reward_workers_do_not_share_signature_penalty() {
        let s = submission(&[("John Smith", &[("Jon Smith", A1)])]);
        let snapshot = RoundSnapshot::from_workers(vec![worker("a", &s, 0.0), worker("b", &s, 0.0)]);
        let signals = detect(&snapshot, 1);
        assert_eq!(signal(&signals, "a").components.exact_signature, 0.0);
    }

    #[test]
    fn test_unique_worker_is_not_penalized() {
        let a = submission(&[("John Smith", &[("Jon Smith", A1), ("John Smyth", A2)])]);
        let b = submission(&[("John Smith", &[("Jhon Smiht", A3), ("Johnny Smit", A2)])]);
        let snapshot = RoundSnapshot::from_workers(vec![worker("a", &a, 0.6), worker("b", &b, 0.5)]);
        let signals = detect(&snapshot, 2);
        assert!(signals.iter().all(|s| s.penalty() == 0.0));
        assert!(signals.iter().all(|s| s.evidence.is_empty()));
    }

    #[test]
    fn test_strict_overlap() {
        let a = submission(&[
            ("John Smith", &[("Jon Smith", A1), ("John Smyth", A2)]),
            ("Anna Lopez", &[("Ana Lopez", A3)]),
            ("Mark Chan", &[("Marc Chan", A4)]),
        ]);
        let b = submission(&[
            ("John Smith", &[("Jon Smith", A1), ("John Smyth", A2)]),
            ("Anna Lopez", &[("Ana Lopez", A3)]),
            ("Mark Chan", &[("Mark Chen", A4)]),
        ]);
        let snapshot = RoundSnapshot::from_workers(vec![worker("a", &a, 0.6), worker("b", &b, 0.5)]);
        let signals = detect(&snapshot, 2);
        let a = signal(&signals, "a");
        assert_eq!(a.components.cross_worker_overlap, STRICT_PENALTY);
        assert!(matches!(
            a.evidence.as_slice(),
            [CollusionEvidence::StrictOverlap {
                flagged_seeds: 2,
                shared_seeds: 3,
                ..
            }]
        ));
    }

    #[test]
    fn test_address_duplication() {
        let s = submission(&[(
            "John Smith",
            &[("Jon Smith", A1), ("John Smyth", A1), ("Jhon Smith", A1), ("Jo Smith", A2)],
        )]);
        let snapshot = RoundSnapshot::from_workers(vec![worker("a", &s, 0.6)]);
        let signals = detect(&snapshot, 1);
        assert!((signals[0].components.address_duplication - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_special_character_abuse() {
        assert!(is_abusive_name("J*o#h!n Smith"));
        assert!(!is_abusive_name("Mary-Jane O'Neil, Jr."));

        let s = submission(&[(
            "John Smith",
            &[("J*o#h!n Smith", A1), ("J&o^h%n Smith", A2), ("John Smyth", A3), ("J(o)h{n} Smith", A3)],
        )]);
        let snapshot = RoundSnapshot::from_workers(vec![worker("a", &s, 0.6)]);
        let signals = detect(&snapshot, 1);
        assert!((signals[0].components.special_characters - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_reward_bucket() {
        let snapshot = RoundSnapshot::from_workers(
            (0..6)
                .map(|i| {
                    let s = submission(&[("John Smith", &[("Jon Smith", A1)])]);
                    let mut w = worker(&format!("w{i}"), &s, 0.42);
                    // distinct signatures and name keys
                    w.signature = format!("sig{i}");
                    w.name_keys = BTreeMap::from([(format!("seed{i}"), BTreeSet::new())]);
                    w
                })
                .collect(),
        );
        let signals = detect(&snapshot, 4);
        assert!(signals.iter().all(|s| s.components.reward_bucket == BUCKET_PENALTY));
        assert!(signals.iter().all(|s| s.components.exact_signature == 0.0));
    }

    #[test]
    fn test_five_equal_rewards_are_not_a_bucket() {
        let snapshot = RoundSnapshot::from_workers(
            (0..5)
                .map(|i| {
                    let s = submission(&[(&format!("seed{i}") as &str, &[("Jon Smith", A1)])]);
                    worker(&format!("w{i}"), &s, 0.42)
                })
                .collect(),
        );
        let signals = detect(&snapshot, 4);
        assert!(signals.iter().all(|s| s.components.reward_bucket == 0.0));
    }

    #[test]
    fn test_set_similarity() {
        let a = BTreeSet::from(["x".to_owned(), "y".to_owned()]);
        let b = BTreeSet::from(["x".to_owned(), "y".to_owned(), "z".to_owned(), "w".to_owned()]);
        let (overlap, jaccard) = set_similarity(&a, &b);
        assert_eq!(overlap, 1.0);
        assert_eq!(jaccard, 0.5);
    }
}
