//! Name quality of one seed's variations.
//!
//! Each name part (first, last) is scored on four components:
//!
//! ```text
//! part = 0.60·similarity + 0.15·count + 0.10·uniqueness + 0.15·length
//! ```
//!
//! The parts are blended towards the last name, and the result is blended with
//! rule compliance:
//!
//! ```text
//! name_base    = 0.3·first + 0.7·last      (single-token originals: first)
//! name_quality = 0.8·name_base + 0.2·rule
//! ```

use std::collections::BTreeSet;

use idgrade_core::ScoringSpec;
use serde::{Deserialize, Serialize};

use crate::{
    rule::{RuleScore, score_rules},
    similarity::{PartSimilarity, combined_similarity, split_name},
};

const SIMILARITY_WEIGHT: f64 = 0.60;
const COUNT_WEIGHT: f64 = 0.15;
const UNIQUENESS_WEIGHT: f64 = 0.10;
const LENGTH_WEIGHT: f64 = 0.15;

const FIRST_NAME_WEIGHT: f64 = 0.3;
const LAST_NAME_WEIGHT: f64 = 0.7;

const NAME_BASE_WEIGHT: f64 = 0.8;
const RULE_WEIGHT: f64 = 0.2;

/// Two variations this similar to each other count as the same variation.
const DUPLICATE_SIMILARITY: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartScore {
    pub similarity: PartSimilarity,
    pub count: f64,
    pub uniqueness: f64,
    pub length: f64,
    pub score: f64,
}

impl PartScore {
    fn new(similarity: PartSimilarity, count: f64, uniqueness: f64, length: f64) -> Self {
        let score = SIMILARITY_WEIGHT * similarity.score()
            + COUNT_WEIGHT * count
            + UNIQUENESS_WEIGHT * uniqueness
            + LENGTH_WEIGHT * length;
        Self {
            similarity,
            count,
            uniqueness,
            length,
            score,
        }
    }
}

/// Explainable name-quality result for one seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameQuality {
    pub first: PartScore,
    /// `None` for single-token originals.
    pub last: Option<PartScore>,
    pub rule: RuleScore,
    pub name_base: f64,
    pub score: f64,
}

/// Scores a seed's variation names against the original name.
///
/// An empty variation list scores 0.0.
#[must_use]
pub fn score_name(original: &str, variations: &[&str], spec: &ScoringSpec) -> NameQuality {
    let (original_first, original_last) = split_name(original);
    let (first_parts, last_parts): (Vec<_>, Vec<_>) =
        variations.iter().map(|name| split_name(name)).unzip();

    let count = count_score(variations, spec);
    let uniqueness = uniqueness_score(variations);

    let part = |original_part: &str, parts: &[&str]| {
        PartScore::new(
            PartSimilarity::evaluate(original_part, parts, spec),
            count,
            uniqueness,
            mean_length_score(original_part, parts),
        )
    };
    let first = part(original_first, &first_parts);
    let last = (!original_last.is_empty()).then(|| part(original_last, &last_parts));

    let name_base = match &last {
        Some(last) => FIRST_NAME_WEIGHT * first.score + LAST_NAME_WEIGHT * last.score,
        None => first.score,
    };
    let rule = score_rules(original, variations, spec);
    let score = if variations.is_empty() {
        0.0
    } else {
        NAME_BASE_WEIGHT * name_base + RULE_WEIGHT * rule.score
    };

    NameQuality {
        first,
        last,
        rule,
        name_base,
        score,
    }
}

/// Distinct case-folded names relative to the non-rule share of the target count.
#[expect(clippy::cast_precision_loss)]
fn count_score(variations: &[&str], spec: &ScoringSpec) -> f64 {
    let expected = f64::from(spec.variation_count) * (1.0 - spec.rule_percentage);
    if expected <= 0.0 {
        return 1.0;
    }
    let distinct = variations
        .iter()
        .map(|name| name.trim().to_lowercase())
        .collect::<BTreeSet<_>>()
        .len();
    (distinct as f64 / expected).min(1.0)
}

/// Fraction of variations not near-identical to any earlier one.
#[expect(clippy::cast_precision_loss)]
fn uniqueness_score(variations: &[&str]) -> f64 {
    if variations.is_empty() {
        return 0.0;
    }
    let unique = variations
        .iter()
        .enumerate()
        .filter(|(i, name)| {
            variations[..*i]
                .iter()
                .all(|earlier| combined_similarity(earlier, name) < DUPLICATE_SIMILARITY)
        })
        .count();
    unique as f64 / variations.len() as f64
}

/// Length plausibility of a part whose length is `ratio` times the original's.
#[must_use]
pub fn length_score(ratio: f64) -> f64 {
    if (0.8..=1.2).contains(&ratio) {
        1.0
    } else if (0.6..0.8).contains(&ratio) {
        0.5 + 0.5 * (ratio - 0.6) / 0.2
    } else if ratio > 1.2 && ratio <= 1.4 {
        0.5 + 0.5 * (1.4 - ratio) / 0.2
    } else {
        0.0
    }
}

#[expect(clippy::cast_precision_loss)]
fn mean_length_score(original: &str, parts: &[&str]) -> f64 {
    if parts.is_empty() {
        return 0.0;
    }
    let original_len = original.chars().count();
    let total = parts
        .iter()
        .map(|part| {
            let len = part.chars().count();
            if original_len == 0 {
                if len == 0 { 1.0 } else { 0.0 }
            } else {
                length_score(len as f64 / original_len as f64)
            }
        })
        .sum::<f64>();
    total / parts.len() as f64
}
