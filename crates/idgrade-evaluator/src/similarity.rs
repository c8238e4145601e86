//! Orthographic similarity and band-distribution matching.
//!
//! A worker is not rewarded for making every variation as close as possible to
//! the original; it is rewarded for hitting the requested *mix* of bands. The
//! per-variation scores are therefore reduced to bands first, and only the band
//! counts are compared against the target [`BandDistribution`].

use idgrade_core::{BandDistribution, ScoringSpec, SimilarityBand};
use serde::{Deserialize, Serialize};

use crate::phonetic::{derive_algorithm_weights, phonetic_score};

const UNMATCHED_PENALTY: f64 = 0.1;
const LOW_SCORE_THRESHOLD: f64 = 0.2;
const LOW_SCORE_FACTOR: f64 = 0.1;

/// Levenshtein edit distance over chars.
#[must_use]
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    let mut row = (0..=b.len()).collect::<Vec<_>>();
    for (i, ca) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[b.len()]
}

/// `1 − levenshtein / max_len` over lower-cased chars; two empty strings score 1.0.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn orthographic_score(original: &str, variant: &str) -> f64 {
    let a = original.to_lowercase().chars().collect::<Vec<_>>();
    let b = variant.to_lowercase().chars().collect::<Vec<_>>();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    (max_len - distance) as f64 / max_len as f64
}

/// Mean of the phonetic and orthographic scores.
#[must_use]
pub fn combined_similarity(original: &str, variant: &str) -> f64 {
    f64::midpoint(
        phonetic_score(original, variant),
        orthographic_score(original, variant),
    )
}

/// Splits a name once on whitespace into `(first, last)`.
///
/// A single-token name has an empty last part.
#[must_use]
pub fn split_name(name: &str) -> (&str, &str) {
    let name = name.trim();
    match name.split_once(char::is_whitespace) {
        Some((first, last)) => (first, last.trim()),
        None => (name, ""),
    }
}

/// Quality of one band's fill ratio `actual / target`.
///
/// Linear up to the target, then decays so that overshooting is never better
/// than hitting the target exactly.
#[must_use]
pub fn match_quality(ratio: f64) -> f64 {
    if ratio <= 1.0 {
        ratio.max(0.0)
    } else {
        (-(ratio - 1.0)).exp()
    }
}

/// Scores how well a multiset of bands matches `target`.
///
/// Depends only on the band counts, never on their order.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn distribution_score<I>(bands: I, target: &BandDistribution) -> f64
where
    I: IntoIterator<Item = SimilarityBand>,
{
    let mut counts = [0_usize; 4];
    for band in bands {
        counts[band_index(band)] += 1;
    }
    let total = counts.iter().sum::<usize>();
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;

    let mut score = 0.0;
    for band in SimilarityBand::TARGETED {
        let fraction = target.fraction(band);
        if fraction <= 0.0 {
            continue;
        }
        let actual = counts[band_index(band)] as f64 / n;
        score += fraction * match_quality(actual / fraction);
    }
    let unmatched = counts[band_index(SimilarityBand::Unmatched)] as f64 / n;
    score -= UNMATCHED_PENALTY * unmatched;

    let score = score.clamp(0.0, 1.0);
    if score < LOW_SCORE_THRESHOLD {
        score * LOW_SCORE_FACTOR
    } else {
        score
    }
}

fn band_index(band: SimilarityBand) -> usize {
    match band {
        SimilarityBand::Unmatched => 0,
        SimilarityBand::Far => 1,
        SimilarityBand::Medium => 2,
        SimilarityBand::Light => 3,
    }
}

/// Distribution match of one name part on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartSimilarity {
    pub phonetic: f64,
    pub orthographic: f64,
}

impl PartSimilarity {
    /// Mean of both axes.
    #[must_use]
    pub fn score(&self) -> f64 {
        f64::midpoint(self.phonetic, self.orthographic)
    }

    /// Bands every variant part against `original` and matches both distributions.
    #[must_use]
    pub fn evaluate(original: &str, variants: &[&str], spec: &ScoringSpec) -> Self {
        // weights depend only on the original, derive once
        let weights = derive_algorithm_weights(original);
        let phonetic_bands = variants
            .iter()
            .map(|v| SimilarityBand::from_score(weights.score(original, v)));
        let orthographic_bands = variants
            .iter()
            .map(|v| SimilarityBand::from_score(orthographic_score(original, v)));
        Self {
            phonetic: distribution_score(phonetic_bands, &spec.phonetic_distribution),
            orthographic: distribution_score(orthographic_bands, &spec.orthographic_distribution),
        }
    }
}
