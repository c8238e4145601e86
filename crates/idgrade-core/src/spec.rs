use serde::{Deserialize, Serialize};

use crate::{DistributionAxis, SpecError};

const FRACTION_SUM_TOLERANCE: f64 = 1e-6;

/// Categorical similarity tier.
///
/// Thresholds are fixed and shared by every worker in every round:
///
/// | Band | Score |
/// |---|---|
/// | `Light` | `≥ 0.8` |
/// | `Medium` | `[0.6, 0.8)` |
/// | `Far` | `[0.3, 0.6)` |
/// | `Unmatched` | `< 0.3` |
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityBand {
    Unmatched,
    Far,
    Medium,
    Light,
}

impl SimilarityBand {
    pub const LIGHT_MIN: f64 = 0.8;
    pub const MEDIUM_MIN: f64 = 0.6;
    pub const FAR_MIN: f64 = 0.3;

    /// Bands that a [`BandDistribution`] can target.
    pub const TARGETED: [Self; 3] = [Self::Light, Self::Medium, Self::Far];

    /// Maps a similarity score to its band. Monotonic in `score`.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= Self::LIGHT_MIN {
            Self::Light
        } else if score >= Self::MEDIUM_MIN {
            Self::Medium
        } else if score >= Self::FAR_MIN {
            Self::Far
        } else {
            Self::Unmatched
        }
    }
}

/// Target fractions of variations per band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandDistribution {
    pub light: f64,
    pub medium: f64,
    pub far: f64,
}

impl BandDistribution {
    #[must_use]
    pub const fn new(light: f64, medium: f64, far: f64) -> Self {
        Self { light, medium, far }
    }

    /// Target fraction for `band`; `Unmatched` is never targeted.
    #[must_use]
    pub fn fraction(&self, band: SimilarityBand) -> f64 {
        match band {
            SimilarityBand::Light => self.light,
            SimilarityBand::Medium => self.medium,
            SimilarityBand::Far => self.far,
            SimilarityBand::Unmatched => 0.0,
        }
    }

    fn validate(&self, axis: DistributionAxis) -> Result<(), SpecError> {
        let fractions = [self.light, self.medium, self.far];
        if fractions.iter().any(|f| !f.is_finite() || *f < 0.0) {
            return Err(SpecError::NegativeFraction { axis });
        }
        let sum = fractions.iter().sum::<f64>();
        if (sum - 1.0).abs() > FRACTION_SUM_TOLERANCE {
            return Err(SpecError::DistributionSum { axis, sum });
        }
        Ok(())
    }
}

/// Identifier of a transformation rule a worker may be asked to apply.
///
/// The predicates live in `idgrade-evaluator`; this enum is the closed set of
/// identifiers a [`ScoringSpec`] can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    DeleteLetter,
    InsertLetter,
    ReplaceLetter,
    SwapAdjacentLetters,
    DuplicateLetter,
    RemoveDoubledLetter,
    RemoveSpace,
    ReplaceSpaceWithHyphen,
    PermuteNameTokens,
    InitialFirstName,
    DropMiddleToken,
}

/// Round-wide scoring requirements shared by all workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSpec {
    pub variation_count: u32,
    pub phonetic_distribution: BandDistribution,
    pub orthographic_distribution: BandDistribution,
    #[serde(default)]
    pub rule_set: Vec<RuleId>,
    #[serde(default)]
    pub rule_percentage: f64,
}

impl ScoringSpec {
    /// Rejects specs that cannot be graded against.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.variation_count == 0 {
            return Err(SpecError::NonPositiveVariationCount);
        }
        self.phonetic_distribution
            .validate(DistributionAxis::Phonetic)?;
        self.orthographic_distribution
            .validate(DistributionAxis::Orthographic)?;
        if !(0.0..=1.0).contains(&self.rule_percentage) {
            return Err(SpecError::RulePercentageOutOfRange {
                value: self.rule_percentage,
            });
        }
        Ok(())
    }

    /// Most variations per seed that are scored; anything after them in a
    /// longer list is ignored.
    #[must_use]
    pub fn max_scored_variations(&self) -> usize {
        usize::try_from(self.variation_count)
            .unwrap_or(usize::MAX)
            .saturating_mul(2)
    }
}
