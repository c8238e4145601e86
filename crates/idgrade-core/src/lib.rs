//! Shared data model for grading identity-variation rounds.
//!
//! Everything that crosses a crate boundary lives here: the round inputs
//! ([`SeedIdentity`], [`Submission`], [`ScoringSpec`]), the per-worker output
//! ([`WorkerScoreBreakdown`]) and the anti-collusion output ([`CollusionSignal`]).
//!
//! The only fallible operation is spec validation ([`ScoringSpec::validate`]);
//! a round with an invalid spec is rejected before any worker is scored.

pub use self::{identity::*, score::*, spec::*};

pub mod identity;
pub mod parallel;
pub mod score;
pub mod spec;
pub mod translit;

/// Axis of a similarity distribution inside a [`ScoringSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum DistributionAxis {
    #[display("phonetic")]
    Phonetic,
    #[display("orthographic")]
    Orthographic,
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum SpecError {
    #[display("variation count must be positive")]
    NonPositiveVariationCount,
    #[display("{axis} distribution fractions sum to {sum}, expected 1.0")]
    DistributionSum { axis: DistributionAxis, sum: f64 },
    #[display("{axis} distribution contains a negative or non-finite fraction")]
    NegativeFraction { axis: DistributionAxis },
    #[display("rule percentage {value} is outside [0, 1]")]
    RulePercentageOutOfRange { value: f64 },
}
