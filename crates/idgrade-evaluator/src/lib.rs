//! Per-worker scoring of identity variations.
//!
//! Everything in this crate is a pure function of a worker's submission, the
//! round's seed identities and its [`ScoringSpec`](idgrade_core::ScoringSpec).
//! Address plausibility lives in `idgrade-address` because it talks to an
//! external collaborator; its result is passed in as a plain score.
//!
//! # Architecture
//!
//! ```text
//! Reward Aggregation ([`reward`])
//!     ↓ uses
//! Name Quality ([`name_quality`])  +  DOB Coverage ([`dob`])
//!     ↓ uses
//! Similarity ([`similarity`], [`phonetic`])  +  Rule Compliance ([`rule`])
//! ```
//!
//! # Design Principles
//!
//! ## Distributions, Not Closeness
//!
//! Individual variation scores are reduced to a [`SimilarityBand`](idgrade_core::SimilarityBand)
//! and only the band counts are compared against the requested distribution.
//! Submitting nine near-copies of the original is therefore scored *lower*
//! than a spread of light, medium and far variations.
//!
//! ## Reproducibility
//!
//! Phonetic algorithm weights are derived from a versioned hash of the
//! original string ([`phonetic::derive_algorithm_weights`]). No random state
//! is involved, so the same submission always gets the same breakdown, no
//! matter how scoring is scheduled across threads.
//!
//! ## Explainability
//!
//! Intermediate results ([`name_quality::NameQuality`], [`rule::RuleScore`],
//! [`dob::DobCoverage`]) keep their components so that a score can be traced
//! back to the variations that produced it.

pub mod dob;
pub mod name_quality;
pub mod phonetic;
pub mod reward;
pub mod rule;
pub mod similarity;
