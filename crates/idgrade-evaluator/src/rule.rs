//! Transformation-rule compliance.
//!
//! Every [`RuleId`] has two predicates, gathered behind [`TransformationRule`]:
//!
//! - [`applies_to`](TransformationRule::applies_to): whether the rule is
//!   structurally possible for an original at all. A rule that cannot be
//!   applied (for example removing a space from a single-token name) is left
//!   out of the effective set and never penalizes the worker.
//! - [`is_satisfied`](TransformationRule::is_satisfied): whether a variant is
//!   the original with exactly that one transformation applied.
//!
//! Both predicates compare lower-cased text, so case changes alone never count
//! as a transformation.

use std::collections::BTreeSet;

use idgrade_core::{RuleCompliance, RuleId, ScoringSpec};
use serde::{Deserialize, Serialize};

pub trait TransformationRule {
    fn applies_to(&self, original: &str) -> bool;
    fn is_satisfied(&self, original: &str, variant: &str) -> bool;
}

impl TransformationRule for RuleId {
    fn applies_to(&self, original: &str) -> bool {
        let o = lowered(original);
        let letters = o.iter().filter(|c| c.is_alphabetic()).count();
        match self {
            Self::DeleteLetter => letters >= 2,
            Self::InsertLetter => !original.trim().is_empty(),
            Self::ReplaceLetter | Self::DuplicateLetter => letters >= 1,
            Self::SwapAdjacentLetters => o
                .windows(2)
                .any(|w| w[0] != w[1] && w[0].is_alphabetic() && w[1].is_alphabetic()),
            Self::RemoveDoubledLetter => o.windows(2).any(|w| w[0] == w[1] && w[0].is_alphabetic()),
            Self::RemoveSpace | Self::ReplaceSpaceWithHyphen => o.contains(&' '),
            Self::PermuteNameTokens | Self::InitialFirstName => tokens(original).len() >= 2,
            Self::DropMiddleToken => tokens(original).len() >= 3,
        }
    }

    fn is_satisfied(&self, original: &str, variant: &str) -> bool {
        let o = lowered(original);
        let v = lowered(variant);
        match self {
            Self::DeleteLetter => single_removals(&o, &v).any(|i| o[i].is_alphabetic()),
            Self::InsertLetter => single_removals(&v, &o).any(|i| v[i].is_alphabetic()),
            Self::ReplaceLetter => match differing_positions(&o, &v).as_deref() {
                Some(&[i]) => o[i].is_alphabetic() && v[i].is_alphabetic(),
                _ => false,
            },
            Self::SwapAdjacentLetters => match differing_positions(&o, &v).as_deref() {
                Some(&[i, j]) => {
                    j == i + 1 && o[i] == v[j] && o[j] == v[i] && o[i].is_alphabetic() && o[j].is_alphabetic()
                }
                _ => false,
            },
            Self::DuplicateLetter => {
                single_removals(&v, &o).any(|i| v[i].is_alphabetic() && has_equal_neighbor(&v, i))
            }
            Self::RemoveDoubledLetter => {
                single_removals(&o, &v).any(|i| o[i].is_alphabetic() && has_equal_neighbor(&o, i))
            }
            Self::RemoveSpace => single_removals(&o, &v).any(|i| o[i] == ' '),
            Self::ReplaceSpaceWithHyphen => match differing_positions(&o, &v).as_deref() {
                Some(&[i]) => o[i] == ' ' && v[i] == '-',
                _ => false,
            },
            Self::PermuteNameTokens => {
                let (ot, vt) = (tokens(original), tokens(variant));
                if ot.len() < 2 || ot == vt {
                    return false;
                }
                sorted(ot) == sorted(vt)
            }
            Self::InitialFirstName => {
                let (ot, vt) = (tokens(original), tokens(variant));
                if ot.len() < 2 || ot.len() != vt.len() || ot[1..] != vt[1..] {
                    return false;
                }
                let Some(initial) = ot[0].chars().next() else {
                    return false;
                };
                ot[0].chars().count() > 1
                    && (vt[0] == initial.to_string() || vt[0] == format!("{initial}."))
            }
            Self::DropMiddleToken => {
                let (ot, vt) = (tokens(original), tokens(variant));
                ot.len() >= 3 && single_removals(&ot, &vt).any(|i| i > 0 && i + 1 < ot.len())
            }
        }
    }
}

fn lowered(s: &str) -> Vec<char> {
    s.trim().to_lowercase().chars().collect()
}

fn tokens(s: &str) -> Vec<String> {
    s.to_lowercase().split_whitespace().map(str::to_owned).collect()
}

fn sorted(mut tokens: Vec<String>) -> Vec<String> {
    tokens.sort_unstable();
    tokens
}

fn has_equal_neighbor(s: &[char], i: usize) -> bool {
    (i > 0 && s[i - 1] == s[i]) || s.get(i + 1) == Some(&s[i])
}

/// Indices `i` such that removing `longer[i]` yields `shorter`.
fn single_removals<'a, T: PartialEq>(
    longer: &'a [T],
    shorter: &'a [T],
) -> impl Iterator<Item = usize> + 'a {
    let candidates = if longer.len() == shorter.len() + 1 {
        longer.len()
    } else {
        0
    };
    (0..candidates).filter(move |&i| longer[..i] == shorter[..i] && longer[i + 1..] == shorter[i..])
}

/// Positions where two equal-length sequences differ, `None` when lengths differ.
fn differing_positions(a: &[char], b: &[char]) -> Option<Vec<usize>> {
    (a.len() == b.len()).then(|| {
        a.iter()
            .zip(b)
            .enumerate()
            .filter(|(_, (x, y))| x != y)
            .map(|(i, _)| i)
            .collect()
    })
}

/// Quantity part of the rule score.
///
/// With `r = actual / expected`: `r` up to the target, 1.0 up to twice the
/// target, then decaying towards a floor of 0.5.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn quantity_score(actual: usize, expected: usize) -> f64 {
    let ratio = actual as f64 / expected.max(1) as f64;
    if ratio <= 1.0 {
        ratio
    } else if ratio <= 2.0 {
        1.0
    } else {
        0.5 + 0.5 * (-(ratio - 2.0)).exp()
    }
}

/// Number of rule-compliant variations the scoring spec asks for, at least one.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "non-negative and far below usize::MAX"
)]
#[must_use]
pub fn expected_compliant(spec: &ScoringSpec) -> usize {
    let expected = (f64::from(spec.variation_count) * spec.rule_percentage).round();
    (expected as usize).max(1)
}

/// Rule-compliance breakdown for one seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleScore {
    pub effective: Vec<RuleId>,
    /// Effective rules satisfied by at least one variation.
    pub satisfied: BTreeSet<RuleId>,
    pub per_variation: Vec<RuleCompliance>,
    pub compliant_count: usize,
    pub expected_count: usize,
    pub quantity: f64,
    pub diversity: f64,
    pub score: f64,
}

/// Scores how well `variants` follow the scoring spec's rule set for `original`.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn score_rules(original: &str, variants: &[&str], spec: &ScoringSpec) -> RuleScore {
    let mut effective = spec
        .rule_set
        .iter()
        .copied()
        .filter(|rule| rule.applies_to(original))
        .collect::<Vec<_>>();
    effective.sort_unstable();
    effective.dedup();

    let per_variation = variants
        .iter()
        .map(|variant| RuleCompliance {
            satisfied: effective
                .iter()
                .copied()
                .filter(|rule| rule.is_satisfied(original, variant))
                .collect(),
        })
        .collect::<Vec<_>>();

    let satisfied = per_variation
        .iter()
        .flat_map(|c| c.satisfied.iter().copied())
        .collect::<BTreeSet<_>>();
    let compliant_count = per_variation.iter().filter(|c| c.is_compliant()).count();
    let expected_count = expected_compliant(spec);

    let (quantity, diversity, score) = if effective.is_empty() {
        (1.0, 1.0, 1.0)
    } else {
        let quantity = quantity_score(compliant_count, expected_count);
        let diversity = satisfied.len() as f64 / effective.len() as f64;
        (quantity, diversity, quantity * diversity)
    };

    RuleScore {
        effective,
        satisfied,
        per_variation,
        compliant_count,
        expected_count,
        quantity,
        diversity,
        score,
    }
}
