//! Date-of-birth coverage.
//!
//! Workers are expected to spread DOB variations over distinct distance rings
//! around the seed date rather than submit many near-identical dates. Coverage
//! is the fraction of the six buckets hit by at least one variation.

use std::collections::BTreeSet;

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DobBucket {
    /// 1 day away.
    WithinDay,
    /// 2–3 days away.
    WithinThreeDays,
    /// 4–30 days away.
    WithinMonth,
    /// 31–90 days away.
    WithinQuarter,
    /// 91–365 days away.
    WithinYear,
    /// `YYYY-MM` with the seed's year and month.
    YearMonthOnly,
}

impl DobBucket {
    pub const ALL: [Self; 6] = [
        Self::WithinDay,
        Self::WithinThreeDays,
        Self::WithinMonth,
        Self::WithinQuarter,
        Self::WithinYear,
        Self::YearMonthOnly,
    ];

    /// Ring for an absolute day distance; `None` for 0 or beyond a year.
    #[must_use]
    pub fn from_distance(days: u64) -> Option<Self> {
        match days {
            1 => Some(Self::WithinDay),
            2..=3 => Some(Self::WithinThreeDays),
            4..=30 => Some(Self::WithinMonth),
            31..=90 => Some(Self::WithinQuarter),
            91..=365 => Some(Self::WithinYear),
            _ => None,
        }
    }

    /// Bucket covered by `variant`, relative to `seed`.
    #[must_use]
    pub fn classify(seed: NaiveDate, variant: &str) -> Option<Self> {
        let variant = variant.trim();
        if let Ok(date) = NaiveDate::parse_from_str(variant, DATE_FORMAT) {
            return Self::from_distance((date - seed).num_days().unsigned_abs());
        }
        let (year, month) = parse_year_month(variant)?;
        (year == seed.year() && month == seed.month()).then_some(Self::YearMonthOnly)
    }
}

fn parse_year_month(s: &str) -> Option<(i32, u32)> {
    let (year, month) = s.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year = year.parse().ok()?;
    let month = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DobCoverage {
    pub covered: BTreeSet<DobBucket>,
    pub score: f64,
}

/// Scores DOB variations against `seed_dob` (`YYYY-MM-DD`).
///
/// Unparsable variants cover nothing; an unparsable seed scores 0.0.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn score_dob<'a, I>(seed_dob: &str, variants: I) -> DobCoverage
where
    I: IntoIterator<Item = &'a str>,
{
    let Ok(seed) = NaiveDate::parse_from_str(seed_dob.trim(), DATE_FORMAT) else {
        tracing::debug!(seed_dob, "unparsable seed date of birth");
        return DobCoverage {
            covered: BTreeSet::new(),
            score: 0.0,
        };
    };
    let covered = variants
        .into_iter()
        .filter_map(|variant| DobBucket::classify(seed, variant))
        .collect::<BTreeSet<_>>();
    let score = covered.len() as f64 / DobBucket::ALL.len() as f64;
    DobCoverage { covered, score }
}
