use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ScoringSpec;

/// Writing system of a seed identity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    #[default]
    Latin,
    Cyrillic,
    Greek,
    Arabic,
    Cjk,
    Other,
}

/// An identity handed out by the coordinator; workers produce variations of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedIdentity {
    pub name: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    /// Free-form, may be a bare country or `City, Country`.
    pub address: String,
    #[serde(default)]
    pub script: Script,
}

impl SeedIdentity {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        date_of_birth: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            date_of_birth: date_of_birth.into(),
            address: address.into(),
            script: Script::Latin,
        }
    }
}

/// One candidate `(name, dob, address)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variation {
    pub name: String,
    pub dob: String,
    pub address: String,
}

impl Variation {
    #[must_use]
    pub fn new(name: impl Into<String>, dob: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dob: dob.into(),
            address: address.into(),
        }
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A worker's answer: seed name → ordered variations.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Submission {
    variations: BTreeMap<String, Vec<Variation>>,
}

impl Submission {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the variations submitted for `seed_name`.
    pub fn insert(&mut self, seed_name: impl Into<String>, variations: Vec<Variation>) {
        self.variations.insert(seed_name.into(), variations);
    }

    /// Variations for a seed; missing seeds read as an empty list.
    #[must_use]
    pub fn variations_for(&self, seed_name: &str) -> &[Variation] {
        self.variations
            .get(seed_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether the seed was answered with at least one variation.
    #[must_use]
    pub fn answers(&self, seed_name: &str) -> bool {
        !self.variations_for(seed_name).is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Variation])> {
        self.variations
            .iter()
            .map(|(name, vars)| (name.as_str(), vars.as_slice()))
    }
}

impl FromIterator<(String, Vec<Variation>)> for Submission {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Variation>)>>(iter: I) -> Self {
        Self {
            variations: iter.into_iter().collect(),
        }
    }
}

/// The complete input surface of one grading round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub seeds: Vec<SeedIdentity>,
    pub spec: ScoringSpec,
    pub submissions: BTreeMap<WorkerId, Submission>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_seed_reads_as_empty() {
        let submission = Submission::new();
        assert!(submission.variations_for("John Smith").is_empty());
        assert!(!submission.answers("John Smith"));
    }

    #[test]
    fn test_submission_is_a_plain_json_map() {
        let mut submission = Submission::new();
        submission.insert(
            "John Smith",
            vec![Variation::new("Jon Smith", "1990-06-14", "Example Country")],
        );
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["John Smith"][0]["name"], "Jon Smith");

        let back: Submission = serde_json::from_value(json).unwrap();
        assert_eq!(back, submission);
    }

    #[test]
    fn test_seed_script_defaults_to_latin() {
        let seed: SeedIdentity = serde_json::from_str(
            r#"{"name":"John Smith","date_of_birth":"1990-06-15","address":"Example Country"}"#,
        )
        .unwrap();
        assert_eq!(seed.script, Script::Latin);
    }
}
