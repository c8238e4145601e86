//! City-in-country lookup used by region extraction.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Read,
};

use serde::Deserialize;

use crate::region::{normalize_country, normalize_place};

pub trait Gazetteer: Send + Sync {
    /// Whether `city` is a known city of `country`. Both are normalized.
    fn is_city(&self, city: &str, country: &str) -> bool;
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum GazetteerError {
    #[display("failed to read gazetteer: {_0}")]
    Json(serde_json::Error),
    #[display("gazetteer contains an empty country name")]
    #[from(ignore)]
    EmptyCountry,
}

const BUILTIN: &[(&str, &[&str])] = &[
    (
        "example country",
        &["springfield", "riverton", "lakeside", "fairview", "oakdale"],
    ),
    (
        "united states",
        &[
            "new york",
            "los angeles",
            "chicago",
            "houston",
            "phoenix",
            "philadelphia",
            "san francisco",
            "seattle",
            "boston",
            "springfield",
        ],
    ),
    (
        "united kingdom",
        &["london", "manchester", "birmingham", "leeds", "glasgow", "edinburgh"],
    ),
    ("germany", &["berlin", "hamburg", "munich", "cologne", "frankfurt"]),
    ("france", &["paris", "lyon", "marseille", "toulouse", "nice"]),
    ("spain", &["madrid", "barcelona", "valencia", "seville"]),
    ("italy", &["rome", "milan", "naples", "turin", "florence"]),
    ("netherlands", &["amsterdam", "rotterdam", "utrecht", "the hague"]),
    ("russia", &["moscow", "saint petersburg", "novosibirsk", "kazan"]),
    ("greece", &["athens", "thessaloniki", "patras"]),
    ("japan", &["tokyo", "osaka", "kyoto", "yokohama"]),
    ("china", &["beijing", "shanghai", "guangzhou", "shenzhen"]),
    ("korea", &["seoul", "busan", "incheon"]),
    ("united arab emirates", &["dubai", "abu dhabi", "sharjah"]),
];

/// In-memory gazetteer: normalized country → normalized city names.
///
/// Deserializes from a JSON object such as
/// `{"Example Country": ["Springfield", "Riverton"]}`; names are normalized on
/// load.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, BTreeSet<String>>")]
pub struct StaticGazetteer {
    cities: BTreeMap<String, BTreeSet<String>>,
}

impl From<BTreeMap<String, BTreeSet<String>>> for StaticGazetteer {
    fn from(raw: BTreeMap<String, BTreeSet<String>>) -> Self {
        let mut gazetteer = Self::default();
        for (country, cities) in raw {
            gazetteer.extend(&country, cities.iter().map(String::as_str));
        }
        gazetteer
    }
}

impl StaticGazetteer {
    /// A small built-in table covering common countries.
    #[must_use]
    pub fn builtin() -> Self {
        let mut gazetteer = Self::default();
        for (country, cities) in BUILTIN {
            gazetteer.extend(country, cities.iter().copied());
        }
        gazetteer
    }

    pub fn from_reader<R>(reader: R) -> Result<Self, GazetteerError>
    where
        R: Read,
    {
        let gazetteer: Self = serde_json::from_reader(reader)?;
        if gazetteer.cities.contains_key("") {
            return Err(GazetteerError::EmptyCountry);
        }
        Ok(gazetteer)
    }

    pub fn extend<'a, I>(&mut self, country: &str, cities: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.cities
            .entry(normalize_country(country))
            .or_default()
            .extend(cities.into_iter().map(normalize_place));
    }
}

impl Gazetteer for StaticGazetteer {
    fn is_city(&self, city: &str, country: &str) -> bool {
        self.cities
            .get(country)
            .is_some_and(|cities| cities.contains(city))
    }
}
