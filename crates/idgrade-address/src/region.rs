//! Country/city extraction and region matching.
//!
//! The same [`extract_region`] is applied to the candidate address and to the
//! seed's address, so both sides are normalized identically. Seeds frequently
//! carry only a country (`"Example Country"`) or a city and a country
//! (`"Springfield, Example Country"`); candidates are full street addresses.

use serde::{Deserialize, Serialize};

use crate::gazetteer::Gazetteer;

const COUNTRY_SYNONYMS: &[(&str, &str)] = &[
    ("us", "united states"),
    ("usa", "united states"),
    ("u s", "united states"),
    ("u s a", "united states"),
    ("united states of america", "united states"),
    ("america", "united states"),
    ("uk", "united kingdom"),
    ("u k", "united kingdom"),
    ("great britain", "united kingdom"),
    ("britain", "united kingdom"),
    ("uae", "united arab emirates"),
    ("deutschland", "germany"),
    ("espana", "spain"),
    ("españa", "spain"),
    ("italia", "italy"),
    ("nederland", "netherlands"),
    ("the netherlands", "netherlands"),
    ("holland", "netherlands"),
    ("russian federation", "russia"),
    ("россия", "russia"),
    ("ελλάδα", "greece"),
    ("hellas", "greece"),
    ("nippon", "japan"),
    ("prc", "china"),
    ("people's republic of china", "china"),
    ("south korea", "korea"),
    ("republic of korea", "korea"),
];

/// Lower-cases, drops periods and collapses whitespace.
#[must_use]
pub fn normalize_place(s: &str) -> String {
    s.to_lowercase()
        .replace('.', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes a country name, drops any postal code and resolves common
/// synonyms.
#[must_use]
pub fn normalize_country(s: &str) -> String {
    let place = without_digits(s);
    COUNTRY_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == place)
        .map_or(place, |(_, canonical)| (*canonical).to_owned())
}

/// A place name with any digits (postal codes, house numbers) removed.
fn without_digits(segment: &str) -> String {
    let stripped = segment
        .chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>();
    normalize_place(&stripped)
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Extracts the country (last comma segment) and the right-most earlier
/// segment that `gazetteer` confirms as a city of that country.
#[must_use]
pub fn extract_region(address: &str, gazetteer: &dyn Gazetteer) -> Region {
    let segments = address
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    let Some((last, earlier)) = segments.split_last() else {
        return Region::default();
    };
    let country = normalize_country(last);
    let city = earlier
        .iter()
        .rev()
        .map(|segment| without_digits(segment))
        .find(|city| !city.is_empty() && gazetteer.is_city(city, &country));
    Region {
        country: (!country.is_empty()).then_some(country),
        city,
    }
}

/// Whether a candidate region lies in the seed's region.
///
/// True when the countries match, when both carry a city and the cities
/// match, or when a single-segment seed names the candidate's city.
#[must_use]
pub fn region_matches(candidate: &Region, seed: &Region) -> bool {
    if candidate.country.is_some() && candidate.country == seed.country {
        return true;
    }
    if candidate.city.is_some() && candidate.city == seed.city {
        return true;
    }
    seed.city.is_none() && seed.country.is_some() && seed.country == candidate.city
}
