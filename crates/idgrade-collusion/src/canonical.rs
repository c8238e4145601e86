//! Canonical keys for duplicate and collusion comparison.
//!
//! Keys are deliberately lossy: two strings that a human would call "the same
//! answer dressed up differently" should collapse to the same key. They are
//! never shown to users and never used for scoring quality.

use std::collections::BTreeSet;

use idgrade_core::translit::fold_to_latin;

/// Name key: lower-cased, whitespace removed, common digit/symbol substitutions
/// undone (`j0hn 5m1th` → `johnsmith`).
#[must_use]
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(unleet)
        .collect()
}

fn unleet(c: char) -> char {
    match c {
        '0' => 'o',
        '1' => 'l',
        '3' => 'e',
        '4' | '@' => 'a',
        '5' | '$' => 's',
        '7' => 't',
        _ => c,
    }
}

/// Address key: the sorted characters of the address's unique words, after
/// [`fold_to_latin`].
///
/// Reordering words, repeating them, changing case or script all map to the
/// same key.
#[must_use]
pub fn address_key(address: &str) -> String {
    let folded = fold_to_latin(address);
    let words = folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<BTreeSet<_>>();
    let mut chars = words.iter().flat_map(|w| w.chars()).collect::<Vec<_>>();
    chars.sort_unstable();
    chars.into_iter().collect()
}
