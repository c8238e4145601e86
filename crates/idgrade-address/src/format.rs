//! Structural plausibility of a free-form address.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

const MIN_CONTENT_CHARS: usize = 30;
const MAX_CONTENT_CHARS: usize = 300;
const MIN_LETTERS: usize = 20;
const MIN_COMMAS: usize = 2;
const MIN_DISTINCT_CHARS: usize = 5;

const DISALLOWED: &[char] = &[
    '`', '^', '$', '{', '}', '[', ']', '\\', '|', '<', '>', '@', '#', '%', '*', '~', '=',
];

/// Result of [`check_format`], naming the first violated check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum FormatVerdict {
    Valid,
    DisallowedCharacter { ch: char },
    TooShort { content_chars: usize },
    TooLong { content_chars: usize },
    TooFewLetters { letters: usize },
    NoDigit,
    TooFewCommas { commas: usize },
    TooFewDistinctCharacters { distinct: usize },
}

/// Checks an address against the structural rules, in order.
///
/// Checks only shape; whether the place exists is decided by geocoding.
#[must_use]
pub fn check_format(address: &str) -> FormatVerdict {
    if let Some(ch) = address
        .chars()
        .find(|c| c.is_control() || DISALLOWED.contains(c))
    {
        return FormatVerdict::DisallowedCharacter { ch };
    }

    let content_chars = address.chars().filter(|c| !c.is_whitespace()).count();
    if content_chars < MIN_CONTENT_CHARS {
        return FormatVerdict::TooShort { content_chars };
    }
    if content_chars > MAX_CONTENT_CHARS {
        return FormatVerdict::TooLong { content_chars };
    }

    let letters = address.chars().filter(|c| c.is_alphabetic()).count();
    if letters < MIN_LETTERS {
        return FormatVerdict::TooFewLetters { letters };
    }

    if !address
        .split(',')
        .any(|segment| segment.chars().any(|c| c.is_ascii_digit()))
    {
        return FormatVerdict::NoDigit;
    }

    let commas = address.matches(',').count();
    if commas < MIN_COMMAS {
        return FormatVerdict::TooFewCommas { commas };
    }

    let distinct = address
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect::<BTreeSet<_>>()
        .len();
    if distinct < MIN_DISTINCT_CHARS {
        return FormatVerdict::TooFewDistinctCharacters { distinct };
    }

    FormatVerdict::Valid
}
