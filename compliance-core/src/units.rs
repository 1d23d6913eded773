//! Ordering of unit (facility) names.
//!
//! Territorial delegacies are named `<N>ª DT ...` and list by their number;
//! every other name follows them in pt-BR collation order.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text::strip_diacritics;

static NUMBERED_UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s*[ªº°]\s*DT\b").expect("valid numbered unit regex")
});

/// Number of a `<N>ª DT` unit. Anchored at the start, so
/// `"DRFRV - Feira de Santana"` or `"Sede 1ª DT"` is not numbered.
pub fn unit_number(name: &str) -> Option<u32> {
    NUMBERED_UNIT_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Locale-aware comparison approximating pt-BR collation.
///
/// Base letters decide first (accents and case ignored), then accents
/// (unaccented first), then case (lowercase first). Remaining ties fall back
/// to code points so only identical strings compare equal.
pub fn collate(a: &str, b: &str) -> Ordering {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();

    strip_diacritics(&a_lower)
        .cmp(&strip_diacritics(&b_lower))
        .then_with(|| a_lower.cmp(&b_lower))
        .then_with(|| {
            let a_case = a.chars().map(char::is_uppercase);
            let b_case = b.chars().map(char::is_uppercase);
            a_case.cmp(b_case)
        })
        .then_with(|| a.cmp(b))
}

/// Numbered units by number, then everything else by [`collate`].
pub fn compare_units(a: &str, b: &str) -> Ordering {
    match (unit_number(a), unit_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| collate(a, b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => collate(a, b),
    }
}

/// Sorts unit names with [`compare_units`]; equal names keep their order.
pub fn sort_units<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut sorted: Vec<String> = names.into_iter().map(Into::into).collect();
    sorted.sort_by(|a, b| compare_units(a, b));
    sorted
}

/// Unit name ordered by [`compare_units`], for use as a grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitKey(pub String);

impl UnitKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for UnitKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_units(&self.0, &other.0)
    }
}

impl PartialOrd for UnitKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitKey {
    fn from(value: &str) -> Self {
        UnitKey(value.to_string())
    }
}
