//! UK postcode normalization.
//!
//! Directory submissions arrive with every spacing and casing variant
//! ("sw1a1aa", "LE14  3QF", "le14 3qf"). Normalizing to the canonical
//! `OUTWARD INWARD` form at ingestion means postcodes compare, index and
//! display consistently everywhere downstream.

use std::sync::LazyLock;

use regex::Regex;

/// Full UK postcode: outward code (area and district) followed by inward
/// code (sector and unit).
static POSTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{1,2}\d[A-Z\d]?)(\d[A-Z]{2})$").expect("valid regex"));

/// Normalizes a postcode to canonical `OUTWARD INWARD` form.
///
/// Whitespace is stripped and the value uppercased before matching. When
/// the strict pattern does not match, falls back to inserting the space
/// before the final three characters; values too short for that rule
/// pass through cleaned but otherwise untouched. Blank input yields
/// `None`.
#[must_use]
pub fn normalize(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(captures) = POSTCODE_RE.captures(&cleaned) {
        return Some(format!("{} {}", &captures[1], &captures[2]));
    }

    if cleaned.len() >= 5 && cleaned.is_ascii() {
        let (outward, inward) = cleaned.split_at(cleaned.len() - 3);
        return Some(format!("{outward} {inward}"));
    }

    Some(cleaned)
}
