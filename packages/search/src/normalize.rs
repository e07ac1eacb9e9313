//! Query text normalization.
//!
//! Queries pass through a deterministic pipeline before terms are built:
//! lowercase, strip punctuation, collapse whitespace. The index side needs
//! no mirror step because the registered tokenizer already splits on
//! non-alphanumeric characters and lowercases, so "Brockleby-Hill Farm"
//! in a document and "brockleby hill farm" in a query meet on the same
//! terms.

use std::sync::LazyLock;

use regex::Regex;

/// Punctuation that never contributes to a match.
static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,#'&/!?\\\-]+").expect("valid regex"));

/// Collapses runs of whitespace into a single space.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

/// Normalizes a free-text query.
///
/// Returns an empty string for queries with no searchable content.
#[must_use]
pub fn normalize_query(input: &str) -> String {
    let lower = input.to_lowercase();
    let no_punct = PUNCTUATION_RE.replace_all(&lower, " ");
    WHITESPACE_RE
        .replace_all(&no_punct, " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(normalize_query("Brockleby-Hill Farm!"), "brockleby hill farm");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize_query("raw   milk  vending"), "raw milk vending");
    }

    #[test]
    fn empty_and_punctuation_only_queries_normalize_to_empty() {
        assert_eq!(normalize_query("   "), "");
        assert_eq!(normalize_query("-- , ..."), "");
    }

    #[test]
    fn postcodes_keep_their_shape() {
        assert_eq!(normalize_query("LE14 3QF"), "le14 3qf");
    }
}
