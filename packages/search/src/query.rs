//! Query construction for farm discovery searches.
//!
//! Builds a cascading `DisjunctionMaxQuery` that tries progressively
//! looser matching strategies, so an exact name match always outranks an
//! incidental description hit.

use tantivy::Term;
use tantivy::query::{
    BooleanQuery, BoostQuery, DisjunctionMaxQuery, FuzzyTermQuery, Occur, PhraseQuery, Query,
    TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption};

use crate::schema::FarmFields;

/// Boost for an exact name phrase match.
const NAME_PHRASE_BOOST: f32 = 10.0;

/// Boost for a postcode match ("farms near LE14").
const POSTCODE_BOOST: f32 = 8.0;

/// Boost for all query terms appearing in the name, in any order.
const NAME_TERMS_BOOST: f32 = 7.0;

/// Boost for a fuzzy name match (edit distance 1 per token).
const NAME_FUZZY_BOOST: f32 = 5.0;

/// Boost for a county match.
const COUNTY_BOOST: f32 = 4.0;

/// Boost for query terms appearing in the description.
const DESCRIPTION_BOOST: f32 = 2.0;

/// Builds the discovery query for a normalized free-text input.
///
/// The query is a `DisjunctionMaxQuery` (takes the max-scoring sub-query)
/// over six levels of specificity:
///
/// 1. **Exact phrase** on the name (boost 10.0)
/// 2. **Postcode** terms (boost 8.0)
/// 3. **All terms** in the name, any order (boost 7.0)
/// 4. **Fuzzy** name terms, edit distance 1 (boost 5.0)
/// 5. **County** terms (boost 4.0)
/// 6. **Description** terms (boost 2.0)
#[must_use]
pub fn build_discovery_query(fields: &FarmFields, normalized: &str) -> Box<dyn Query> {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    let mut levels: Vec<Box<dyn Query>> = Vec::with_capacity(6);

    if let Some(q) = phrase_or_term(fields.name, &tokens) {
        levels.push(Box::new(BoostQuery::new(q, NAME_PHRASE_BOOST)));
    }
    if let Some(q) = all_terms(fields.postcode, &tokens) {
        levels.push(Box::new(BoostQuery::new(q, POSTCODE_BOOST)));
    }
    if tokens.len() > 1
        && let Some(q) = all_terms(fields.name, &tokens)
    {
        levels.push(Box::new(BoostQuery::new(q, NAME_TERMS_BOOST)));
    }
    if let Some(q) = fuzzy_terms(fields.name, &tokens) {
        levels.push(Box::new(BoostQuery::new(q, NAME_FUZZY_BOOST)));
    }
    if let Some(q) = all_terms(fields.county, &tokens) {
        levels.push(Box::new(BoostQuery::new(q, COUNTY_BOOST)));
    }
    if let Some(q) = all_terms(fields.description, &tokens) {
        levels.push(Box::new(BoostQuery::new(q, DESCRIPTION_BOOST)));
    }

    if levels.is_empty() {
        // Nothing searchable survived normalization; the caller filters
        // this out, but an empty boolean query is a safe no-op.
        return Box::new(BooleanQuery::new(Vec::new()));
    }

    Box::new(DisjunctionMaxQuery::new(levels))
}

/// Phrase query over the tokens, degrading to a term query for a single
/// token (phrase queries need at least two terms).
fn phrase_or_term(field: Field, tokens: &[&str]) -> Option<Box<dyn Query>> {
    match tokens {
        [] => None,
        [only] => Some(Box::new(TermQuery::new(
            Term::from_field_text(field, only),
            IndexRecordOption::WithFreqsAndPositions,
        ))),
        _ => {
            let terms: Vec<(usize, Term)> = tokens
                .iter()
                .enumerate()
                .map(|(i, t)| (i, Term::from_field_text(field, t)))
                .collect();
            Some(Box::new(PhraseQuery::new_with_offset(terms)))
        }
    }
}

/// Every token must appear in the field, in any order.
fn all_terms(field: Field, tokens: &[&str]) -> Option<Box<dyn Query>> {
    if tokens.is_empty() {
        return None;
    }

    let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
        .iter()
        .map(|t| {
            let term = TermQuery::new(
                Term::from_field_text(field, t),
                IndexRecordOption::Basic,
            );
            (Occur::Must, Box::new(term) as Box<dyn Query>)
        })
        .collect();

    Some(Box::new(BooleanQuery::new(clauses)))
}

/// Every token must fuzzily appear in the field (edit distance 1, with
/// transpositions counting as one edit).
fn fuzzy_terms(field: Field, tokens: &[&str]) -> Option<Box<dyn Query>> {
    if tokens.is_empty() {
        return None;
    }

    let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
        .iter()
        .map(|t| {
            let fuzzy = FuzzyTermQuery::new(Term::from_field_text(field, t), 1, true);
            (Occur::Must, Box::new(fuzzy) as Box<dyn Query>)
        })
        .collect();

    Some(Box::new(BooleanQuery::new(clauses)))
}
