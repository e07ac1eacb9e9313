#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Full-text search over farm listings, backed by an in-memory tantivy
//! index.
//!
//! # Architecture
//!
//! * **Index time** ([`FarmSearchIndex::build`]): active farm records are
//!   indexed with their name, description, county and postcode. Inactive
//!   records are never indexed, so search can never surface a hidden
//!   listing.
//! * **Query time** ([`TextSearch::search`]): the raw input is normalized
//!   ([`normalize`]), compiled into a cascading relevance query
//!   ([`query`]) and executed on a blocking thread. Raw scores are
//!   rescaled so the best hit of each batch scores `1.0`, which keeps
//!   relevance comparable across queries when it is blended with
//!   proximity downstream.

pub mod normalize;
pub mod query;
pub mod schema;

use async_trait::async_trait;
use farm_map_farm_models::FarmRecord;
use tantivy::collector::TopDocs;
use tantivy::schema::Value;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, doc};
use thiserror::Error;

use crate::schema::FarmFields;

/// Heap given to the tantivy writer while building the index.
const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The underlying tantivy index failed.
    #[error(transparent)]
    Index(#[from] tantivy::TantivyError),
    /// The blocking search task was cancelled or panicked.
    #[error("Search task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    /// The search backend is temporarily unreachable.
    #[error("Search unavailable: {reason}")]
    Unavailable { reason: String },
}

/// A single text-search result.
///
/// `score` is normalized per result batch: the best hit scores `1.0` and
/// every other hit is scaled relative to it, so scores stay in `(0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
}

/// Free-text lookup over farm listings.
#[async_trait]
pub trait TextSearch: Send + Sync {
    /// Searches for farms matching the free-text `query`, best first.
    ///
    /// Returns at most `limit` hits, ordered by descending score with ties
    /// broken by id. An empty or punctuation-only query yields no hits.
    ///
    /// # Errors
    ///
    /// * If the search backend fails or is unavailable
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// In-memory tantivy index over the active farm listings.
///
/// Built once at startup from the ingested snapshot; rebuilding replaces
/// the whole index.
pub struct FarmSearchIndex {
    reader: IndexReader,
    fields: FarmFields,
}

impl FarmSearchIndex {
    /// Builds the index from a snapshot of farm records.
    ///
    /// Only records whose status is queryable are indexed. Optional fields
    /// (description, county, postcode) are indexed as empty strings when
    /// absent, which makes them unmatchable without special-casing.
    ///
    /// # Errors
    ///
    /// * If the tantivy writer cannot be created or a commit fails
    pub fn build(records: &[FarmRecord]) -> Result<Self, SearchError> {
        let schema = schema::build_schema();
        let index = Index::create_in_ram(schema.clone());
        schema::register_tokenizers(&index);

        let fields = FarmFields::from_schema(&schema);
        let mut writer: IndexWriter = index.writer(WRITER_HEAP_BYTES)?;

        let mut indexed: u64 = 0;
        for record in records {
            if !record.status.is_queryable() {
                continue;
            }
            writer.add_document(doc!(
                fields.id => record.id.as_str(),
                fields.name => record.name.as_str(),
                fields.description => record.description.as_deref().unwrap_or(""),
                fields.county => record.location.county.as_deref().unwrap_or(""),
                fields.postcode => record.location.postcode.as_deref().unwrap_or(""),
            ))?;
            indexed += 1;
        }
        writer.commit()?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        log::info!("Built search index over {indexed} active farm listings");

        Ok(Self { reader, fields })
    }

    /// Number of indexed listings.
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

#[async_trait]
impl TextSearch for FarmSearchIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let reader = self.reader.clone();
        let fields = self.fields.clone();
        let query = query.to_string();

        tokio::task::spawn_blocking(move || search_blocking(&reader, &fields, &query, limit))
            .await?
    }
}

/// Runs a search synchronously. Called from a blocking task.
fn search_blocking(
    reader: &IndexReader,
    fields: &FarmFields,
    raw_query: &str,
    limit: usize,
) -> Result<Vec<SearchHit>, SearchError> {
    let normalized = normalize::normalize_query(raw_query);
    if normalized.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let searcher = reader.searcher();
    let query = query::build_discovery_query(fields, &normalized);
    let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

    let mut raw_hits: Vec<(String, f32)> = Vec::with_capacity(top_docs.len());
    let mut max_score = 0.0_f32;
    for (score, doc_address) in &top_docs {
        let doc: TantivyDocument = searcher.doc(*doc_address)?;
        let Some(id) = doc.get_first(fields.id).and_then(|value| value.as_str()) else {
            log::warn!("Search hit without a stored id, skipping");
            continue;
        };
        max_score = max_score.max(*score);
        raw_hits.push((id.to_string(), *score));
    }

    let mut hits: Vec<SearchHit> = raw_hits
        .into_iter()
        .map(|(id, score)| SearchHit {
            id,
            score: if max_score > 0.0 {
                f64::from(score / max_score)
            } else {
                0.0
            },
        })
        .collect();

    hits.sort_unstable_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));

    Ok(hits)
}

/// [`TextSearch`] implementation that serves a fixed hit list.
///
/// Used where a real index is unwanted: tests, and deployments that run
/// with text search disabled.
pub struct StaticTextSearch {
    hits: Vec<SearchHit>,
}

impl StaticTextSearch {
    #[must_use]
    pub const fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }
}

#[async_trait]
impl TextSearch for StaticTextSearch {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use farm_map_farm_models::{FarmLocation, FarmStatus};

    use super::*;

    fn record(
        id: &str,
        name: &str,
        description: Option<&str>,
        county: Option<&str>,
        postcode: Option<&str>,
    ) -> FarmRecord {
        FarmRecord {
            id: id.to_string(),
            name: name.to_string(),
            description: description.map(ToString::to_string),
            location: FarmLocation {
                lat: 52.0,
                lng: -1.0,
                postcode: postcode.map(ToString::to_string),
                county: county.map(ToString::to_string),
            },
            contact: None,
            status: FarmStatus::Active,
            verified: false,
            featured: false,
            updated_at: None,
        }
    }

    fn sample_records() -> Vec<FarmRecord> {
        vec![
            record(
                "farm-a",
                "Brockleby Hill Farm Shop",
                Some("Raw milk vending and a butchery counter."),
                Some("Leicestershire"),
                Some("LE14 3QF"),
            ),
            record(
                "farm-b",
                "Greendale Organics",
                Some("Organic vegetable boxes and free range eggs."),
                Some("Cheshire"),
                Some("CW5 8AB"),
            ),
            record(
                "farm-c",
                "Hill Top Dairy",
                Some("Farmhouse cheese made on site."),
                Some("Yorkshire"),
                None,
            ),
        ]
    }

    #[tokio::test]
    async fn finds_farm_by_exact_name() {
        let index = FarmSearchIndex::build(&sample_records()).unwrap();

        let hits = index.search("Brockleby Hill Farm Shop", 10).await.unwrap();

        assert_eq!(hits.first().map(|h| h.id.as_str()), Some("farm-a"));
    }

    #[tokio::test]
    async fn typo_in_name_still_matches() {
        let index = FarmSearchIndex::build(&sample_records()).unwrap();

        let hits = index.search("brockelby hill", 10).await.unwrap();

        assert!(hits.iter().any(|h| h.id == "farm-a"));
    }

    #[tokio::test]
    async fn description_terms_match() {
        let index = FarmSearchIndex::build(&sample_records()).unwrap();

        let hits = index.search("raw milk", 10).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "farm-a");
    }

    #[tokio::test]
    async fn county_matches() {
        let index = FarmSearchIndex::build(&sample_records()).unwrap();

        let hits = index.search("cheshire", 10).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "farm-b");
    }

    #[tokio::test]
    async fn postcode_outward_code_matches() {
        let index = FarmSearchIndex::build(&sample_records()).unwrap();

        let hits = index.search("LE14", 10).await.unwrap();

        assert_eq!(hits.first().map(|h| h.id.as_str()), Some("farm-a"));
    }

    #[tokio::test]
    async fn scores_are_normalized_to_unit_range() {
        let index = FarmSearchIndex::build(&sample_records()).unwrap();

        let hits = index.search("hill", 10).await.unwrap();

        assert!(hits.len() >= 2, "both hill farms should match");
        assert!((hits[0].score - 1.0).abs() < f64::EPSILON);
        for hit in &hits {
            assert!(hit.score > 0.0 && hit.score <= 1.0, "score out of range: {hit:?}");
        }
    }

    #[tokio::test]
    async fn limit_is_respected() {
        let index = FarmSearchIndex::build(&sample_records()).unwrap();

        let hits = index.search("farm", 1).await.unwrap();

        assert!(hits.len() <= 1);
    }

    #[tokio::test]
    async fn inactive_records_are_not_indexed() {
        let mut records = sample_records();
        records[0].status = FarmStatus::Suspended;
        let index = FarmSearchIndex::build(&records).unwrap();

        let hits = index.search("brockleby", 10).await.unwrap();

        assert!(hits.is_empty());
        assert_eq!(index.num_docs(), 2);
    }

    #[tokio::test]
    async fn empty_query_returns_nothing() {
        let index = FarmSearchIndex::build(&sample_records()).unwrap();

        assert!(index.search("", 10).await.unwrap().is_empty());
        assert!(index.search("  !?  ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn static_search_truncates_to_limit() {
        let search = StaticTextSearch::new(vec![
            SearchHit { id: "farm-a".to_string(), score: 1.0 },
            SearchHit { id: "farm-b".to_string(), score: 0.5 },
        ]);

        let hits = search.search("anything", 1).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "farm-a");
    }
}
