//! Blends text-search relevance with geographic proximity.
//!
//! Two independently ordered inputs (distance-ordered spatial hits and
//! relevance-ordered text hits) become one ranking via a weighted sum of
//! a normalized proximity score and the text relevance score. A farm
//! missing from one input scores 0 on that dimension rather than being
//! excluded.

use std::collections::{BTreeMap, BTreeSet};

use farm_map_search::SearchHit;
use farm_map_spatial::NearbyHit;
use serde::{Deserialize, Serialize};

/// Distance at which proximity stops contributing to the blended score.
///
/// A farm at or beyond this distance scores 0 on the proximity dimension
/// no matter how large the query radius was, so a perfect text match
/// 200km away cannot bury mildly relevant farms next door.
pub const PROXIMITY_CUTOFF_KM: f64 = 50.0;

/// Weights for blending text relevance with proximity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub relevance: f64,
    pub proximity: f64,
}

impl Default for RankingWeights {
    /// Slight preference for relevance: 0.6 relevance, 0.4 proximity.
    fn default() -> Self {
        Self {
            relevance: 0.6,
            proximity: 0.4,
        }
    }
}

/// One blended discovery result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub farm_id: String,
    /// Great-circle distance from the query centre, in kilometers.
    pub distance_km: f64,
    /// Normalized text relevance in [0, 1]; 0 when the farm did not match
    /// the text query.
    pub text_score: f64,
    /// 1-based position after blending.
    pub final_rank: usize,
}

/// Normalized closeness: 1 at the query centre, falling linearly to 0 at
/// [`PROXIMITY_CUTOFF_KM`].
#[must_use]
pub fn proximity_score(distance_km: f64) -> f64 {
    1.0 - distance_km.clamp(0.0, PROXIMITY_CUTOFF_KM) / PROXIMITY_CUTOFF_KM
}

struct Scored {
    combined: f64,
    farm_id: String,
    distance_km: f64,
    text_score: f64,
}

/// Merges distance-ordered and relevance-ordered hits into one ranking.
///
/// `text_only` carries text matches that fell outside the radius query,
/// already resolved to farms with their real distances. They are still
/// ranked (with their relevance alone, since they earned no proximity
/// credit) so a strong text match just beyond the radius is not silently
/// dropped. With `must_match_text` the output is restricted to farms
/// present in `text_hits`.
///
/// Ordering is by descending blended score with ties broken by id
/// ascending; `final_rank` is the 1-based position in that order.
#[must_use]
pub fn merge_rankings(
    distance_hits: &[NearbyHit],
    text_hits: &[SearchHit],
    text_only: &[NearbyHit],
    weights: RankingWeights,
    must_match_text: bool,
) -> Vec<RankedResult> {
    let text_scores: BTreeMap<&str, f64> = text_hits
        .iter()
        .map(|hit| (hit.id.as_str(), hit.score))
        .collect();

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut scored: Vec<Scored> = Vec::with_capacity(distance_hits.len() + text_only.len());

    for hit in distance_hits {
        let id = hit.farm.id.as_str();
        if !seen.insert(id) {
            continue;
        }
        if must_match_text && !text_scores.contains_key(id) {
            continue;
        }
        let text_score = text_scores.get(id).copied().unwrap_or(0.0);
        scored.push(Scored {
            combined: weights
                .relevance
                .mul_add(text_score, weights.proximity * proximity_score(hit.distance_km)),
            farm_id: hit.farm.id.clone(),
            distance_km: hit.distance_km,
            text_score,
        });
    }

    for hit in text_only {
        let id = hit.farm.id.as_str();
        if !seen.insert(id) {
            continue;
        }
        let text_score = text_scores.get(id).copied().unwrap_or(0.0);
        // Outside the query radius, so the proximity dimension scores 0.
        scored.push(Scored {
            combined: weights.relevance * text_score,
            farm_id: hit.farm.id.clone(),
            distance_km: hit.distance_km,
            text_score,
        });
    }

    scored.sort_unstable_by(|a, b| {
        b.combined
            .total_cmp(&a.combined)
            .then_with(|| a.farm_id.cmp(&b.farm_id))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(i, entry)| RankedResult {
            farm_id: entry.farm_id,
            distance_km: entry.distance_km,
            text_score: entry.text_score,
            final_rank: i + 1,
        })
        .collect()
}
