#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Deterministic grid-merge clustering of farm points for map rendering.
//!
//! Clustering runs in two passes. First every farm is bucketed into a
//! global degree grid whose cell size comes from the zoom lookup table in
//! [`zoom`]. Second, adjacent cells whose weighted centroids sit closer
//! than a merge distance derived from the cell size are folded together,
//! which prevents two touching markers straddling a cell boundary from
//! rendering as separate clusters.
//!
//! The output is a partition: every input farm lands in exactly one
//! cluster, and for a fixed input set, zoom, and viewport the result is
//! bit-identical regardless of input order. All internal state is kept in
//! ordered maps and merges always absorb into the smaller cell key, so
//! there is no iteration-order dependence to make markers jump between
//! refreshes.

pub mod zoom;

use std::collections::{BTreeMap, BTreeSet};

use farm_map_farm_models::FarmPoint;
use farm_map_geo::{GeoPoint, KM_PER_DEGREE, coords_valid, equirectangular_km};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use zoom::{CELL_SIZES_BY_ZOOM, MAX_ZOOM, MIN_ZOOM, cell_size_for_zoom, clamp_zoom};

/// Smallest member count that makes a cluster `medium`.
pub const TIER_MEDIUM_MIN: usize = 2;

/// Smallest member count that makes a cluster `large`.
pub const TIER_LARGE_MIN: usize = 10;

/// Smallest member count that makes a cluster `mega`.
pub const TIER_MEGA_MIN: usize = 50;

/// Largest member count for which the full member list is small enough to
/// preview inline, without forcing a zoom.
pub const PREVIEWABLE_MAX_COUNT: usize = 8;

/// Fraction of the cell size used as the adjacent-cell merge distance.
///
/// Points straddling a shared boundary produce centroids a small fraction
/// of a cell apart; points in the middles of adjacent cells are a full
/// cell apart. Half a cell separates the two cases at any latitude.
pub const MERGE_FACTOR: f64 = 0.5;

/// Rendering prominence of a cluster, derived purely from member count.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Tier {
    /// A single farm.
    Small,
    /// 2 to 9 farms.
    Medium,
    /// 10 to 49 farms.
    Large,
    /// 50 or more farms.
    Mega,
}

impl Tier {
    /// Derives the tier from a cluster's member count.
    #[must_use]
    pub const fn from_count(count: usize) -> Self {
        if count >= TIER_MEGA_MIN {
            Self::Mega
        } else if count >= TIER_LARGE_MIN {
            Self::Large
        } else if count >= TIER_MEDIUM_MIN {
            Self::Medium
        } else {
            Self::Small
        }
    }
}

/// One cluster of farms, ready for map rendering.
///
/// Clusters are derived per request and never persisted. The id is built
/// from the zoom level and the anchor grid cell, so the same farms produce
/// the same id when the map pans at a fixed zoom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Stable identifier of the form `z<zoom>:<cell-x>:<cell-y>`.
    pub id: String,
    /// Tier-weight-weighted mean position of the members.
    pub centroid: GeoPoint,
    /// Number of member farms; always equals `member_ids.len()`.
    pub count: usize,
    /// Rendering prominence derived from `count`.
    pub tier: Tier,
    /// `true` when the member list is small enough to show inline.
    pub previewable: bool,
    /// Ids of every member farm.
    pub member_ids: BTreeSet<String>,
}

/// Grid cell coordinates: `(x, y)` = `(floor(lng / size), floor(lat / size))`.
type CellKey = (i64, i64);

/// A farm's position and weight inside a cell bucket.
struct Member {
    lat: f64,
    lng: f64,
    weight: f64,
}

/// Accumulated members of one grid cell (or merged group of cells).
#[derive(Default)]
struct CellBucket {
    members: BTreeMap<String, Member>,
}

impl CellBucket {
    /// Weighted mean position, accumulated in id order so the result does
    /// not depend on insertion order.
    fn centroid(&self) -> GeoPoint {
        let mut weight_sum = 0.0_f64;
        let mut lat_sum = 0.0_f64;
        let mut lng_sum = 0.0_f64;
        for member in self.members.values() {
            weight_sum += member.weight;
            lat_sum = member.weight.mul_add(member.lat, lat_sum);
            lng_sum = member.weight.mul_add(member.lng, lng_sum);
        }

        // Weights are >= 1, so a bucket is never empty here.
        GeoPoint {
            lat: lat_sum / weight_sum,
            lng: lng_sum / weight_sum,
        }
    }
}

/// Partitions the farm set into clusters for the given zoom level.
///
/// Empty input produces an empty output. Farms with out-of-range
/// coordinates are skipped with a warning; upstream validation should have
/// rejected them already.
#[must_use]
pub fn cluster(points: &[FarmPoint], zoom: u8) -> Vec<Cluster> {
    let cell_size_deg = cell_size_for_zoom(zoom);
    let mut cells: BTreeMap<CellKey, CellBucket> = BTreeMap::new();
    let mut skipped_invalid = 0_usize;

    for farm in points {
        if !coords_valid(farm.lat, farm.lng) {
            skipped_invalid += 1;
            continue;
        }
        let key = cell_key(farm.lat, farm.lng, cell_size_deg);
        cells.entry(key).or_default().members.insert(
            farm.id.clone(),
            Member {
                lat: farm.lat,
                lng: farm.lng,
                weight: f64::from(farm.tier_weight),
            },
        );
    }

    if skipped_invalid > 0 {
        log::warn!("Skipped {skipped_invalid} farms with invalid coordinates during clustering");
    }

    merge_adjacent_cells(&mut cells, cell_size_deg);

    cells
        .into_iter()
        .map(|(key, bucket)| {
            let centroid = bucket.centroid();
            let count = bucket.members.len();
            Cluster {
                id: cluster_id(zoom, key),
                centroid,
                count,
                tier: Tier::from_count(count),
                previewable: count <= PREVIEWABLE_MAX_COUNT,
                member_ids: bucket.members.into_keys().collect(),
            }
        })
        .collect()
}

/// Folds adjacent cells together until no pair of neighboring centroids
/// sits within the merge distance.
///
/// Cells are visited in ascending key order and a merge always absorbs the
/// larger key into the smaller one, so the fixpoint is unique for a given
/// cell population.
fn merge_adjacent_cells(cells: &mut BTreeMap<CellKey, CellBucket>, cell_size_deg: f64) {
    let merge_distance_km = cell_size_deg * KM_PER_DEGREE * MERGE_FACTOR;

    loop {
        let mut merged_any = false;
        let keys: Vec<CellKey> = cells.keys().copied().collect();

        for key in keys {
            if !cells.contains_key(&key) {
                // Absorbed earlier in this pass.
                continue;
            }
            for neighbor in neighbors_above(key) {
                let close = match (cells.get(&key), cells.get(&neighbor)) {
                    (Some(anchor), Some(candidate)) => {
                        equirectangular_km(anchor.centroid(), candidate.centroid())
                            <= merge_distance_km
                    }
                    _ => continue,
                };
                if close
                    && let Some(mut absorbed) = cells.remove(&neighbor)
                    && let Some(anchor) = cells.get_mut(&key)
                {
                    anchor.members.append(&mut absorbed.members);
                    merged_any = true;
                }
            }
        }

        if !merged_any {
            return;
        }
    }
}

/// The four grid neighbors whose keys order after `key`.
///
/// Restricting merge checks to these halves the comparisons and guarantees
/// the surviving key of any merge is the smaller one.
const fn neighbors_above(key: CellKey) -> [CellKey; 4] {
    [
        (key.0, key.1 + 1),
        (key.0 + 1, key.1 - 1),
        (key.0 + 1, key.1),
        (key.0 + 1, key.1 + 1),
    ]
}

#[allow(clippy::cast_possible_truncation)]
fn cell_key(lat: f64, lng: f64, cell_size_deg: f64) -> CellKey {
    let x = (lng / cell_size_deg).floor() as i64;
    let y = (lat / cell_size_deg).floor() as i64;
    (x, y)
}

fn cluster_id(zoom: u8, key: CellKey) -> String {
    format!("z{zoom}:{}:{}", key.0, key.1)
}
