#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index over the active farm set.
//!
//! Builds an R-tree over every queryable farm at ingest time and answers
//! the radius, viewport, and nearest-farm query shapes with explicit
//! ordering and limits. The index is immutable once built; [`SharedFarmIndex`]
//! provides swap-a-pointer replacement so readers never block on a rebuild
//! beyond the lock handoff.
//!
//! Envelope lookups against the tree only narrow the candidate set; every
//! result is confirmed with an exact great-circle distance check, so the
//! degree-space envelope math can stay coarse.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use farm_map_farm_models::FarmPoint;
use farm_map_geo::{GeoError, GeoPoint, Viewport, haversine_km, radius_envelope, within_radius};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

/// Hard cap on `in_bounds` results, bounding response size for dense
/// viewports. When more farms fall inside the viewport, higher-tier
/// listings win deterministically.
pub const IN_BOUNDS_CAP: usize = 500;

/// Starting search radius for [`FarmStore::nearest`], in kilometers.
const NEAREST_SEED_RADIUS_KM: f64 = 10.0;

/// Growth factor applied each time a nearest-farm pass comes up empty.
const NEAREST_GROWTH_FACTOR: f64 = 4.0;

/// Radius at which the nearest-farm envelope covers the entire globe, so
/// the final pass is guaranteed to see every indexed farm.
const NEAREST_MAX_RADIUS_KM: f64 = 20_100.0;

/// Errors produced by spatial store queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    /// Invalid coordinates or viewport in the query input.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// Radius is zero, negative, or non-finite.
    #[error("invalid radius {radius_km}km: must be a positive finite number")]
    InvalidRadius {
        /// The offending radius in kilometers.
        radius_km: f64,
    },

    /// Limit is zero.
    #[error("invalid limit {limit}: must be positive")]
    InvalidLimit {
        /// The offending limit.
        limit: usize,
    },

    /// The referenced farm id does not resolve to an active farm.
    #[error("no active farm with id {id}")]
    NotFound {
        /// The id that failed to resolve.
        id: String,
    },

    /// The backing store cannot be reached right now. Never produced by
    /// the in-memory index; part of the contract so remote implementations
    /// can signal a retryable condition.
    #[error("spatial storage unavailable: {reason}")]
    Unavailable {
        /// Human-readable description of the outage.
        reason: String,
    },
}

/// A validated radius query.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusQuery {
    /// Centre of the search circle.
    pub center: GeoPoint,
    /// Search radius in kilometers, positive and finite.
    pub radius_km: f64,
    /// Maximum number of results, positive.
    pub limit: usize,
}

impl RadiusQuery {
    /// Creates a validated radius query.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Geo`] for out-of-range coordinates,
    /// [`SpatialError::InvalidRadius`] for a non-positive radius, or
    /// [`SpatialError::InvalidLimit`] for a zero limit.
    pub fn new(lat: f64, lng: f64, radius_km: f64, limit: usize) -> Result<Self, SpatialError> {
        let query = Self {
            center: GeoPoint::new(lat, lng)?,
            radius_km,
            limit,
        };
        query.validate()?;
        Ok(query)
    }

    /// Re-checks the radius and limit invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidRadius`] or
    /// [`SpatialError::InvalidLimit`] when the corresponding field is out
    /// of contract.
    pub fn validate(&self) -> Result<(), SpatialError> {
        ensure_radius(self.radius_km)?;
        ensure_limit(self.limit)
    }
}

/// One radius-query result: a farm and its distance from the query centre.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyHit {
    /// The matched farm.
    pub farm: FarmPoint,
    /// Great-circle distance from the query centre, in kilometers.
    pub distance_km: f64,
}

/// Storage contract for farm discovery queries.
///
/// Implementations must only surface active farms, order `nearby` results
/// by ascending distance with id tiebreaks, and keep all operations
/// read-only. [`SpatialError::Unavailable`] is the one retryable failure;
/// everything else is a deterministic input error.
#[async_trait]
pub trait FarmStore: Send + Sync {
    /// Farms within the query radius, closest first, capped at the query
    /// limit with strict nearest-first truncation.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the query fails validation or the store
    /// is unavailable.
    async fn nearby(&self, query: &RadiusQuery) -> Result<Vec<NearbyHit>, SpatialError>;

    /// Farms inside the viewport, capped at [`IN_BOUNDS_CAP`] preferring
    /// higher tier weights (ties by id) when the cap is hit.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the store is unavailable.
    async fn in_bounds(&self, viewport: &Viewport) -> Result<Vec<FarmPoint>, SpatialError>;

    /// The single closest active farm, or `None` on an empty dataset.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the store is unavailable.
    async fn nearest(&self, point: GeoPoint) -> Result<Option<NearbyHit>, SpatialError>;

    /// Same semantics as [`FarmStore::nearby`], seeded from an existing
    /// farm's coordinates and excluding that farm from the results.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::NotFound`] if `farm_id` does not resolve to
    /// an active farm, or any other [`SpatialError`] per
    /// [`FarmStore::nearby`].
    async fn nearby_to_farm(
        &self,
        farm_id: &str,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<NearbyHit>, SpatialError>;

    /// Looks up a single active farm by id.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the store is unavailable.
    async fn get(&self, farm_id: &str) -> Result<Option<FarmPoint>, SpatialError>;

    /// Number of active farms currently indexed.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError`] if the store is unavailable.
    async fn active_count(&self) -> Result<usize, SpatialError>;
}

/// A farm stored in the R-tree with its validated location.
struct IndexedFarm {
    farm: FarmPoint,
    location: GeoPoint,
}

impl RTreeObject for IndexedFarm {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.lng, self.location.lat])
    }
}

/// Immutable R-tree index over the active farm set.
///
/// Construction filters the input down to active listings with valid
/// coordinates; anything else is dropped (and logged), never surfaced to
/// queries.
pub struct FarmIndex {
    tree: RTree<IndexedFarm>,
    by_id: BTreeMap<String, FarmPoint>,
}

impl FarmIndex {
    /// Builds the index from a farm set.
    ///
    /// Non-active listings, records with out-of-range coordinates, and
    /// duplicate ids (first occurrence wins) are dropped with a log line
    /// rather than an error, so one bad record cannot take down a rebuild.
    #[must_use]
    pub fn build(points: Vec<FarmPoint>) -> Self {
        let mut entries = Vec::with_capacity(points.len());
        let mut by_id = BTreeMap::new();
        let mut skipped_inactive = 0_usize;
        let mut rejected_invalid = 0_usize;

        for farm in points {
            if !farm.status.is_queryable() {
                skipped_inactive += 1;
                continue;
            }
            if by_id.contains_key(&farm.id) {
                log::warn!("Duplicate farm id {}, keeping the first occurrence", farm.id);
                continue;
            }
            match farm.location() {
                Ok(location) => {
                    by_id.insert(farm.id.clone(), farm.clone());
                    entries.push(IndexedFarm { farm, location });
                }
                Err(err) => {
                    rejected_invalid += 1;
                    log::warn!("Dropping farm {}: {err}", farm.id);
                }
            }
        }

        log::info!(
            "Indexed {} active farms ({skipped_inactive} inactive skipped, {rejected_invalid} invalid rejected)",
            entries.len()
        );

        Self {
            tree: RTree::bulk_load(entries),
            by_id,
        }
    }

    /// Number of active farms in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns `true` if no farms are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Looks up an active farm by id.
    #[must_use]
    pub fn get(&self, farm_id: &str) -> Option<&FarmPoint> {
        self.by_id.get(farm_id)
    }

    /// Farms within `radius_km` of `center`, closest first, ties broken by
    /// id ascending. No limit is applied here; callers truncate.
    #[must_use]
    pub fn radius_hits(&self, center: GeoPoint, radius_km: f64) -> Vec<NearbyHit> {
        let mut hits: Vec<NearbyHit> = self
            .envelope_candidates(center, radius_km)
            .into_iter()
            .filter(|entry| within_radius(center, entry.location, radius_km))
            .map(|entry| NearbyHit {
                farm: entry.farm.clone(),
                distance_km: haversine_km(center, entry.location),
            })
            .collect();

        hits.sort_unstable_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| a.farm.id.cmp(&b.farm.id))
        });
        hits
    }

    /// Farms inside the viewport, capped at [`IN_BOUNDS_CAP`].
    ///
    /// Output is sorted by descending tier weight then id, which both
    /// makes the cap deterministic and keeps uncapped responses stable
    /// across rebuilds.
    #[must_use]
    pub fn bounded_hits(&self, viewport: &Viewport) -> Vec<FarmPoint> {
        let mut hits = Vec::new();
        for (west, east) in viewport.lng_spans() {
            let envelope = AABB::from_corners([west, viewport.south], [east, viewport.north]);
            for entry in self.tree.locate_in_envelope_intersecting(&envelope) {
                if viewport.contains(entry.location) {
                    hits.push(entry.farm.clone());
                }
            }
        }

        hits.sort_unstable_by(|a, b| b.tier_weight.cmp(&a.tier_weight).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(IN_BOUNDS_CAP);
        hits
    }

    /// The closest active farm to `point`, or `None` on an empty index.
    ///
    /// Runs expanding envelope passes: a candidate found at distance `d`
    /// inside a pass radius `r >= d` is provably the global minimum,
    /// because everything outside the envelope is farther than `r`. The
    /// final pass covers the whole globe, so the loop always terminates.
    #[must_use]
    pub fn nearest_hit(&self, point: GeoPoint) -> Option<NearbyHit> {
        if self.is_empty() {
            return None;
        }

        let mut radius_km = NEAREST_SEED_RADIUS_KM;
        loop {
            let best = self
                .envelope_candidates(point, radius_km)
                .into_iter()
                .map(|entry| NearbyHit {
                    farm: entry.farm.clone(),
                    distance_km: haversine_km(point, entry.location),
                })
                .min_by(|a, b| {
                    a.distance_km
                        .total_cmp(&b.distance_km)
                        .then_with(|| a.farm.id.cmp(&b.farm.id))
                });

            if let Some(hit) = best {
                if hit.distance_km <= radius_km || radius_km >= NEAREST_MAX_RADIUS_KM {
                    return Some(hit);
                }
            } else if radius_km >= NEAREST_MAX_RADIUS_KM {
                return None;
            }

            radius_km = (radius_km * NEAREST_GROWTH_FACTOR).min(NEAREST_MAX_RADIUS_KM);
        }
    }

    fn envelope_candidates(&self, center: GeoPoint, radius_km: f64) -> Vec<&IndexedFarm> {
        let bounds = radius_envelope(center, radius_km);
        let mut candidates = Vec::new();
        for (west, east) in bounds.lng_spans() {
            let envelope = AABB::from_corners([west, bounds.south], [east, bounds.north]);
            candidates.extend(self.tree.locate_in_envelope_intersecting(&envelope));
        }
        candidates
    }
}

/// Cloneable handle over the current [`FarmIndex`].
///
/// Rebuilds swap the inner [`Arc`] under a write lock held only for the
/// pointer assignment, so concurrent readers either see the old index or
/// the new one, never a partial state.
#[derive(Clone)]
pub struct SharedFarmIndex {
    inner: Arc<RwLock<Arc<FarmIndex>>>,
}

impl SharedFarmIndex {
    /// Wraps an index for shared read access.
    #[must_use]
    pub fn new(index: FarmIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// Atomically replaces the index. In-flight readers keep the snapshot
    /// they already took.
    pub fn replace(&self, index: FarmIndex) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(index);
    }

    /// Takes a consistent snapshot of the current index.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FarmIndex> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl FarmStore for SharedFarmIndex {
    async fn nearby(&self, query: &RadiusQuery) -> Result<Vec<NearbyHit>, SpatialError> {
        query.validate()?;
        let index = self.snapshot();
        let mut hits = index.radius_hits(query.center, query.radius_km);
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn in_bounds(&self, viewport: &Viewport) -> Result<Vec<FarmPoint>, SpatialError> {
        Ok(self.snapshot().bounded_hits(viewport))
    }

    async fn nearest(&self, point: GeoPoint) -> Result<Option<NearbyHit>, SpatialError> {
        Ok(self.snapshot().nearest_hit(point))
    }

    async fn nearby_to_farm(
        &self,
        farm_id: &str,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<NearbyHit>, SpatialError> {
        ensure_radius(radius_km)?;
        ensure_limit(limit)?;

        let index = self.snapshot();
        let seed = index.get(farm_id).ok_or_else(|| SpatialError::NotFound {
            id: farm_id.to_string(),
        })?;
        let center = seed.location()?;

        let mut hits = index.radius_hits(center, radius_km);
        hits.retain(|hit| hit.farm.id != farm_id);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get(&self, farm_id: &str) -> Result<Option<FarmPoint>, SpatialError> {
        Ok(self.snapshot().get(farm_id).cloned())
    }

    async fn active_count(&self) -> Result<usize, SpatialError> {
        Ok(self.snapshot().len())
    }
}

fn ensure_radius(radius_km: f64) -> Result<(), SpatialError> {
    if radius_km.is_finite() && radius_km > 0.0 {
        Ok(())
    } else {
        Err(SpatialError::InvalidRadius { radius_km })
    }
}

fn ensure_limit(limit: usize) -> Result<(), SpatialError> {
    if limit > 0 {
        Ok(())
    } else {
        Err(SpatialError::InvalidLimit { limit })
    }
}
