#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Discovery facade over the spatial store, the cluster engine and the
//! text-search collaborator.
//!
//! Every operation is read-only and idempotent. Storage calls run under a
//! per-call timeout and a bounded retry policy ([`retry`]); text search is
//! an enhancement, so its failures degrade the response (`partial: true`)
//! instead of failing it. Callers that drop the returned future cancel
//! all in-flight work.

pub mod merger;
pub mod retry;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use farm_map_cluster::{Cluster, clamp_zoom, cluster};
use farm_map_farm_models::FarmPoint;
use farm_map_geo::{GeoPoint, Viewport, haversine_km};
use farm_map_search::{SearchHit, TextSearch};
use farm_map_spatial::{FarmStore, NearbyHit, RadiusQuery, SpatialError};
use serde::Serialize;
use thiserror::Error;

pub use crate::merger::{
    PROXIMITY_CUTOFF_KM, RankedResult, RankingWeights, merge_rankings, proximity_score,
};
pub use crate::retry::RetryPolicy;

/// Radius used when a request does not specify one.
pub const DEFAULT_RADIUS_KM: f64 = 25.0;

/// Largest radius a caller may request; beyond it the request is invalid.
pub const MAX_RADIUS_KM: f64 = 100.0;

/// Result limit used when a request does not specify one.
pub const DEFAULT_LIMIT: usize = 20;

/// Largest result limit; higher requests are clamped, not rejected.
pub const MAX_LIMIT: usize = 500;

/// Timeout applied to each storage and text-search call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors surfaced by discovery operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The spatial store rejected or failed the query.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// A storage call exceeded the configured timeout on every attempt.
    #[error("storage call timed out after {}ms", .timeout.as_millis())]
    StorageTimeout {
        /// The per-call timeout that elapsed.
        timeout: Duration,
    },
}

impl DiscoveryError {
    /// Whether retrying the operation could help.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StorageTimeout { .. } | Self::Spatial(SpatialError::Unavailable { .. })
        )
    }
}

/// A radius discovery request.
///
/// Optional fields fall back to [`DEFAULT_RADIUS_KM`] and
/// [`DEFAULT_LIMIT`].
#[derive(Debug, Clone)]
pub struct DiscoverRequest {
    /// Centre of the search.
    pub center: GeoPoint,
    /// Search radius; rejected above [`MAX_RADIUS_KM`].
    pub radius_km: Option<f64>,
    /// Result cap; clamped to [`MAX_LIMIT`].
    pub limit: Option<usize>,
    /// Free-text query to blend into the ranking.
    pub text_query: Option<String>,
    /// Restrict results to farms matching the text query.
    pub must_match_text: bool,
}

impl DiscoverRequest {
    /// A plain distance-only request around `center`.
    #[must_use]
    pub const fn new(center: GeoPoint) -> Self {
        Self {
            center,
            radius_km: None,
            limit: None,
            text_query: None,
            must_match_text: false,
        }
    }
}

/// Ranked discovery results plus the degradation marker.
///
/// `partial` distinguishes "text search was unavailable, these are
/// distance-only results" from a genuinely empty or fully blended
/// response; the two must never be collapsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverResponse {
    pub results: Vec<RankedResult>,
    pub partial: bool,
}

/// The discovery facade. Stateless between calls and safe to share.
pub struct DiscoveryService {
    store: Arc<dyn FarmStore>,
    search: Arc<dyn TextSearch>,
    weights: RankingWeights,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl DiscoveryService {
    #[must_use]
    pub fn new(store: Arc<dyn FarmStore>, search: Arc<dyn TextSearch>) -> Self {
        Self {
            store,
            search,
            weights: RankingWeights::default(),
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Farms around a point, optionally blended with text relevance.
    ///
    /// Without a text query the results are the store's distance ordering.
    /// With one, spatial hits and text hits are merged per [`merger`];
    /// text matches outside the radius are resolved against the store so
    /// they rank with their real distance. Text-search failures and
    /// timeouts fall back to distance-only ordering with `partial: true`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Spatial`] for validation failures or a
    /// store that stayed unavailable through all retries, and
    /// [`DiscoveryError::StorageTimeout`] when every storage attempt
    /// timed out.
    pub async fn discover_near(
        &self,
        request: &DiscoverRequest,
    ) -> Result<DiscoverResponse, DiscoveryError> {
        let radius_km = resolve_radius(request.radius_km)?;
        let limit = resolve_limit(request.limit);
        let query = RadiusQuery::new(request.center.lat, request.center.lng, radius_km, limit)?;

        let distance_hits = self
            .storage_call("nearby", || self.store.nearby(&query))
            .await?;

        let text_query = request
            .text_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        let Some(text_query) = text_query else {
            return Ok(DiscoverResponse {
                results: distance_only(&distance_hits),
                partial: false,
            });
        };

        let text_hits = match tokio::time::timeout(
            self.call_timeout,
            self.search.search(text_query, limit),
        )
        .await
        {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                log::warn!("Text search failed, serving distance-only results: {e}");
                return Ok(DiscoverResponse {
                    results: distance_only(&distance_hits),
                    partial: true,
                });
            }
            Err(_) => {
                log::warn!(
                    "Text search timed out after {}ms, serving distance-only results",
                    self.call_timeout.as_millis()
                );
                return Ok(DiscoverResponse {
                    results: distance_only(&distance_hits),
                    partial: true,
                });
            }
        };

        let (text_only, partial) = self
            .resolve_text_only(request.center, &distance_hits, &text_hits)
            .await;

        let mut results = merger::merge_rankings(
            &distance_hits,
            &text_hits,
            &text_only,
            self.weights,
            request.must_match_text,
        );
        results.truncate(limit);

        Ok(DiscoverResponse { results, partial })
    }

    /// Clusters for a viewport at a zoom level.
    ///
    /// Out-of-range zoom values are clamped to the nearest breakpoint
    /// rather than rejected, so one bad client parameter degrades instead
    /// of failing the whole map.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when the store fails or times out after
    /// retries.
    pub async fn discover_in_viewport(
        &self,
        viewport: &Viewport,
        zoom: i32,
    ) -> Result<Vec<Cluster>, DiscoveryError> {
        let zoom = clamp_zoom(zoom);
        let points = self
            .storage_call("in_bounds", || self.store.in_bounds(viewport))
            .await?;

        Ok(cluster(&points, zoom))
    }

    /// Active farms around an existing farm, nearest first, excluding the
    /// farm itself.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Spatial`] carrying
    /// [`SpatialError::NotFound`] when `farm_id` does not resolve to an
    /// active farm, plus the usual validation and availability errors.
    pub async fn discover_nearest_to(
        &self,
        farm_id: &str,
        radius_km: Option<f64>,
        limit: Option<usize>,
    ) -> Result<Vec<FarmPoint>, DiscoveryError> {
        let radius_km = resolve_radius(radius_km)?;
        let limit = resolve_limit(limit);

        let hits = self
            .storage_call("nearby_to_farm", || {
                self.store.nearby_to_farm(farm_id, radius_km, limit)
            })
            .await?;

        Ok(hits.into_iter().map(|hit| hit.farm).collect())
    }

    /// The single closest active farm to a point, if any farms exist.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when the store fails or times out after
    /// retries.
    pub async fn discover_nearest(
        &self,
        point: GeoPoint,
    ) -> Result<Option<NearbyHit>, DiscoveryError> {
        self.storage_call("nearest", || self.store.nearest(point))
            .await
    }

    /// Runs a storage future under the call timeout and the retry policy.
    #[allow(clippy::future_not_send)]
    async fn storage_call<T, F, Fut>(
        &self,
        op_name: &str,
        operation: F,
    ) -> Result<T, DiscoveryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SpatialError>>,
    {
        self.retry
            .run(op_name, DiscoveryError::is_transient, || async {
                match tokio::time::timeout(self.call_timeout, operation()).await {
                    Ok(result) => result.map_err(DiscoveryError::from),
                    Err(_) => Err(DiscoveryError::StorageTimeout {
                        timeout: self.call_timeout,
                    }),
                }
            })
            .await
    }

    /// Resolves text hits that fell outside the radius query against the
    /// store, so they can be ranked with their real distance.
    ///
    /// Unknown ids (stale search entries) are dropped silently; storage
    /// failures drop the hit and mark the response degraded.
    async fn resolve_text_only(
        &self,
        center: GeoPoint,
        distance_hits: &[NearbyHit],
        text_hits: &[SearchHit],
    ) -> (Vec<NearbyHit>, bool) {
        let known: BTreeSet<&str> = distance_hits
            .iter()
            .map(|hit| hit.farm.id.as_str())
            .collect();

        let mut resolved = Vec::new();
        let mut degraded = false;
        for text_hit in text_hits {
            if known.contains(text_hit.id.as_str()) {
                continue;
            }
            let lookup =
                tokio::time::timeout(self.call_timeout, self.store.get(&text_hit.id)).await;
            let farm = match lookup {
                Ok(Ok(Some(farm))) => farm,
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => {
                    log::warn!("Could not resolve text match {id}: {e}", id = text_hit.id);
                    degraded = true;
                    continue;
                }
                Err(_) => {
                    log::warn!("Timed out resolving text match {id}", id = text_hit.id);
                    degraded = true;
                    continue;
                }
            };
            let Ok(location) = farm.location() else {
                continue;
            };
            resolved.push(NearbyHit {
                distance_km: haversine_km(center, location),
                farm,
            });
        }

        (resolved, degraded)
    }
}

/// Distance-ordered hits as ranked results, preserving store order.
fn distance_only(hits: &[NearbyHit]) -> Vec<RankedResult> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| RankedResult {
            farm_id: hit.farm.id.clone(),
            distance_km: hit.distance_km,
            text_score: 0.0,
            final_rank: i + 1,
        })
        .collect()
}

fn resolve_radius(radius_km: Option<f64>) -> Result<f64, DiscoveryError> {
    let radius_km = radius_km.unwrap_or(DEFAULT_RADIUS_KM);
    if radius_km > MAX_RADIUS_KM {
        return Err(SpatialError::InvalidRadius { radius_km }.into());
    }
    Ok(radius_km)
}

const fn resolve_limit(limit: Option<usize>) -> usize {
    match limit {
        Some(limit) if limit > MAX_LIMIT => MAX_LIMIT,
        Some(limit) => limit,
        None => DEFAULT_LIMIT,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use farm_map_cluster::Tier;
    use farm_map_farm_models::FarmStatus;
    use farm_map_search::{SearchError, StaticTextSearch};
    use farm_map_spatial::{FarmIndex, SharedFarmIndex};

    use super::*;

    fn farm(id: &str, name: &str, lat: f64, lng: f64) -> FarmPoint {
        FarmPoint {
            id: id.to_string(),
            name: name.to_string(),
            lat,
            lng,
            status: FarmStatus::Active,
            tier_weight: 1,
        }
    }

    fn london_trio() -> SharedFarmIndex {
        SharedFarmIndex::new(FarmIndex::build(vec![
            farm("farm-a", "Borough Growers", 51.50, -0.12),
            farm("farm-b", "Thames Dairy", 51.51, -0.12),
            farm("farm-c", "Fenland Orchard", 52.20, -0.15),
        ]))
    }

    fn no_text() -> StaticTextSearch {
        StaticTextSearch::new(Vec::new())
    }

    fn service(
        store: impl FarmStore + 'static,
        search: impl TextSearch + 'static,
    ) -> DiscoveryService {
        DiscoveryService::new(Arc::new(store), Arc::new(search))
    }

    struct FlakyStore {
        calls: AtomicU32,
        failures: u32,
    }

    impl FlakyStore {
        const fn failing(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
            }
        }
    }

    #[async_trait]
    impl FarmStore for FlakyStore {
        async fn nearby(&self, _query: &RadiusQuery) -> Result<Vec<NearbyHit>, SpatialError> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Err(SpatialError::Unavailable {
                    reason: "index rebuilding".to_string(),
                })
            } else {
                Ok(Vec::new())
            }
        }

        async fn in_bounds(&self, _viewport: &Viewport) -> Result<Vec<FarmPoint>, SpatialError> {
            Ok(Vec::new())
        }

        async fn nearest(&self, _point: GeoPoint) -> Result<Option<NearbyHit>, SpatialError> {
            Ok(None)
        }

        async fn nearby_to_farm(
            &self,
            farm_id: &str,
            _radius_km: f64,
            _limit: usize,
        ) -> Result<Vec<NearbyHit>, SpatialError> {
            Err(SpatialError::NotFound {
                id: farm_id.to_string(),
            })
        }

        async fn get(&self, _farm_id: &str) -> Result<Option<FarmPoint>, SpatialError> {
            Ok(None)
        }

        async fn active_count(&self) -> Result<usize, SpatialError> {
            Ok(0)
        }
    }

    struct SlowStore {
        calls: AtomicU32,
    }

    #[async_trait]
    impl FarmStore for SlowStore {
        async fn nearby(&self, _query: &RadiusQuery) -> Result<Vec<NearbyHit>, SpatialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Vec::new())
        }

        async fn in_bounds(&self, _viewport: &Viewport) -> Result<Vec<FarmPoint>, SpatialError> {
            Ok(Vec::new())
        }

        async fn nearest(&self, _point: GeoPoint) -> Result<Option<NearbyHit>, SpatialError> {
            Ok(None)
        }

        async fn nearby_to_farm(
            &self,
            _farm_id: &str,
            _radius_km: f64,
            _limit: usize,
        ) -> Result<Vec<NearbyHit>, SpatialError> {
            Ok(Vec::new())
        }

        async fn get(&self, _farm_id: &str) -> Result<Option<FarmPoint>, SpatialError> {
            Ok(None)
        }

        async fn active_count(&self) -> Result<usize, SpatialError> {
            Ok(0)
        }
    }

    struct RecordingStore {
        last_limit: Mutex<Option<usize>>,
    }

    #[async_trait]
    impl FarmStore for RecordingStore {
        async fn nearby(&self, query: &RadiusQuery) -> Result<Vec<NearbyHit>, SpatialError> {
            *self.last_limit.lock().unwrap() = Some(query.limit);
            Ok(Vec::new())
        }

        async fn in_bounds(&self, _viewport: &Viewport) -> Result<Vec<FarmPoint>, SpatialError> {
            Ok(Vec::new())
        }

        async fn nearest(&self, _point: GeoPoint) -> Result<Option<NearbyHit>, SpatialError> {
            Ok(None)
        }

        async fn nearby_to_farm(
            &self,
            _farm_id: &str,
            _radius_km: f64,
            _limit: usize,
        ) -> Result<Vec<NearbyHit>, SpatialError> {
            Ok(Vec::new())
        }

        async fn get(&self, _farm_id: &str) -> Result<Option<FarmPoint>, SpatialError> {
            Ok(None)
        }

        async fn active_count(&self) -> Result<usize, SpatialError> {
            Ok(0)
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl TextSearch for FailingSearch {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<SearchHit>, SearchError> {
            Err(SearchError::Unavailable {
                reason: "index offline".to_string(),
            })
        }
    }

    struct SlowSearch;

    #[async_trait]
    impl TextSearch for SlowSearch {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<SearchHit>, SearchError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn discover_near_returns_nearest_first() {
        let svc = service(london_trio(), no_text());
        let request = DiscoverRequest {
            radius_km: Some(25.0),
            limit: Some(10),
            ..DiscoverRequest::new(GeoPoint::new(51.50, -0.12).unwrap())
        };

        let response = svc.discover_near(&request).await.unwrap();

        assert!(!response.partial);
        let ids: Vec<&str> = response.results.iter().map(|r| r.farm_id.as_str()).collect();
        assert_eq!(ids, ["farm-a", "farm-b"]);
        assert_eq!(response.results[0].final_rank, 1);
        assert!(response.results[0].distance_km < 0.01);
        assert!((response.results[1].distance_km - 1.1).abs() < 0.2);
    }

    #[tokio::test]
    async fn discover_near_blends_relevance_with_proximity() {
        let store = SharedFarmIndex::new(FarmIndex::build(vec![
            farm("farm-x", "Organic Uplands", 52.81, -1.0),
            farm("farm-y", "Hedgerow Organics", 52.018, -1.0),
        ]));
        let search = StaticTextSearch::new(vec![
            SearchHit {
                id: "farm-x".to_string(),
                score: 1.0,
            },
            SearchHit {
                id: "farm-y".to_string(),
                score: 0.5,
            },
        ]);
        let svc = service(store, search);
        let request = DiscoverRequest {
            radius_km: Some(25.0),
            limit: Some(10),
            text_query: Some("organic".to_string()),
            ..DiscoverRequest::new(GeoPoint::new(52.0, -1.0).unwrap())
        };

        let response = svc.discover_near(&request).await.unwrap();

        assert!(!response.partial);
        let ids: Vec<&str> = response.results.iter().map(|r| r.farm_id.as_str()).collect();
        assert_eq!(ids, ["farm-y", "farm-x"]);
        assert!(response.results[1].distance_km > 80.0);
        assert!((response.results[1].text_score - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn must_match_text_filters_out_non_matches() {
        let search = StaticTextSearch::new(vec![SearchHit {
            id: "farm-b".to_string(),
            score: 0.9,
        }]);
        let svc = service(london_trio(), search);
        let request = DiscoverRequest {
            radius_km: Some(25.0),
            text_query: Some("dairy".to_string()),
            must_match_text: true,
            ..DiscoverRequest::new(GeoPoint::new(51.50, -0.12).unwrap())
        };

        let response = svc.discover_near(&request).await.unwrap();

        let ids: Vec<&str> = response.results.iter().map(|r| r.farm_id.as_str()).collect();
        assert_eq!(ids, ["farm-b"]);
    }

    #[tokio::test]
    async fn search_failure_degrades_to_partial() {
        let svc = service(london_trio(), FailingSearch);
        let request = DiscoverRequest {
            radius_km: Some(25.0),
            text_query: Some("organic".to_string()),
            ..DiscoverRequest::new(GeoPoint::new(51.50, -0.12).unwrap())
        };

        let response = svc.discover_near(&request).await.unwrap();

        assert!(response.partial);
        let ids: Vec<&str> = response.results.iter().map(|r| r.farm_id.as_str()).collect();
        assert_eq!(ids, ["farm-a", "farm-b"]);
        assert!(response.results.iter().all(|r| r.text_score.abs() < 1e-12));
    }

    #[tokio::test]
    async fn search_timeout_degrades_to_partial() {
        let svc = service(london_trio(), SlowSearch)
            .with_call_timeout(Duration::from_millis(10));
        let request = DiscoverRequest {
            radius_km: Some(25.0),
            text_query: Some("organic".to_string()),
            ..DiscoverRequest::new(GeoPoint::new(51.50, -0.12).unwrap())
        };

        let response = svc.discover_near(&request).await.unwrap();

        assert!(response.partial);
        assert_eq!(response.results.len(), 2);
    }

    #[tokio::test]
    async fn storage_retries_recover_from_transient_outages() {
        let store = Arc::new(FlakyStore::failing(2));
        let svc = DiscoveryService::new(store.clone(), Arc::new(no_text()))
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)));
        let request = DiscoverRequest::new(GeoPoint::new(52.0, -1.0).unwrap());

        let response = svc.discover_near(&request).await.unwrap();

        assert!(response.results.is_empty());
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn storage_retries_give_up_eventually() {
        let store = Arc::new(FlakyStore::failing(10));
        let svc = DiscoveryService::new(store.clone(), Arc::new(no_text()))
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)));
        let request = DiscoverRequest::new(GeoPoint::new(52.0, -1.0).unwrap());

        let err = svc.discover_near(&request).await.unwrap_err();

        assert!(matches!(
            err,
            DiscoveryError::Spatial(SpatialError::Unavailable { .. })
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn slow_storage_times_out_after_retries() {
        let store = Arc::new(SlowStore {
            calls: AtomicU32::new(0),
        });
        let svc = DiscoveryService::new(store.clone(), Arc::new(no_text()))
            .with_retry(RetryPolicy::new(1, Duration::from_millis(1)))
            .with_call_timeout(Duration::from_millis(10));
        let request = DiscoverRequest::new(GeoPoint::new(52.0, -1.0).unwrap());

        let err = svc.discover_near(&request).await.unwrap_err();

        assert!(matches!(err, DiscoveryError::StorageTimeout { .. }));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn validation_errors_are_not_retried() {
        let store = Arc::new(FlakyStore::failing(0));
        let svc = DiscoveryService::new(store.clone(), Arc::new(no_text()));

        let over_max = DiscoverRequest {
            radius_km: Some(150.0),
            ..DiscoverRequest::new(GeoPoint::new(52.0, -1.0).unwrap())
        };
        let err = svc.discover_near(&over_max).await.unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::Spatial(SpatialError::InvalidRadius { .. })
        ));

        let negative = DiscoverRequest {
            radius_km: Some(-1.0),
            ..DiscoverRequest::new(GeoPoint::new(52.0, -1.0).unwrap())
        };
        let err = svc.discover_near(&negative).await.unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::Spatial(SpatialError::InvalidRadius { .. })
        ));

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn limit_defaults_and_clamps() {
        let store = Arc::new(RecordingStore {
            last_limit: Mutex::new(None),
        });
        let svc = DiscoveryService::new(store.clone(), Arc::new(no_text()));
        let center = GeoPoint::new(52.0, -1.0).unwrap();

        svc.discover_near(&DiscoverRequest::new(center)).await.unwrap();
        assert_eq!(*store.last_limit.lock().unwrap(), Some(DEFAULT_LIMIT));

        let oversized = DiscoverRequest {
            limit: Some(10_000),
            ..DiscoverRequest::new(center)
        };
        svc.discover_near(&oversized).await.unwrap();
        assert_eq!(*store.last_limit.lock().unwrap(), Some(MAX_LIMIT));
    }

    #[tokio::test]
    async fn discover_in_viewport_clusters_nearby_farms() {
        let svc = service(london_trio(), no_text());
        let viewport = Viewport::new(51.6, 51.4, 0.0, -0.3).unwrap();

        let clusters = svc.discover_in_viewport(&viewport, 5).await.unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].count, 2);
        assert_eq!(clusters[0].tier, Tier::Medium);
        assert!(clusters[0].previewable);
    }

    #[tokio::test]
    async fn out_of_range_zoom_is_clamped_not_rejected() {
        let svc = service(london_trio(), no_text());
        let viewport = Viewport::new(51.6, 51.4, 0.0, -0.3).unwrap();

        let clusters = svc.discover_in_viewport(&viewport, 99).await.unwrap();

        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.tier == Tier::Small));
    }

    #[tokio::test]
    async fn discover_nearest_to_excludes_the_seed() {
        let svc = service(london_trio(), no_text());

        let farms = svc
            .discover_nearest_to("farm-a", Some(25.0), None)
            .await
            .unwrap();

        let ids: Vec<&str> = farms.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["farm-b"]);
    }

    #[tokio::test]
    async fn discover_nearest_to_unknown_farm_is_not_found() {
        let svc = service(london_trio(), no_text());

        let err = svc
            .discover_nearest_to("farm-z", None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DiscoveryError::Spatial(SpatialError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn discover_nearest_returns_the_closest_farm() {
        let svc = service(london_trio(), no_text());

        let hit = svc
            .discover_nearest(GeoPoint::new(51.505, -0.12).unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(hit.farm.id, "farm-a");
        assert!(hit.distance_km < 1.0);
    }

    #[tokio::test]
    async fn discover_nearest_on_empty_dataset_is_none() {
        let svc = service(
            SharedFarmIndex::new(FarmIndex::build(Vec::new())),
            no_text(),
        );

        let hit = svc
            .discover_nearest(GeoPoint::new(51.5, -0.12).unwrap())
            .await
            .unwrap();

        assert!(hit.is_none());
    }

    #[test]
    fn responses_serialize_camel_case() {
        let response = DiscoverResponse {
            results: Vec::new(),
            partial: true,
        };

        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value.get("partial"), Some(&serde_json::Value::Bool(true)));
        assert!(value.get("results").is_some());
    }
}
