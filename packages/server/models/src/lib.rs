#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the farm map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the core domain types to allow independent evolution of the API
//! contract.

use farm_map_farm_models::FarmPoint;
use farm_map_spatial::NearbyHit;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Query parameters for the discover endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverQueryParams {
    /// Latitude of the search centre.
    pub lat: Option<f64>,
    /// Longitude of the search centre.
    pub lng: Option<f64>,
    /// Search radius in kilometers.
    pub radius_km: Option<f64>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Free-text query blended into the ranking.
    pub q: Option<String>,
    /// Restrict results to farms matching the text query.
    pub must_match_text: Option<bool>,
}

/// Query parameters for the clusters endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterQueryParams {
    /// Bounding box as `west,south,east,north`.
    pub bbox: Option<String>,
    /// Current map zoom level.
    pub zoom: Option<i32>,
}

/// Query parameters for the per-farm nearby endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyQueryParams {
    /// Search radius in kilometers.
    pub radius_km: Option<f64>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// Query parameters for the nearest endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestQueryParams {
    /// Latitude of the reference point.
    pub lat: Option<f64>,
    /// Longitude of the reference point.
    pub lng: Option<f64>,
}

/// The nearest farm to a reference point.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNearestFarm {
    /// The closest active farm.
    pub farm: FarmPoint,
    /// Distance from the reference point in kilometers.
    pub distance_km: f64,
}

impl From<NearbyHit> for ApiNearestFarm {
    fn from(hit: NearbyHit) -> Self {
        Self {
            farm: hit.farm,
            distance_km: hit.distance_km,
        }
    }
}

/// Error envelope for every non-2xx API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Stable machine-readable code: `invalid_request`, `not_found`, or
    /// `unavailable`.
    pub error: String,
    /// Human-readable description of what went wrong.
    pub message: String,
}
