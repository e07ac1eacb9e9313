//! HTTP handler functions for the farm map API.

use actix_web::{HttpResponse, web};
use farm_map_discovery::{DiscoverRequest, DiscoveryError};
use farm_map_geo::{GeoPoint, Viewport};
use farm_map_server_models::{
    ApiError, ApiHealth, ApiNearestFarm, ClusterQueryParams, DiscoverQueryParams,
    NearbyQueryParams, NearestQueryParams,
};
use farm_map_spatial::SpatialError;

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/discover`
///
/// Farms around a point, ranked by distance alone or by the blended
/// distance/relevance score when `q` is present.
pub async fn discover(
    state: web::Data<AppState>,
    params: web::Query<DiscoverQueryParams>,
) -> HttpResponse {
    let (Some(lat), Some(lng)) = (params.lat, params.lng) else {
        return invalid_request("lat and lng are required".to_string());
    };
    let center = match GeoPoint::new(lat, lng) {
        Ok(center) => center,
        Err(e) => return invalid_request(e.to_string()),
    };

    let request = DiscoverRequest {
        center,
        radius_km: params.radius_km,
        limit: params.limit,
        text_query: params.q.clone(),
        must_match_text: params.must_match_text.unwrap_or(false),
    };

    match state.service.discover_near(&request).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/clusters`
///
/// Clusters the farms in a viewport for map rendering at a zoom level.
pub async fn clusters(
    state: web::Data<AppState>,
    params: web::Query<ClusterQueryParams>,
) -> HttpResponse {
    let Some(viewport) = params.bbox.as_deref().and_then(parse_viewport) else {
        return invalid_request("bbox must be west,south,east,north".to_string());
    };
    let Some(zoom) = params.zoom else {
        return invalid_request("zoom is required".to_string());
    };

    match state.service.discover_in_viewport(&viewport, zoom).await {
        Ok(clusters) => HttpResponse::Ok().json(clusters),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/farms/{id}/nearby`
///
/// Active farms around an existing farm, nearest first, excluding the
/// farm itself.
pub async fn farm_nearby(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<NearbyQueryParams>,
) -> HttpResponse {
    let farm_id = path.into_inner();

    match state
        .service
        .discover_nearest_to(&farm_id, params.radius_km, params.limit)
        .await
    {
        Ok(farms) => HttpResponse::Ok().json(farms),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/nearest`
///
/// The single closest active farm to a point; `null` when nothing is
/// indexed.
pub async fn nearest(
    state: web::Data<AppState>,
    params: web::Query<NearestQueryParams>,
) -> HttpResponse {
    let (Some(lat), Some(lng)) = (params.lat, params.lng) else {
        return invalid_request("lat and lng are required".to_string());
    };
    let point = match GeoPoint::new(lat, lng) {
        Ok(point) => point,
        Err(e) => return invalid_request(e.to_string()),
    };

    match state.service.discover_nearest(point).await {
        Ok(hit) => HttpResponse::Ok().json(hit.map(ApiNearestFarm::from)),
        Err(e) => error_response(&e),
    }
}

/// Parses a bounding box string `"west,south,east,north"` into a
/// [`Viewport`].
fn parse_viewport(s: &str) -> Option<Viewport> {
    let parts: Vec<f64> = s.split(',').filter_map(|p| p.trim().parse().ok()).collect();
    if parts.len() == 4 {
        Viewport::new(parts[3], parts[1], parts[2], parts[0]).ok()
    } else {
        None
    }
}

fn invalid_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiError {
        error: "invalid_request".to_string(),
        message,
    })
}

/// Maps a discovery failure onto the HTTP error contract: input errors
/// are the caller's fault, unknown ids are 404, and a store that stayed
/// unavailable through every retry is 503.
fn error_response(err: &DiscoveryError) -> HttpResponse {
    match err {
        DiscoveryError::Spatial(
            SpatialError::Geo(_)
            | SpatialError::InvalidRadius { .. }
            | SpatialError::InvalidLimit { .. },
        ) => invalid_request(err.to_string()),
        DiscoveryError::Spatial(SpatialError::NotFound { .. }) => {
            HttpResponse::NotFound().json(ApiError {
                error: "not_found".to_string(),
                message: err.to_string(),
            })
        }
        DiscoveryError::Spatial(SpatialError::Unavailable { .. })
        | DiscoveryError::StorageTimeout { .. } => {
            log::error!("Discovery backend unavailable: {err}");
            HttpResponse::ServiceUnavailable().json(ApiError {
                error: "unavailable".to_string(),
                message: err.to_string(),
            })
        }
    }
}
