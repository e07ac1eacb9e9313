#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geodesic distance primitives for farm discovery.
//!
//! Every distance computation in the system routes through this crate, so
//! precision and the Earth-radius constant are tuned in exactly one place
//! instead of drifting per call site.
//!
//! Coordinates are WGS84 degrees. [`GeoPoint`] and [`Viewport`] validate on
//! construction, so the distance functions never see NaN or out-of-range
//! input and never silently propagate it.

pub mod viewport;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use viewport::Viewport;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Kilometers per degree of latitude (and of longitude at the equator).
///
/// This is the meridian arc length of one degree, used both as the
/// latitude-delta lower bound in [`within_radius`] and for converting a
/// radius into a degree envelope in [`radius_envelope`].
pub const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// Cosine values below this are treated as "at the pole" when widening a
/// radius envelope: the longitude span degenerates to the full range.
const POLAR_COS_EPSILON: f64 = 1e-6;

/// Errors produced when validating coordinates or viewports.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// Latitude/longitude pair is NaN, infinite, or out of WGS84 range.
    #[error("invalid coordinate lat={lat} lng={lng}: expected lat in [-90, 90], lng in [-180, 180]")]
    InvalidCoordinate {
        /// The offending latitude in degrees.
        lat: f64,
        /// The offending longitude in degrees.
        lng: f64,
    },

    /// Viewport bounds are malformed (non-finite, out of range, or
    /// inverted latitudes).
    #[error("invalid viewport: {reason}")]
    InvalidViewport {
        /// Description of which bound failed validation.
        reason: String,
    },
}

/// A validated WGS84 coordinate pair in degrees.
///
/// Construction via [`GeoPoint::new`] is the only way to obtain one, which
/// guarantees every `GeoPoint` handed to the distance functions is finite
/// and in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, `[-90, 90]`.
    pub lat: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub lng: f64,
}

impl GeoPoint {
    /// Creates a validated coordinate pair.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidCoordinate`] if either component is NaN,
    /// infinite, or outside the WGS84 range.
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        if coords_valid(lat, lng) {
            Ok(Self { lat, lng })
        } else {
            Err(GeoError::InvalidCoordinate { lat, lng })
        }
    }
}

/// Returns `true` if the pair is finite and within WGS84 range.
#[must_use]
pub fn coords_valid(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

/// Great-circle distance between two points in kilometers.
///
/// Standard haversine formula. Identical points yield exactly `0.0`; the
/// function is symmetric in its arguments.
#[must_use]
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    if a.lat == b.lat && a.lng == b.lng {
        return 0.0;
    }

    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Planar (equirectangular) distance approximation in kilometers.
///
/// Cheap alternative to [`haversine_km`] for small separations, e.g.
/// comparing cluster centroids inside one viewport. Error stays well under
/// 1% for separations below ~100km at UK latitudes; do not use it for
/// cross-country distances.
#[must_use]
pub fn equirectangular_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let mean_lat = f64::midpoint(a.lat, b.lat).to_radians();
    let dx = (b.lng - a.lng).to_radians() * mean_lat.cos();
    let dy = (b.lat - a.lat).to_radians();

    EARTH_RADIUS_KM * dx.hypot(dy)
}

/// Returns `true` if `b` lies within `radius_km` of `a`.
///
/// Early-rejects on the latitude delta alone before computing the full
/// haversine: the meridian separation is a strict lower bound on the
/// great-circle distance, so any pair farther apart in latitude than the
/// radius cannot be inside it. This keeps radius filtering cheap when most
/// candidates are far away.
#[must_use]
pub fn within_radius(a: GeoPoint, b: GeoPoint, radius_km: f64) -> bool {
    let lat_delta_km = (a.lat - b.lat).abs() * KM_PER_DEGREE;
    if lat_delta_km > radius_km {
        return false;
    }

    haversine_km(a, b) <= radius_km
}

/// Degree-space envelope guaranteed to contain the circle of `radius_km`
/// around `center`.
///
/// Used to seed index lookups: everything outside the envelope is
/// definitely outside the radius, so only envelope hits need the exact
/// distance check. The longitude span is widened by the cosine at the
/// latitude band edge nearest a pole (where degrees of longitude are
/// shortest); if the band touches a pole the span degenerates to the full
/// longitude range.
#[must_use]
pub fn radius_envelope(center: GeoPoint, radius_km: f64) -> Viewport {
    let d_lat = radius_km / KM_PER_DEGREE;
    let north = (center.lat + d_lat).min(90.0);
    let south = (center.lat - d_lat).max(-90.0);

    // Longitude degrees are shortest at the band edge closest to a pole.
    let band_edge = north.abs().max(south.abs());
    let cos_edge = band_edge.to_radians().cos();

    let d_lng = if cos_edge <= POLAR_COS_EPSILON {
        180.0
    } else {
        (radius_km / (KM_PER_DEGREE * cos_edge)).min(180.0)
    };

    if d_lng >= 180.0 {
        return Viewport {
            north,
            south,
            east: 180.0,
            west: -180.0,
        };
    }

    // Normalize into [-180, 180]; west > east then encodes an
    // antimeridian wrap, which Viewport handles.
    let mut west = center.lng - d_lng;
    let mut east = center.lng + d_lng;
    if west < -180.0 {
        west += 360.0;
    }
    if east > 180.0 {
        east -= 360.0;
    }

    Viewport {
        north,
        south,
        east,
        west,
    }
}
