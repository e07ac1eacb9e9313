#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Farm listing data types shared across the discovery system.
//!
//! This crate defines the canonical projection of a farm-shop listing used
//! by spatial queries and clustering ([`FarmPoint`]), the listing lifecycle
//! status, and the tier weights that give verified and featured listings
//! extra prominence on the map. The full directory record as exported by
//! the content pipeline ([`FarmRecord`]) also lives here so ingestion and
//! search indexing agree on one shape.

use chrono::{DateTime, Utc};
use farm_map_geo::{GeoError, GeoPoint};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Weight of a standard listing.
pub const TIER_WEIGHT_STANDARD: u32 = 1;

/// Weight of a listing whose ownership has been verified.
pub const TIER_WEIGHT_VERIFIED: u32 = 2;

/// Weight of a paid featured listing.
pub const TIER_WEIGHT_FEATURED: u32 = 3;

/// Lifecycle status of a farm listing.
///
/// Only [`FarmStatus::Active`] listings are visible to discovery queries;
/// the other states exist so ingestion can account for hidden records
/// without surfacing them.
#[derive(
    Debug,
    Default,
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
pub enum FarmStatus {
    /// Live listing, visible to discovery queries.
    #[default]
    Active,
    /// Submitted but not yet approved.
    Pending,
    /// Removed by moderation or at the owner's request.
    Suspended,
}

impl FarmStatus {
    /// Returns `true` if listings in this status are visible to queries.
    #[must_use]
    pub const fn is_queryable(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Minimal projection of a farm listing needed for spatial work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmPoint {
    /// Stable unique listing identifier.
    pub id: String,
    /// Display name of the farm shop.
    pub name: String,
    /// Latitude in WGS84 degrees.
    pub lat: f64,
    /// Longitude in WGS84 degrees.
    pub lng: f64,
    /// Lifecycle status; only active listings are queryable.
    pub status: FarmStatus,
    /// Cluster prominence weight, derived from the listing tier.
    pub tier_weight: u32,
}

impl FarmPoint {
    /// Returns the farm's coordinates as a validated [`GeoPoint`].
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidCoordinate`] if the stored latitude or
    /// longitude is out of WGS84 range, which ingestion should have
    /// rejected.
    pub fn location(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// One record of the farm directory snapshot as exported by the content
/// pipeline (`farms.uk.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmRecord {
    /// Stable unique listing identifier.
    pub id: String,
    /// Display name of the farm shop.
    pub name: String,
    /// Free-text description, when the owner provided one.
    #[serde(default)]
    pub description: Option<String>,
    /// Geographic location and address fragments.
    pub location: FarmLocation,
    /// Contact details, when known.
    #[serde(default)]
    pub contact: Option<FarmContact>,
    /// Lifecycle status; absent means active.
    #[serde(default)]
    pub status: FarmStatus,
    /// Whether the listing's ownership has been verified.
    #[serde(default)]
    pub verified: bool,
    /// Whether the listing is a paid featured placement.
    #[serde(default)]
    pub featured: bool,
    /// Last modification time of the source record.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FarmRecord {
    /// Cluster prominence weight for this record's tier.
    ///
    /// Featured listings outrank verified ones; everything else gets the
    /// standard weight.
    #[must_use]
    pub const fn tier_weight(&self) -> u32 {
        if self.featured {
            TIER_WEIGHT_FEATURED
        } else if self.verified {
            TIER_WEIGHT_VERIFIED
        } else {
            TIER_WEIGHT_STANDARD
        }
    }
}

/// Location block of a [`FarmRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmLocation {
    /// Latitude in WGS84 degrees.
    pub lat: f64,
    /// Longitude in WGS84 degrees.
    pub lng: f64,
    /// UK postcode, when known. Ingestion normalizes this to canonical
    /// `OUTWARD INWARD` form.
    #[serde(default)]
    pub postcode: Option<String>,
    /// County name, when known.
    #[serde(default)]
    pub county: Option<String>,
}

/// Contact block of a [`FarmRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmContact {
    /// Public website URL.
    #[serde(default)]
    pub website: Option<String>,
}

impl From<FarmRecord> for FarmPoint {
    fn from(record: FarmRecord) -> Self {
        let tier_weight = record.tier_weight();
        Self {
            id: record.id,
            name: record.name,
            lat: record.location.lat,
            lng: record.location.lng,
            status: record.status,
            tier_weight,
        }
    }
}
