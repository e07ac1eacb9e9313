#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Farm directory snapshot ingestion.
//!
//! The live directory is exported as a single JSON array of farm records.
//! Ingestion parses that snapshot, drops records with invalid coordinates
//! so they can never reach a query, normalizes UK postcodes, and keeps
//! account of what was accepted and why anything was not.

pub mod postcode;

use std::path::Path;

use farm_map_farm_models::{FarmPoint, FarmRecord};
use farm_map_geo::coords_valid;
use thiserror::Error;

/// Errors produced while loading a snapshot.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The snapshot file could not be read.
    #[error("could not read {path}: {source}")]
    Io {
        /// Path of the snapshot file.
        path: String,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// The snapshot is not a valid JSON array of farm records.
    #[error("could not parse {path}: {source}")]
    Parse {
        /// Path or origin of the malformed payload.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// Ingest accounting, logged after every load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Records that passed coordinate validation.
    pub loaded: usize,
    /// Records rejected for out-of-range or non-finite coordinates.
    pub rejected_invalid: usize,
    /// Retained records whose status keeps them out of queries.
    pub skipped_inactive: usize,
}

/// A validated, normalized farm dataset plus its ingest accounting.
///
/// Non-active records are retained (the query layers hide them) so the
/// full directory stays available for administration and re-activation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Every record that passed coordinate validation.
    pub records: Vec<FarmRecord>,
    /// What was accepted, rejected and skipped.
    pub stats: IngestStats,
}

impl Snapshot {
    /// Spatial projections of the retained records.
    ///
    /// Status filtering is left to the spatial index so that invariant
    /// lives in one place.
    #[must_use]
    pub fn points(&self) -> Vec<FarmPoint> {
        self.records.iter().cloned().map(FarmPoint::from).collect()
    }
}

/// Loads and validates a farm directory snapshot from a JSON file.
///
/// # Errors
///
/// Returns [`IngestError::Io`] when the file cannot be read and
/// [`IngestError::Parse`] when it is not a JSON array of farm records.
pub fn load_snapshot(path: &Path) -> Result<Snapshot, IngestError> {
    let raw = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_snapshot(&raw, &path.display().to_string())
}

/// Parses a snapshot from raw JSON.
///
/// `origin` names the payload in errors and logs (a file path, a URL).
///
/// # Errors
///
/// Returns [`IngestError::Parse`] when the payload is not a JSON array of
/// farm records.
pub fn parse_snapshot(raw: &str, origin: &str) -> Result<Snapshot, IngestError> {
    let records: Vec<FarmRecord> =
        serde_json::from_str(raw).map_err(|source| IngestError::Parse {
            path: origin.to_string(),
            source,
        })?;

    Ok(ingest_records(records))
}

/// Validates and normalizes already-parsed records.
///
/// Records with invalid coordinates are dropped and counted; surviving
/// records get their postcode normalized in place.
#[must_use]
pub fn ingest_records(records: Vec<FarmRecord>) -> Snapshot {
    let mut stats = IngestStats::default();
    let mut kept = Vec::with_capacity(records.len());

    for mut record in records {
        if !coords_valid(record.location.lat, record.location.lng) {
            log::warn!(
                "Rejecting farm {id}: invalid coordinates ({lat}, {lng})",
                id = record.id,
                lat = record.location.lat,
                lng = record.location.lng
            );
            stats.rejected_invalid += 1;
            continue;
        }

        if let Some(raw) = record.location.postcode.take() {
            record.location.postcode = postcode::normalize(&raw);
        }

        if !record.status.is_queryable() {
            stats.skipped_inactive += 1;
        }
        stats.loaded += 1;
        kept.push(record);
    }

    log::info!(
        "Ingested {loaded} farm record(s), rejected {rejected} for invalid coordinates, {inactive} not queryable",
        loaded = stats.loaded,
        rejected = stats.rejected_invalid,
        inactive = stats.skipped_inactive
    );

    Snapshot {
        records: kept,
        stats,
    }
}
