//! Validated map viewport bounds with wrap-safe longitude handling.

use serde::{Deserialize, Serialize};

use crate::{GeoError, GeoPoint, coords_valid};

/// A geographic rectangle in WGS84 degrees, as seen on a map.
///
/// `south < north` always holds. `west > east` is legal and encodes a
/// viewport spanning the antimeridian; all containment checks account for
/// it. The UK deployment never produces wrapped viewports, but a client
/// panning a world map can, and the contract must not misbehave when one
/// arrives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Northern latitude bound in degrees.
    pub north: f64,
    /// Southern latitude bound in degrees.
    pub south: f64,
    /// Eastern longitude bound in degrees.
    pub east: f64,
    /// Western longitude bound in degrees.
    pub west: f64,
}

impl Viewport {
    /// Creates a validated viewport.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidViewport`] if any bound is non-finite or
    /// out of range, or if `south >= north`.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, GeoError> {
        if !coords_valid(north, east) || !coords_valid(south, west) {
            return Err(GeoError::InvalidViewport {
                reason: format!("bounds out of range: north={north} south={south} east={east} west={west}"),
            });
        }
        if south >= north {
            return Err(GeoError::InvalidViewport {
                reason: format!("south ({south}) must be less than north ({north})"),
            });
        }

        Ok(Self {
            north,
            south,
            east,
            west,
        })
    }

    /// Returns `true` if the viewport spans the antimeridian.
    #[must_use]
    pub fn wraps_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Returns `true` if the point lies within the viewport, accounting
    /// for antimeridian wraps.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        if point.lat < self.south || point.lat > self.north {
            return false;
        }
        self.contains_lng(point.lng)
    }

    /// Wrap-safe longitude membership test.
    fn contains_lng(&self, lng: f64) -> bool {
        if self.wraps_antimeridian() {
            lng >= self.west || lng <= self.east
        } else {
            lng >= self.west && lng <= self.east
        }
    }

    /// Non-wrapping longitude spans covering the viewport.
    ///
    /// A wrapped viewport splits into two spans at the antimeridian so
    /// callers with rectangle-only index primitives can query each half.
    #[must_use]
    pub fn lng_spans(&self) -> Vec<(f64, f64)> {
        if self.wraps_antimeridian() {
            vec![(self.west, 180.0), (-180.0, self.east)]
        } else {
            vec![(self.west, self.east)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng).expect("valid test coordinate")
    }

    #[test]
    fn contains_point_in_simple_viewport() {
        let vp = Viewport::new(53.0, 51.0, 1.0, -1.0).expect("valid viewport");
        assert!(vp.contains(point(52.0, 0.0)));
        assert!(!vp.contains(point(54.0, 0.0)));
        assert!(!vp.contains(point(52.0, 2.0)));
    }

    #[test]
    fn boundary_points_are_inside() {
        let vp = Viewport::new(53.0, 51.0, 1.0, -1.0).expect("valid viewport");
        assert!(vp.contains(point(53.0, 1.0)));
        assert!(vp.contains(point(51.0, -1.0)));
    }

    #[test]
    fn wrapped_viewport_contains_both_sides_of_antimeridian() {
        let vp = Viewport::new(10.0, -10.0, -170.0, 170.0).expect("valid viewport");
        assert!(vp.wraps_antimeridian());
        assert!(vp.contains(point(0.0, 175.0)));
        assert!(vp.contains(point(0.0, -175.0)));
        assert!(!vp.contains(point(0.0, 0.0)));
    }

    #[test]
    fn rejects_inverted_latitudes() {
        assert!(Viewport::new(51.0, 53.0, 1.0, -1.0).is_err());
        assert!(Viewport::new(51.0, 51.0, 1.0, -1.0).is_err());
    }

    #[test]
    fn rejects_out_of_range_bounds() {
        assert!(Viewport::new(91.0, 51.0, 1.0, -1.0).is_err());
        assert!(Viewport::new(53.0, 51.0, 181.0, -1.0).is_err());
        assert!(Viewport::new(53.0, f64::NAN, 1.0, -1.0).is_err());
    }

    #[test]
    fn lng_spans_split_on_wrap() {
        let wrapped = Viewport::new(10.0, -10.0, -170.0, 170.0).expect("valid viewport");
        assert_eq!(wrapped.lng_spans(), vec![(170.0, 180.0), (-180.0, -170.0)]);

        let simple = Viewport::new(10.0, -10.0, 20.0, 10.0).expect("valid viewport");
        assert_eq!(simple.lng_spans(), vec![(10.0, 20.0)]);
    }
}
