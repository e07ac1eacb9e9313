//! Zoom-level to grid-cell-size mapping.
//!
//! The mapping is a lookup table rather than a continuous formula so that
//! clustering behavior at each zoom breakpoint is reproducible and can be
//! pinned by tests. Values were tuned against the UK directory dataset:
//! country-level zooms collapse whole regions into one marker, street-level
//! zooms effectively disable merging.

/// Lowest valid map zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Highest valid map zoom level.
pub const MAX_ZOOM: u8 = 22;

/// Grid cell size in degrees for each zoom level, indexed by zoom.
///
/// Monotonic non-increasing: higher zoom means smaller cells and less
/// aggressive merging.
pub const CELL_SIZES_BY_ZOOM: &[f64; 23] = &[
    10.0,    // 0: whole-world
    7.5,     // 1
    5.0,     // 2
    2.5,     // 3: country
    1.25,    // 4
    0.6,     // 5: region
    0.3,     // 6
    0.15,    // 7: county
    0.08,    // 8
    0.04,    // 9: town
    0.02,    // 10
    0.01,    // 11
    0.005,   // 12: neighbourhood
    0.0025,  // 13
    0.0012,  // 14
    0.0006,  // 15: street
    0.0003,  // 16
    0.00015, // 17
    0.00008, // 18
    0.00004, // 19
    0.00002, // 20
    0.00001, // 21
    5e-6,    // 22: individual markers
];

/// Clamps an arbitrary client-provided zoom into the valid range.
///
/// A bad zoom value degrades to the nearest breakpoint instead of failing
/// the whole response.
#[must_use]
pub fn clamp_zoom(zoom: i32) -> u8 {
    let clamped = zoom.clamp(i32::from(MIN_ZOOM), i32::from(MAX_ZOOM));
    u8::try_from(clamped).unwrap_or(MAX_ZOOM)
}

/// Grid cell size in degrees for the given zoom level.
///
/// Out-of-range zooms clamp to the nearest breakpoint.
#[must_use]
pub fn cell_size_for_zoom(zoom: u8) -> f64 {
    let index = usize::from(zoom.min(MAX_ZOOM));
    CELL_SIZES_BY_ZOOM[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_zoom_level() {
        assert_eq!(CELL_SIZES_BY_ZOOM.len(), usize::from(MAX_ZOOM) + 1);
    }

    #[test]
    fn cell_sizes_are_monotonic_non_increasing() {
        for window in CELL_SIZES_BY_ZOOM.windows(2) {
            assert!(
                window[0] >= window[1],
                "cell sizes must not grow with zoom: {} then {}",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn out_of_range_zoom_clamps() {
        assert_eq!(clamp_zoom(-5), MIN_ZOOM);
        assert_eq!(clamp_zoom(0), 0);
        assert_eq!(clamp_zoom(12), 12);
        assert_eq!(clamp_zoom(22), MAX_ZOOM);
        assert_eq!(clamp_zoom(200), MAX_ZOOM);

        assert!((cell_size_for_zoom(99) - cell_size_for_zoom(MAX_ZOOM)).abs() < f64::EPSILON);
    }
}
