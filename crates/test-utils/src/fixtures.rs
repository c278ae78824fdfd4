//! Common test fixtures for streetmap tests.
//!
//! Coordinates are (lon, lat) in degrees unless noted otherwise.

/// Bounding boxes as (min_lon, max_lon, min_lat, max_lat).
pub mod bbox {
    /// Downtown Lansing, MI
    pub const LANSING: (f64, f64, f64, f64) = (-84.493675, -84.462183, 42.711814, 42.735481);

    /// Unit square at the origin
    pub const UNIT: (f64, f64, f64, f64) = (0.0, 1.0, 0.0, 1.0);

    /// 10 x 10 square at the origin
    pub const TEN: (f64, f64, f64, f64) = (0.0, 10.0, 0.0, 10.0);

    /// Single point (degenerate bbox)
    pub const POINT: (f64, f64, f64, f64) = (0.0, 0.0, 0.0, 0.0);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 5.0, 10.0, 5.0);
}

/// The Michigan State Capitol, inside [`bbox::LANSING`].
pub const MARKER_INSIDE: (f64, f64) = (-84.478404, 42.724459);

/// A point east of [`bbox::LANSING`].
pub const MARKER_OUTSIDE: (f64, f64) = (-84.40, 42.724459);

/// Michigan identifiers as the TIGER files spell them.
pub mod michigan {
    pub const STATE_FIPS: &str = "26";
    pub const INGHAM: &str = "065";
    pub const EATON: &str = "045";
    pub const CLINTON: &str = "037";
}
