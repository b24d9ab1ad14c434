//! # Path Matcher
//!
//! Recorded-path matching for indoor navigation.
//!
//! A walk is recorded as a time-ordered sequence of coordinates. Later, given
//! the user's current location and a saved point of interest, the library
//! finds a recorded path passing near both and returns the segment between
//! them, ready to draw.
//!
//! This library provides:
//! - Haversine distance and nearest-point search over recorded paths
//! - Segment matching with a single coarsened-location retry
//! - A recording state machine that persists each finished walk once
//! - A point-of-interest registry with snapping onto the walk in progress
//!
//! ## Features
//!
//! - **`parallel`** - Resolve candidate paths in parallel with rayon
//! - **`persistence`** - SQLite-backed path and point stores
//! - **`ffi`** - FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use path_matcher::{find_segment, Coordinate, Path};
//!
//! let path = Path::new(
//!     "2024-05-01_10-00-00",
//!     vec![
//!         Coordinate::new(0.0, 0.0, 0.0),
//!         Coordinate::new(0.0, 0.001, 0.0),
//!         Coordinate::new(0.0, 0.002, 0.0),
//!     ],
//! );
//!
//! let here = Coordinate::new(0.0, 0.002, 0.0);
//! let cafe = Coordinate::new(0.0, 0.0, 0.0);
//!
//! let result = find_segment(&[path], &here, &cafe, 5.0).unwrap();
//! assert_eq!((result.start_index, result.end_index), (0, 2));
//! assert_eq!(result.segment().len(), 3);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, PathMatchError, Result};

// Geographic utilities (distance, rounding, bounds)
pub mod geo_utils;
pub use geo_utils::{haversine_distance, round_coordinate};

// Bounding-box prefilter over recorded paths
pub mod spatial;
pub use spatial::PathIndex;

// Nearest-point search and segment matching
pub mod matching;
pub use matching::{
    closest_index, find_segment, find_segment_with_fallback, snap_to_path, FallbackMatch,
    PathMatcher,
};

// Store contracts and the in-memory store
pub mod store;
pub use store::{MemoryStore, PathStore, PointStore, StoredPoint, WriteCallback, WriteRecord};

// Recording state machine
pub mod recorder;
pub use recorder::{path_id_for, PathRecorder, PermissionGate, RecorderState};

// Points of interest
pub mod poi;
pub use poi::PointOfInterestRegistry;

// Background tracking session
pub mod tracking;
pub use tracking::{LiveLocationSource, TrackingConfig, TrackingSession};

// Rendering contract
pub mod render;
pub use render::{render_route, RenderSurface, RouteView};

// Application-level engine tying the pieces together
pub mod engine;
pub use engine::NavigationEngine;

// SQLite persistence
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteStore;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("PathMatcherRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// Default matching tolerance in meters.
pub const DEFAULT_THRESHOLD_METERS: f64 = 5.0;

/// Decimal places kept when coarsening the current location for the retry.
pub const DEFAULT_FALLBACK_DECIMALS: u32 = 3;

/// A recorded location: latitude, longitude and altitude.
///
/// Only `x` and `y` take part in distance calculations; `z` is carried along
/// as an altitude (or floor) hint.
///
/// # Example
/// ```
/// use path_matcher::Coordinate;
/// let entrance = Coordinate::new(32.0853, 34.7818, 12.0);
/// assert!(entrance.is_valid());
/// assert!(!Coordinate::new(f64::NAN, 34.7818, 0.0).is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    /// Latitude in degrees
    pub x: f64,
    /// Longitude in degrees
    pub y: f64,
    /// Altitude in meters (or a floor proxy)
    pub z: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Check if the latitude/longitude are finite and in range.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.x >= -90.0
            && self.x <= 90.0
            && self.y >= -180.0
            && self.y <= 180.0
    }
}

/// Bounding box of a set of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from coordinates. Non-finite values are ignored.
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;
        let mut any = false;

        for p in points.iter().filter(|p| p.x.is_finite() && p.y.is_finite()) {
            min_lat = min_lat.min(p.x);
            max_lat = max_lat.max(p.x);
            min_lng = min_lng.min(p.y);
            max_lng = max_lng.max(p.y);
            any = true;
        }

        if !any {
            return None;
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }
}

/// A recorded walk: coordinates in the order they were sampled.
///
/// The id is the timestamp the path was saved at (`YYYY-MM-DD_HH-MM-SS`).
/// Paths are never modified once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Path {
    pub id: String,
    pub points: Vec<Coordinate>,
}

impl Path {
    pub fn new(id: impl Into<String>, points: Vec<Coordinate>) -> Self {
        Self {
            id: id.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points)
    }
}

/// A named, user-saved location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PointOfInterest {
    /// Unique, non-blank name (also the storage key)
    pub name: String,
    pub location: Coordinate,
}

impl PointOfInterest {
    pub fn new(name: impl Into<String>, location: Coordinate) -> Self {
        Self {
            name: name.into(),
            location,
        }
    }
}

/// A matched segment of a recorded path.
///
/// `start_index <= end_index` always holds, whichever query point resolved
/// to which end. Both indices are inclusive and valid for `path.points`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub path: Path,
    pub start_index: usize,
    pub end_index: usize,
}

impl MatchResult {
    /// The points to render, in ascending index order.
    pub fn segment(&self) -> &[Coordinate] {
        &self.path.points[self.start_index..=self.end_index]
    }

    pub fn path_id(&self) -> &str {
        &self.path.id
    }

    /// Both query points resolved to the same path point.
    pub fn is_single_point(&self) -> bool {
        self.start_index == self.end_index
    }
}

/// Configuration for path matching and point snapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MatchConfig {
    /// Maximum distance between a query point and its nearest path point.
    /// Also bounds how far a bookmark may be snapped.
    /// Default: 5.0 meters
    pub threshold_meters: f64,

    /// Decimal places the current location is rounded to for the retry.
    /// Default: 3 (~111 m grid)
    pub fallback_decimals: u32,

    /// Snap bookmarks saved while recording onto the walk in progress.
    /// Default: true
    pub snap_to_recording: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold_meters: DEFAULT_THRESHOLD_METERS,
            fallback_decimals: DEFAULT_FALLBACK_DECIMALS,
            snap_to_recording: true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_path() -> Path {
        Path::new(
            "2024-05-01_10-00-00",
            vec![
                Coordinate::new(0.0, 0.0, 0.0),
                Coordinate::new(0.0, 0.001, 0.0),
                Coordinate::new(0.0, 0.002, 0.0),
            ],
        )
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(32.0853, 34.7818, 0.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, 181.0, 0.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0, 0.0).is_valid());
    }

    #[test]
    fn test_bounds_from_points() {
        let bounds = sample_path().bounds().unwrap();
        assert_eq!(bounds.min_lng, 0.0);
        assert_eq!(bounds.max_lng, 0.002);

        assert!(Bounds::from_points(&[]).is_none());
        assert!(Bounds::from_points(&[Coordinate::new(f64::NAN, 1.0, 0.0)]).is_none());
    }

    #[test]
    fn test_match_result_segment() {
        let result = MatchResult {
            path: sample_path(),
            start_index: 1,
            end_index: 2,
        };
        assert_eq!(result.segment().len(), 2);
        assert_eq!(result.segment()[0].y, 0.001);
        assert!(!result.is_single_point());
        assert_eq!(result.path_id(), "2024-05-01_10-00-00");
    }

    #[test]
    fn test_coordinate_serializes_as_xyz() {
        let json = serde_json::to_string(&Coordinate::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(json, r#"{"x":1.0,"y":2.0,"z":3.0}"#);
    }

    #[test]
    fn test_default_config() {
        let config = MatchConfig::default();
        assert_eq!(config.threshold_meters, 5.0);
        assert_eq!(config.fallback_decimals, 3);
        assert!(config.snap_to_recording);
    }
}
