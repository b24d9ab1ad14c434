//! Segment matching against recorded paths.
//!
//! This module provides the core lookup:
//! - Nearest-point search on a single path, within a tolerance
//! - First path (in store order) on which both query points resolve
//! - The bounded retry with a coarsened current location
//! - Snapping a live reading onto the walk in progress

use log::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::geo_utils::{haversine_distance, round_coordinate};
use crate::spatial::PathIndex;
use crate::{Coordinate, MatchConfig, MatchResult, Path, PathMatchError, Result};

/// Index and distance of the point nearest to `query`.
///
/// Ties resolve to the lowest index. Returns `None` for an empty sequence or
/// when every distance is NaN.
pub fn nearest_index(points: &[Coordinate], query: &Coordinate) -> Option<(usize, f64)> {
    let mut nearest = None;
    let mut min_distance = f64::INFINITY;

    for (i, p) in points.iter().enumerate() {
        let d = haversine_distance(p, query);
        if d < min_distance {
            min_distance = d;
            nearest = Some(i);
        }
    }

    nearest.map(|i| (i, min_distance))
}

/// Index of the point nearest to `query`, accepted only if it lies within
/// `threshold_meters`.
///
/// # Example
/// ```
/// use path_matcher::{closest_index, Coordinate};
///
/// let points = vec![
///     Coordinate::new(0.0, 0.0, 0.0),
///     Coordinate::new(0.0, 0.001, 0.0),
/// ];
/// let near_second = Coordinate::new(0.0, 0.00101, 0.0);
/// assert_eq!(closest_index(&points, &near_second, 5.0), Some(1));
/// assert_eq!(closest_index(&points, &Coordinate::new(1.0, 1.0, 0.0), 5.0), None);
/// ```
pub fn closest_index(
    points: &[Coordinate],
    query: &Coordinate,
    threshold_meters: f64,
) -> Option<usize> {
    nearest_index(points, query)
        .filter(|&(_, distance)| distance <= threshold_meters)
        .map(|(i, _)| i)
}

/// Resolve both query points on one path.
fn match_path(
    path: &Path,
    a: &Coordinate,
    b: &Coordinate,
    threshold_meters: f64,
) -> Option<MatchResult> {
    let index_a = closest_index(&path.points, a, threshold_meters)?;
    let index_b = closest_index(&path.points, b, threshold_meters)?;

    Some(MatchResult {
        path: path.clone(),
        start_index: index_a.min(index_b),
        end_index: index_a.max(index_b),
    })
}

/// Find the first path on which both `a` and `b` resolve within tolerance.
///
/// Paths are tried in slice order and the first full match wins. The
/// returned indices are ascending regardless of which query matched which
/// end. Returns `None` if no path qualifies (always for an empty slice).
#[cfg(not(feature = "parallel"))]
pub fn find_segment(
    paths: &[Path],
    a: &Coordinate,
    b: &Coordinate,
    threshold_meters: f64,
) -> Option<MatchResult> {
    paths
        .iter()
        .find_map(|path| match_path(path, a, b, threshold_meters))
}

/// Find the first path on which both `a` and `b` resolve within tolerance.
///
/// Paths are resolved in parallel; `find_map_first` keeps the result of the
/// earliest path in slice order.
#[cfg(feature = "parallel")]
pub fn find_segment(
    paths: &[Path],
    a: &Coordinate,
    b: &Coordinate,
    threshold_meters: f64,
) -> Option<MatchResult> {
    paths
        .par_iter()
        .find_map_first(|path| match_path(path, a, b, threshold_meters))
}

/// Same result as [`find_segment`], scanning only the paths the index keeps.
///
/// `index` must have been built from `paths`.
pub fn find_segment_indexed(
    index: &PathIndex,
    paths: &[Path],
    a: &Coordinate,
    b: &Coordinate,
    threshold_meters: f64,
) -> Option<MatchResult> {
    let candidates = index.candidates(a, b, threshold_meters);

    #[cfg(not(feature = "parallel"))]
    let found = candidates.iter().find_map(|&position| {
        paths
            .get(position)
            .and_then(|path| match_path(path, a, b, threshold_meters))
    });

    #[cfg(feature = "parallel")]
    let found = candidates.par_iter().find_map_first(|&position| {
        paths
            .get(position)
            .and_then(|path| match_path(path, a, b, threshold_meters))
    });

    found
}

/// Outcome of a lookup that may have used the coarsened current location.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackMatch {
    pub result: MatchResult,
    /// The current-location query that produced the match
    pub query: Coordinate,
    /// Whether the match came from the rounded retry
    pub used_rounded: bool,
}

/// Look up a segment, retrying once with the current location rounded to
/// `decimals` places.
///
/// `search` is called with (current, destination). The retry is skipped when
/// rounding leaves latitude and longitude unchanged, so `search` runs at most
/// twice.
pub fn find_segment_with_fallback<F>(
    current: &Coordinate,
    destination: &Coordinate,
    decimals: u32,
    mut search: F,
) -> Result<FallbackMatch>
where
    F: FnMut(&Coordinate, &Coordinate) -> Option<MatchResult>,
{
    if let Some(result) = search(current, destination) {
        return Ok(FallbackMatch {
            result,
            query: *current,
            used_rounded: false,
        });
    }

    let rounded = round_coordinate(current, decimals);
    if rounded.x == current.x && rounded.y == current.y {
        info!(
            "[PathMatcher] No path found; location ({}, {}) already rounded, skipping retry",
            current.x, current.y
        );
        return Err(PathMatchError::NoConnectingPath {
            retried_rounded: false,
        });
    }

    debug!(
        "[PathMatcher] Retrying with rounded location ({}, {})",
        rounded.x, rounded.y
    );

    match search(&rounded, destination) {
        Some(result) => Ok(FallbackMatch {
            result,
            query: rounded,
            used_rounded: true,
        }),
        None => Err(PathMatchError::NoConnectingPath {
            retried_rounded: true,
        }),
    }
}

/// Replace `raw` with the nearest recorded point if it lies within
/// `threshold_meters`; otherwise keep `raw`.
///
/// Ties resolve to the lowest index, so snapping the same reading against
/// the same sequence always yields the same point.
pub fn snap_to_path(points: &[Coordinate], raw: &Coordinate, threshold_meters: f64) -> Coordinate {
    match nearest_index(points, raw) {
        Some((i, distance)) if distance <= threshold_meters => points[i],
        _ => *raw,
    }
}

/// Path lookup with a fixed tolerance and fallback policy.
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    config: MatchConfig,
}

impl PathMatcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Find a segment connecting `a` and `b` without any retry.
    pub fn find_segment(&self, paths: &[Path], a: &Coordinate, b: &Coordinate) -> Option<MatchResult> {
        let index = PathIndex::new(paths);
        find_segment_indexed(&index, paths, a, b, self.config.threshold_meters)
    }

    /// Find a segment from `current` to `destination`, retrying once with
    /// the current location coarsened.
    pub fn find_with_fallback(
        &self,
        paths: &[Path],
        current: &Coordinate,
        destination: &Coordinate,
    ) -> Result<FallbackMatch> {
        let index = PathIndex::new(paths);
        let threshold = self.config.threshold_meters;

        let outcome = find_segment_with_fallback(
            current,
            destination,
            self.config.fallback_decimals,
            |query, dest| find_segment_indexed(&index, paths, query, dest, threshold),
        );

        match &outcome {
            Ok(found) => info!(
                "[PathMatcher] Matched path {} [{}..={}]{}",
                found.result.path_id(),
                found.result.start_index,
                found.result.end_index,
                if found.used_rounded { " using rounded location" } else { "" }
            ),
            Err(e) => info!("[PathMatcher] {} ({} paths searched)", e, paths.len()),
        }

        outcome
    }
}
