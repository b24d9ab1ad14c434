//! R-tree prefilter over recorded paths.
//!
//! Each path is indexed by its bounding box. A query point can only resolve
//! within tolerance on a path whose box, grown by the tolerance, contains it,
//! so the index narrows the candidates before the exact haversine scan. The
//! degree buffer is deliberately generous: the index may keep paths that the
//! scan later rejects, but never drops one the scan would accept.

use std::collections::HashSet;

use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::meters_to_degrees;
use crate::{Bounds, Coordinate, Path};

/// Multiplier applied to the tolerance before converting it to degrees.
const BUFFER_SLACK: f64 = 2.0;

/// Latitude span (degrees) above which the prefilter is skipped entirely.
const MAX_BUFFER_DEGREES: f64 = 1.0;

/// A path's bounding box tagged with its position in the enumeration.
#[derive(Debug, Clone)]
pub struct PathEnvelope {
    pub position: usize,
    pub bounds: Bounds,
}

impl RTreeObject for PathEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

/// Spatial index of path bounding boxes.
#[derive(Debug)]
pub struct PathIndex {
    tree: RTree<PathEnvelope>,
    path_count: usize,
}

impl PathIndex {
    /// Index a snapshot of paths. Positions refer to this slice.
    pub fn new(paths: &[Path]) -> Self {
        let entries: Vec<PathEnvelope> = paths
            .iter()
            .enumerate()
            .filter_map(|(position, path)| {
                path.bounds().map(|bounds| PathEnvelope { position, bounds })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
            path_count: paths.len(),
        }
    }

    /// Number of paths in the indexed snapshot (including empty ones).
    pub fn path_count(&self) -> usize {
        self.path_count
    }

    /// Positions of paths that may contain both query points within
    /// `threshold_meters`, in ascending order.
    pub fn candidates(&self, a: &Coordinate, b: &Coordinate, threshold_meters: f64) -> Vec<usize> {
        let near_a = self.near(a, threshold_meters);
        if near_a.is_empty() {
            return Vec::new();
        }
        let near_b = self.near(b, threshold_meters);

        let mut positions: Vec<usize> = near_a.intersection(&near_b).copied().collect();
        positions.sort_unstable();
        positions
    }

    /// Positions of paths whose grown bounding box contains `query`.
    fn near(&self, query: &Coordinate, threshold_meters: f64) -> HashSet<usize> {
        if !query.x.is_finite()
            || !query.y.is_finite()
            || threshold_meters.is_nan()
            || threshold_meters < 0.0
        {
            return HashSet::new();
        }

        let (dlat, dlng) = meters_to_degrees(threshold_meters * BUFFER_SLACK, query.x);
        if !dlat.is_finite() || dlat > MAX_BUFFER_DEGREES {
            return self.tree.iter().map(|e| e.position).collect();
        }

        // Close to a pole every longitude is nearby
        let full_width = query.x.abs() + dlat >= 90.0 || dlng >= 180.0;
        let (min_lng, max_lng) = if full_width {
            (-180.0, 180.0)
        } else {
            (query.y - dlng, query.y + dlng)
        };

        let mut windows = vec![(min_lng, max_lng)];
        if !full_width {
            // Wrap across the antimeridian
            if min_lng < -180.0 {
                windows.push((min_lng + 360.0, max_lng + 360.0));
            }
            if max_lng > 180.0 {
                windows.push((min_lng - 360.0, max_lng - 360.0));
            }
        }

        let mut found = HashSet::new();
        for (lo, hi) in windows {
            let envelope = AABB::from_corners([lo, query.x - dlat], [hi, query.x + dlat]);
            found.extend(
                self.tree
                    .locate_in_envelope_intersecting(&envelope)
                    .map(|e| e.position),
            );
        }
        found
    }
}
