//! What gets drawn for a navigation result, and the surface it is drawn on.

use crate::geo_utils::segment_bounds;
use crate::matching::FallbackMatch;
use crate::{Bounds, Coordinate, PointOfInterest};

/// A drawing target (map view) for routes and markers.
pub trait RenderSurface {
    /// Draw `points` as a connected line with markers at `start` and `end`.
    fn draw_route(&mut self, points: &[Coordinate], start: &Coordinate, end: &Coordinate);

    /// Draw a single labelled marker.
    fn draw_marker(&mut self, at: &Coordinate, label: &str);
}

/// A matched route segment ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteView {
    /// Id of the recorded path the segment comes from
    pub path_id: String,
    /// Segment points in ascending path order
    pub points: Vec<Coordinate>,
    pub start_index: usize,
    pub end_index: usize,
    /// The user's location as read (before any rounding)
    pub origin: Coordinate,
    pub destination: PointOfInterest,
    /// Area to fit the view to
    pub bounds: Option<Bounds>,
    /// The match needed the coarsened current location
    pub used_rounded_location: bool,
}

impl RouteView {
    pub fn new(found: FallbackMatch, origin: Coordinate, destination: PointOfInterest) -> Self {
        let points = found.result.segment().to_vec();
        let bounds = segment_bounds(&points);
        Self {
            path_id: found.result.path.id,
            start_index: found.result.start_index,
            end_index: found.result.end_index,
            points,
            origin,
            destination,
            bounds,
            used_rounded_location: found.used_rounded,
        }
    }

    /// First and last point of the segment.
    pub fn endpoints(&self) -> Option<(&Coordinate, &Coordinate)> {
        Some((self.points.first()?, self.points.last()?))
    }

    /// Labels for per-point markers ("Path Point 1", ...), numbered by
    /// position in the recorded path.
    pub fn point_labels(&self) -> Vec<String> {
        (self.start_index..=self.end_index)
            .map(|i| format!("Path Point {}", i + 1))
            .collect()
    }
}

/// Draw a route: the segment with its endpoint markers, then the
/// destination marker.
pub fn render_route(view: &RouteView, surface: &mut dyn RenderSurface) {
    if let Some((start, end)) = view.endpoints() {
        surface.draw_route(&view.points, start, end);
    }
    surface.draw_marker(&view.destination.location, &view.destination.name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MatchResult, Path};

    #[derive(Default)]
    struct RecordingSurface {
        routes: Vec<(usize, Coordinate, Coordinate)>,
        markers: Vec<String>,
    }

    impl RenderSurface for RecordingSurface {
        fn draw_route(&mut self, points: &[Coordinate], start: &Coordinate, end: &Coordinate) {
            self.routes.push((points.len(), *start, *end));
        }

        fn draw_marker(&mut self, _at: &Coordinate, label: &str) {
            self.markers.push(label.to_string());
        }
    }

    fn view() -> RouteView {
        let path = Path::new(
            "2024-05-01_10-00-00",
            (0..5)
                .map(|i| Coordinate::new(0.0, i as f64 * 0.001, 0.0))
                .collect(),
        );
        let found = FallbackMatch {
            result: MatchResult {
                path,
                start_index: 1,
                end_index: 3,
            },
            query: Coordinate::new(0.0, 0.003, 0.0),
            used_rounded: false,
        };
        RouteView::new(
            found,
            Coordinate::new(0.0, 0.003, 0.0),
            PointOfInterest::new("Cafe", Coordinate::new(0.0, 0.001, 0.0)),
        )
    }

    #[test]
    fn test_route_view_from_match() {
        let view = view();
        assert_eq!(view.points.len(), 3);
        assert_eq!(view.points[0].y, 0.001);
        assert_eq!(view.bounds.unwrap().max_lng, 3.0 * 0.001);
        assert_eq!(
            view.point_labels(),
            vec!["Path Point 2", "Path Point 3", "Path Point 4"]
        );
    }

    #[test]
    fn test_render_route() {
        let view = view();
        let mut surface = RecordingSurface::default();
        render_route(&view, &mut surface);

        assert_eq!(surface.routes.len(), 1);
        let (count, start, end) = surface.routes[0];
        assert_eq!(count, 3);
        assert_eq!(start.y, 0.001);
        assert_eq!(end.y, 3.0 * 0.001);
        assert_eq!(surface.markers, vec!["Cafe"]);
    }
}
