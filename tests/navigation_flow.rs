//! End-to-end navigation flow against the in-memory store.
//!
//! Record a walk from a streamed subscription, bookmark a point while
//! walking, then navigate back to it and render the route.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use path_matcher::{
    render_route, Coordinate, LiveLocationSource, MatchConfig, MemoryStore, NavigationEngine,
    Path, PathMatchError, PathStore, PermissionGate, RenderSurface, Result, TrackingConfig,
};

/// Location source driven by the test: a settable fix plus a stream.
struct Walker {
    fix: Mutex<Coordinate>,
    stream: Mutex<Option<Sender<Coordinate>>>,
}

impl Walker {
    fn at(c: Coordinate) -> Self {
        Self {
            fix: Mutex::new(c),
            stream: Mutex::new(None),
        }
    }

    fn move_to(&self, c: Coordinate) {
        *self.fix.lock().unwrap() = c;
    }

    fn emit(&self, c: Coordinate) {
        self.move_to(c);
        let stream = self.stream.lock().unwrap();
        stream
            .as_ref()
            .expect("no subscription")
            .send(c)
            .expect("subscription closed");
    }
}

impl PermissionGate for Walker {
    fn location_granted(&self) -> bool {
        true
    }
}

impl LiveLocationSource for Walker {
    fn current(&self) -> Result<Coordinate> {
        Ok(*self.fix.lock().unwrap())
    }

    fn subscribe(&self, _interval: Duration) -> Receiver<Coordinate> {
        let (tx, rx) = mpsc::channel();
        *self.stream.lock().unwrap() = Some(tx);
        rx
    }
}

#[derive(Default)]
struct Canvas {
    lines: Vec<usize>,
    markers: Vec<String>,
}

impl RenderSurface for Canvas {
    fn draw_route(&mut self, points: &[Coordinate], _start: &Coordinate, _end: &Coordinate) {
        self.lines.push(points.len());
    }

    fn draw_marker(&mut self, _at: &Coordinate, label: &str) {
        self.markers.push(label.to_string());
    }
}

fn corridor() -> Vec<Coordinate> {
    (0..10)
        .map(|i| Coordinate::new(32.0, 34.0 + i as f64 * 0.00002, 0.0))
        .collect()
}

fn setup(store: &Arc<MemoryStore>, walker: &Arc<Walker>) -> NavigationEngine {
    let tracking = TrackingConfig {
        poll_interval: Duration::from_millis(5),
        ..TrackingConfig::default()
    };
    NavigationEngine::with_config(
        store.clone(),
        store.clone(),
        walker.clone(),
        MatchConfig::default(),
        tracking,
    )
}

fn wait_for_recording(engine: &NavigationEngine, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.recording_snapshot().len() < count {
        assert!(Instant::now() < deadline, "timed out waiting for samples");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_record_bookmark_and_navigate_back() {
    let store = Arc::new(MemoryStore::new());
    let walker = Arc::new(Walker::at(corridor()[0]));
    let mut engine = setup(&store, &walker);

    engine.start_tracking().unwrap();
    for p in corridor() {
        walker.emit(p);
    }
    wait_for_recording(&engine, 10);

    // Bookmark slightly off the corridor near its 8th point
    walker.move_to(Coordinate::new(32.000004, 34.000141, 2.0));
    let shoes = engine.bookmark_here("Shoes").unwrap();
    assert_eq!(shoes, corridor()[7]);

    let id = engine.stop_tracking().expect("walk should be saved");
    assert_eq!(store.path_count(), 1);
    assert_eq!(store.path(&id).unwrap().points, corridor());

    // Walk back to the start and navigate
    walker.move_to(Coordinate::new(32.0, 34.00002, 0.0));
    let view = engine.navigate_to("Shoes").unwrap();
    assert_eq!(view.path_id, id);
    assert_eq!((view.start_index, view.end_index), (1, 7));
    assert!(!view.used_rounded_location);
    assert_eq!(view.point_labels().first().map(String::as_str), Some("Path Point 2"));

    let mut canvas = Canvas::default();
    render_route(&view, &mut canvas);
    assert_eq!(canvas.lines, vec![7]);
    assert_eq!(canvas.markers, vec!["Shoes"]);
}

#[test]
fn test_navigation_falls_back_to_rounded_location() {
    // A walk that starts exactly on the 3-decimal grid
    let grid_walk = Path::new(
        "2024-05-01_12-00-00",
        (0..6)
            .map(|i| Coordinate::new(32.001, 34.001 + i as f64 * 0.00002, 0.0))
            .collect(),
    );
    let store = Arc::new(MemoryStore::with_paths(vec![grid_walk.clone()]));
    // ~5.8 m from the first point: too far for a direct match
    let walker = Arc::new(Walker::at(Coordinate::new(32.00104, 34.00104, 0.0)));
    let engine = setup(&store, &walker);

    engine.save_point("Exit", grid_walk.points[5]);
    let view = engine.navigate_to("Exit").unwrap();

    assert!(view.used_rounded_location);
    assert_eq!((view.start_index, view.end_index), (0, 5));
    assert_eq!(view.origin, Coordinate::new(32.00104, 34.00104, 0.0));
}

#[test]
fn test_first_path_in_store_order_wins() {
    let mut store_paths = Vec::new();
    for id in ["2024-05-02_08-00-00", "2024-05-01_08-00-00"] {
        store_paths.push(Path::new(id, corridor()));
    }
    let store = Arc::new(MemoryStore::with_paths(store_paths));
    let walker = Arc::new(Walker::at(corridor()[9]));
    let engine = setup(&store, &walker);

    engine.save_point("Start", corridor()[0]);
    let view = engine.navigate_to("Start").unwrap();
    assert_eq!(view.path_id, "2024-05-01_08-00-00");
    assert_eq!(store.list_paths().unwrap()[0].id, view.path_id);
}

#[test]
fn test_unknown_destination_and_missing_route() {
    let store = Arc::new(MemoryStore::with_paths(vec![Path::new(
        "2024-05-01_08-00-00",
        corridor(),
    )]));
    let walker = Arc::new(Walker::at(Coordinate::new(40.0, 40.0, 0.0)));
    let engine = setup(&store, &walker);

    assert!(matches!(
        engine.navigate_to("Shoes"),
        Err(PathMatchError::PointNotFound { .. })
    ));

    engine.save_point("Start", corridor()[0]);
    let err = engine.navigate_to("Start").unwrap_err();
    // (40.0, 40.0) is already on the grid, so no retry happens
    assert_eq!(
        err,
        PathMatchError::NoConnectingPath {
            retried_rounded: false
        }
    );
}
