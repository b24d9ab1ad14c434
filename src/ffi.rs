//! FFI bindings for mobile platforms (iOS/Android).
//!
//! The platform hands over a [`LocationProvider`] and a database path once via
//! [`engine_init`]; every other `engine_` call runs against that global
//! engine. Stateless helpers are prefixed with `ffi_`.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use once_cell::sync::Lazy;

use crate::matching::find_segment;
use crate::persistence::SqliteStore;
use crate::recorder::PermissionGate;
use crate::store::lock;
use crate::tracking::LiveLocationSource;
use crate::{
    haversine_distance, init_logging, Coordinate, NavigationEngine, Path, PathMatchError,
    PointOfInterest, Result, RouteView,
};

// ============================================================================
// Location Provider Interface
// ============================================================================

/// Location access implemented in Kotlin/Swift.
#[uniffi::export(callback_interface)]
pub trait LocationProvider: Send + Sync {
    /// Whether the app currently holds location permission.
    fn location_granted(&self) -> bool;

    /// A fresh one-shot reading, or `None` if no fix is available.
    fn current_location(&self) -> Option<Coordinate>;
}

/// Adapts the platform provider to the engine's location source. Live
/// samples arrive through [`engine_push_location`] and are forwarded to the
/// open subscription.
struct ProviderSource {
    provider: Box<dyn LocationProvider>,
    feed: Mutex<Option<Sender<Coordinate>>>,
}

impl ProviderSource {
    /// Forward a sample to the subscription. Returns `false` if none is open.
    fn feed(&self, coordinate: Coordinate) -> bool {
        let mut feed = lock(&self.feed);
        let delivered = feed
            .as_ref()
            .map(|tx| tx.send(coordinate).is_ok())
            .unwrap_or(false);
        if !delivered {
            // Receiver gone: the session ended
            feed.take();
        }
        delivered
    }

    fn close(&self) {
        lock(&self.feed).take();
    }
}

impl PermissionGate for ProviderSource {
    fn location_granted(&self) -> bool {
        self.provider.location_granted()
    }
}

impl LiveLocationSource for ProviderSource {
    fn current(&self) -> Result<Coordinate> {
        self.provider
            .current_location()
            .ok_or(PathMatchError::LocationUnavailable)
    }

    fn subscribe(&self, interval: Duration) -> Receiver<Coordinate> {
        debug!(
            "[PathMatcherRust] Subscription opened ({} ms)",
            interval.as_millis()
        );
        let (tx, rx) = mpsc::channel();
        *lock(&self.feed) = Some(tx);
        rx
    }
}

// ============================================================================
// FFI Types
// ============================================================================

/// A matched segment of a stored path.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSegment {
    pub path_id: String,
    pub start_index: u32,
    pub end_index: u32,
    pub points: Vec<Coordinate>,
}

/// A route ready to draw.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRoute {
    pub segment: FfiSegment,
    pub origin: Coordinate,
    pub destination: PointOfInterest,
    /// Per-point marker labels
    pub labels: Vec<String>,
    pub used_rounded_location: bool,
}

impl From<RouteView> for FfiRoute {
    fn from(view: RouteView) -> Self {
        let labels = view.point_labels();
        Self {
            segment: FfiSegment {
                path_id: view.path_id,
                start_index: view.start_index as u32,
                end_index: view.end_index as u32,
                points: view.points,
            },
            origin: view.origin,
            destination: view.destination,
            labels,
            used_rounded_location: view.used_rounded_location,
        }
    }
}

/// Outcome of a navigation request. Exactly one field is set.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNavigationResult {
    pub route: Option<FfiRoute>,
    /// User-facing message when no route could be produced
    pub error: Option<String>,
}

// ============================================================================
// Global Engine
// ============================================================================

struct EngineState {
    engine: NavigationEngine,
    source: Arc<ProviderSource>,
}

static ENGINE: Lazy<Mutex<Option<EngineState>>> = Lazy::new(|| Mutex::new(None));

fn with_engine<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut EngineState) -> R,
{
    let mut guard = lock(&*ENGINE);
    match guard.as_mut() {
        Some(state) => Some(f(state)),
        None => {
            warn!("[PathMatcherRust] Engine used before engine_init");
            None
        }
    }
}

/// Open the database at `db_path` and create the global engine.
///
/// Replaces (and stops) any previous engine. Returns `false` if the
/// database cannot be opened.
#[uniffi::export]
pub fn engine_init(db_path: String, provider: Box<dyn LocationProvider>) -> bool {
    init_logging();
    info!("[PathMatcherRust] engine_init({})", db_path);

    let store = match SqliteStore::new(&db_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("[PathMatcherRust] Failed to open {}: {}", db_path, e);
            return false;
        }
    };
    let source = Arc::new(ProviderSource {
        provider,
        feed: Mutex::new(None),
    });
    let engine = NavigationEngine::new(store.clone(), store, source.clone());

    *lock(&*ENGINE) = Some(EngineState { engine, source });
    true
}

// ============================================================================
// Tracking
// ============================================================================

/// Start recording. Returns `false` without location permission.
#[uniffi::export]
pub fn engine_start_tracking() -> bool {
    init_logging();
    with_engine(|state| match state.engine.start_tracking() {
        Ok(()) => true,
        Err(e) => {
            warn!("[PathMatcherRust] start_tracking failed: {}", e);
            false
        }
    })
    .unwrap_or(false)
}

/// Stop recording. Returns the id of the saved path, if any.
#[uniffi::export]
pub fn engine_stop_tracking() -> Option<String> {
    init_logging();
    with_engine(|state| {
        let id = state.engine.stop_tracking();
        state.source.close();
        id
    })
    .flatten()
}

#[uniffi::export]
pub fn engine_is_tracking() -> bool {
    init_logging();
    with_engine(|state| state.engine.is_tracking()).unwrap_or(false)
}

/// Deliver a live location sample. Returns `false` when not tracking.
#[uniffi::export]
pub fn engine_push_location(location: Coordinate) -> bool {
    init_logging();
    with_engine(|state| state.engine.is_tracking() && state.source.feed(location))
        .unwrap_or(false)
}

// ============================================================================
// Points of Interest
// ============================================================================

#[uniffi::export]
pub fn engine_save_point(name: String, location: Coordinate) -> bool {
    init_logging();
    with_engine(|state| state.engine.save_point(&name, location)).unwrap_or(false)
}

/// Bookmark the current location. Returns the stored location.
#[uniffi::export]
pub fn engine_bookmark_here(name: String) -> Option<Coordinate> {
    init_logging();
    with_engine(|state| match state.engine.bookmark_here(&name) {
        Ok(location) => Some(location),
        Err(e) => {
            warn!("[PathMatcherRust] bookmark_here({}) failed: {}", name, e);
            None
        }
    })
    .flatten()
}

#[uniffi::export]
pub fn engine_delete_point(name: String) {
    init_logging();
    with_engine(|state| state.engine.delete_point(&name));
}

#[uniffi::export]
pub fn engine_list_points() -> Vec<PointOfInterest> {
    init_logging();
    with_engine(|state| match state.engine.list_points() {
        Ok(points) => points,
        Err(e) => {
            warn!("[PathMatcherRust] list_points failed: {}", e);
            Vec::new()
        }
    })
    .unwrap_or_default()
}

// ============================================================================
// Navigation
// ============================================================================

/// Route from the current location to the named point.
#[uniffi::export]
pub fn engine_navigate_to(name: String) -> FfiNavigationResult {
    init_logging();
    let outcome = with_engine(|state| state.engine.navigate_to(&name));

    match outcome {
        Some(Ok(view)) => FfiNavigationResult {
            route: Some(view.into()),
            error: None,
        },
        Some(Err(e)) => {
            info!("[PathMatcherRust] navigate_to({}): {}", name, e);
            FfiNavigationResult {
                route: None,
                error: Some(e.to_string()),
            }
        }
        None => FfiNavigationResult {
            route: None,
            error: Some("Navigation engine not initialized".to_string()),
        },
    }
}

// ============================================================================
// Stateless Helpers
// ============================================================================

/// Find the first path connecting `current` and `destination`.
#[uniffi::export]
pub fn ffi_find_segment(
    paths: Vec<Path>,
    current: Coordinate,
    destination: Coordinate,
    threshold_meters: f64,
) -> Option<FfiSegment> {
    init_logging();
    debug!(
        "[PathMatcherRust] find_segment over {} paths (threshold {} m)",
        paths.len(),
        threshold_meters
    );
    find_segment(&paths, &current, &destination, threshold_meters).map(|m| FfiSegment {
        path_id: m.path.id.clone(),
        start_index: m.start_index as u32,
        end_index: m.end_index as u32,
        points: m.segment().to_vec(),
    })
}

/// Great-circle distance in meters between two coordinates.
#[uniffi::export]
pub fn ffi_distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    init_logging();
    haversine_distance(&a, &b)
}
