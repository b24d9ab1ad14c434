//! # Navigation Engine
//!
//! Application-level state for the navigation companion. The engine owns:
//! - The path and point stores
//! - The live location source
//! - The shared path recorder and the tracking session feeding it
//! - The point-of-interest registry
//! - The matcher and its configuration
//!
//! Platform code talks to the engine through a handful of calls (start/stop
//! tracking, bookmark, navigate) and never touches matching or storage
//! directly.

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::matching::PathMatcher;
use crate::poi::PointOfInterestRegistry;
use crate::recorder::{PathRecorder, PermissionGate};
use crate::render::{RenderSurface, RouteView};
use crate::store::{lock, PathStore, PointStore, WriteCallback};
use crate::tracking::{LiveLocationSource, TrackingConfig, TrackingSession};
use crate::{Coordinate, MatchConfig, PathMatchError, PointOfInterest, Result};

/// Lets the recorder consult the location source's permission.
struct SourcePermission(Arc<dyn LiveLocationSource>);

impl PermissionGate for SourcePermission {
    fn location_granted(&self) -> bool {
        self.0.location_granted()
    }
}

/// The main navigation engine.
pub struct NavigationEngine {
    paths: Arc<dyn PathStore>,
    location: Arc<dyn LiveLocationSource>,
    recorder: Arc<Mutex<PathRecorder>>,
    registry: PointOfInterestRegistry,
    session: Option<TrackingSession>,
    matcher: PathMatcher,
    tracking_config: TrackingConfig,
}

impl NavigationEngine {
    /// Create an engine with default configuration.
    pub fn new(
        paths: Arc<dyn PathStore>,
        points: Arc<dyn PointStore>,
        location: Arc<dyn LiveLocationSource>,
    ) -> Self {
        Self::with_config(
            paths,
            points,
            location,
            MatchConfig::default(),
            TrackingConfig::default(),
        )
    }

    /// Create an engine with custom configuration.
    pub fn with_config(
        paths: Arc<dyn PathStore>,
        points: Arc<dyn PointStore>,
        location: Arc<dyn LiveLocationSource>,
        match_config: MatchConfig,
        tracking_config: TrackingConfig,
    ) -> Self {
        let permission = Arc::new(SourcePermission(Arc::clone(&location)));
        let recorder = PathRecorder::new(Arc::clone(&paths), permission);
        let registry =
            PointOfInterestRegistry::new(points).with_threshold(match_config.threshold_meters);

        Self {
            paths,
            location,
            recorder: Arc::new(Mutex::new(recorder)),
            registry,
            session: None,
            matcher: PathMatcher::new(match_config),
            tracking_config,
        }
    }

    /// Report every store write outcome to `callback`.
    pub fn set_write_callback(&mut self, callback: Option<Arc<dyn WriteCallback>>) {
        lock(&self.recorder).set_callback(callback.clone());
        self.registry.set_callback(callback);
    }

    pub fn match_config(&self) -> &MatchConfig {
        self.matcher.config()
    }

    pub fn set_match_config(&mut self, config: MatchConfig) {
        self.registry.set_threshold(config.threshold_meters);
        self.matcher = PathMatcher::new(config);
    }

    // ========================================================================
    // Tracking
    // ========================================================================

    /// Start recording a walk from the location subscription.
    ///
    /// A no-op if already recording.
    pub fn start_tracking(&mut self) -> Result<()> {
        if self.is_tracking() {
            return Ok(());
        }

        // A previous session whose stream ended must not outlive this call
        if let Some(mut old) = self.session.take() {
            old.stop();
        }

        let session = TrackingSession::spawn(
            Arc::clone(&self.recorder),
            self.location.as_ref(),
            &self.tracking_config,
        )?;
        self.session = Some(session);
        Ok(())
    }

    /// Stop recording and persist the walk.
    ///
    /// Returns the id of the saved path, if anything was saved.
    pub fn stop_tracking(&mut self) -> Option<String> {
        match self.session.take() {
            Some(mut session) => session.stop(),
            None => lock(&self.recorder).stop(),
        }
    }

    pub fn is_tracking(&self) -> bool {
        lock(&self.recorder).is_recording()
    }

    /// Append a sample delivered by the platform. Ignored when not tracking.
    pub fn push_location(&self, coordinate: Coordinate) -> bool {
        lock(&self.recorder).append(coordinate)
    }

    /// Snapshot of the walk in progress.
    pub fn recording_snapshot(&self) -> Vec<Coordinate> {
        lock(&self.recorder).points().to_vec()
    }

    // ========================================================================
    // Points of interest
    // ========================================================================

    /// Save a point at an explicit location.
    pub fn save_point(&self, name: &str, location: Coordinate) -> bool {
        self.registry.save(name, location)
    }

    /// Bookmark the current location under `name`.
    ///
    /// While recording, the reading is snapped onto the walk in progress.
    /// Returns the stored location.
    pub fn bookmark_here(&self, name: &str) -> Result<Coordinate> {
        if name.trim().is_empty() {
            return Err(PathMatchError::InvalidInput {
                message: "point name must not be blank".to_string(),
            });
        }
        let raw = self.current_location()?;

        let location = if self.matcher.config().snap_to_recording {
            let recording = self.recording_snapshot();
            self.registry.snap(&raw, &recording)
        } else {
            raw
        };
        if location != raw {
            debug!(
                "[NavigationEngine] Snapped '{}' from ({}, {}) to ({}, {})",
                name, raw.x, raw.y, location.x, location.y
            );
        }

        self.registry.save(name, location);
        Ok(location)
    }

    pub fn delete_point(&self, name: &str) {
        self.registry.delete(name);
    }

    pub fn list_points(&self) -> Result<Vec<PointOfInterest>> {
        self.registry.load_all()
    }

    /// Draw a saved point as a single labelled marker.
    pub fn show_point(&self, name: &str, surface: &mut dyn RenderSurface) -> Result<()> {
        let point = self.registry.find(name)?;
        surface.draw_marker(&point.location, &point.name);
        Ok(())
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Find a recorded route from the current location to the named point.
    pub fn navigate_to(&self, name: &str) -> Result<RouteView> {
        let destination = self.registry.find(name)?;
        let origin = self.current_location()?;
        self.navigate_between(origin, destination)
    }

    /// Find a recorded route from `origin` to `destination`.
    pub fn navigate_between(
        &self,
        origin: Coordinate,
        destination: PointOfInterest,
    ) -> Result<RouteView> {
        let paths = self.paths.list_paths()?;
        debug!(
            "[NavigationEngine] Searching {} paths for a route to '{}'",
            paths.len(),
            destination.name
        );

        let found = self
            .matcher
            .find_with_fallback(&paths, &origin, &destination.location)?;
        let view = RouteView::new(found, origin, destination);

        info!(
            "[NavigationEngine] Route to '{}' via {} ({} points)",
            view.destination.name,
            view.path_id,
            view.points.len()
        );
        Ok(view)
    }

    fn current_location(&self) -> Result<Coordinate> {
        if !self.location.location_granted() {
            warn!("[NavigationEngine] Location permission not granted");
            return Err(PathMatchError::PermissionDenied);
        }
        let reading = self.location.current()?;
        if !reading.is_valid() {
            warn!(
                "[NavigationEngine] Discarding invalid location ({}, {})",
                reading.x, reading.y
            );
            return Err(PathMatchError::LocationUnavailable);
        }
        Ok(reading)
    }
}

impl Drop for NavigationEngine {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
