//! Named point bookmarks.

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::matching::snap_to_path;
use crate::store::{decode_location, PointStore, WriteCallback};
use crate::{Coordinate, OptionExt, PointOfInterest, Result, DEFAULT_THRESHOLD_METERS};

/// Create, list and delete points of interest.
pub struct PointOfInterestRegistry {
    store: Arc<dyn PointStore>,
    callback: Option<Arc<dyn WriteCallback>>,
    threshold_meters: f64,
}

impl PointOfInterestRegistry {
    pub fn new(store: Arc<dyn PointStore>) -> Self {
        Self {
            store,
            callback: None,
            threshold_meters: DEFAULT_THRESHOLD_METERS,
        }
    }

    /// Report write outcomes to `callback`.
    pub fn with_callback(mut self, callback: Arc<dyn WriteCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn set_callback(&mut self, callback: Option<Arc<dyn WriteCallback>>) {
        self.callback = callback;
    }

    /// Maximum distance a bookmark is moved when snapping.
    pub fn with_threshold(mut self, threshold_meters: f64) -> Self {
        self.threshold_meters = threshold_meters;
        self
    }

    pub fn set_threshold(&mut self, threshold_meters: f64) {
        self.threshold_meters = threshold_meters;
    }

    /// Save `location` under `name`, replacing any existing entry.
    ///
    /// Returns `false` without touching the store if `name` is blank.
    /// Otherwise returns `true` once the write has been issued; whether it
    /// succeeded goes to the log and the write callback.
    pub fn save(&self, name: &str, location: Coordinate) -> bool {
        if name.trim().is_empty() {
            warn!("[PoiRegistry] Refusing to save point with blank name");
            return false;
        }

        let result = self.store.save_point(name, &location);
        match &result {
            Ok(()) => debug!("[PoiRegistry] Point of interest saved: {}", name),
            Err(e) => error!("[PoiRegistry] Failed to save point of interest {}: {}", name, e),
        }
        self.notify(name, &result);
        true
    }

    /// Save a bookmark for `raw`, moved onto the nearest point of the walk
    /// in progress when one lies within tolerance.
    pub fn save_snapped(&self, name: &str, raw: Coordinate, recording: &[Coordinate]) -> bool {
        self.save(name, self.snap(&raw, recording))
    }

    /// The location a bookmark for `raw` would be stored at.
    pub fn snap(&self, raw: &Coordinate, recording: &[Coordinate]) -> Coordinate {
        snap_to_path(recording, raw, self.threshold_meters)
    }

    /// Remove the entry for `name`. Blank names are ignored.
    pub fn delete(&self, name: &str) {
        if name.trim().is_empty() {
            return;
        }

        let result = self.store.delete_point(name);
        match &result {
            Ok(()) => debug!("[PoiRegistry] Point of interest deleted: {}", name),
            Err(e) => error!("[PoiRegistry] Failed to delete point of interest {}: {}", name, e),
        }
        self.notify(name, &result);
    }

    /// Every stored point of interest, in store order.
    ///
    /// Entries whose location cannot be decoded are skipped with a warning.
    /// A store failure is returned as an error, never as an empty list.
    pub fn load_all(&self) -> Result<Vec<PointOfInterest>> {
        let stored = self.store.list_points().map_err(|e| {
            error!("[PoiRegistry] Failed to load points of interest: {}", e);
            e
        })?;

        let points: Vec<PointOfInterest> = stored
            .into_iter()
            .filter_map(|entry| match decode_location(&entry.payload) {
                Ok(location) => Some(PointOfInterest::new(entry.name, location)),
                Err(e) => {
                    warn!(
                        "[PoiRegistry] Skipping point {}: unreadable location ({})",
                        entry.name, e
                    );
                    None
                }
            })
            .collect();

        info!("[PoiRegistry] Loaded {} points of interest", points.len());
        Ok(points)
    }

    /// Look up a single point of interest by exact name.
    pub fn find(&self, name: &str) -> Result<PointOfInterest> {
        self.load_all()?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_point_not_found(name)
    }

    fn notify(&self, key: &str, result: &Result<()>) {
        if let Some(callback) = &self.callback {
            callback.on_write_complete(key, result);
        }
    }
}
