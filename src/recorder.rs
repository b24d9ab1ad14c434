//! Recording of a walk into a path.
//!
//! `Idle -> Recording -> Idle`. Samples are appended while recording; on stop
//! a non-empty walk is persisted once under a timestamp id and an empty one
//! is discarded. The recorder has no event loop of its own: whoever receives
//! location samples calls [`PathRecorder::append`].

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};

use crate::store::{PathStore, WriteCallback};
use crate::{Coordinate, Path, PathMatchError, Result};

/// Format of persisted path ids (sortable local date-time).
pub const PATH_ID_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Path id for a walk saved at `at`.
///
/// Two walks saved within the same second share an id and the later one
/// replaces the earlier.
pub fn path_id_for(at: &DateTime<Local>) -> String {
    at.format(PATH_ID_FORMAT).to_string()
}

/// Platform permission check for live location access.
pub trait PermissionGate: Send + Sync {
    fn location_granted(&self) -> bool;
}

impl PermissionGate for bool {
    fn location_granted(&self) -> bool {
        *self
    }
}

impl PermissionGate for AtomicBool {
    fn location_granted(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// Accumulates location samples into a path during a tracking session.
pub struct PathRecorder {
    state: RecorderState,
    points: Vec<Coordinate>,
    store: Arc<dyn PathStore>,
    permission: Arc<dyn PermissionGate>,
    callback: Option<Arc<dyn WriteCallback>>,
}

impl PathRecorder {
    pub fn new(store: Arc<dyn PathStore>, permission: Arc<dyn PermissionGate>) -> Self {
        Self {
            state: RecorderState::Idle,
            points: Vec::new(),
            store,
            permission,
            callback: None,
        }
    }

    /// Report persistence outcomes to `callback`.
    pub fn with_callback(mut self, callback: Arc<dyn WriteCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn set_callback(&mut self, callback: Option<Arc<dyn WriteCallback>>) {
        self.callback = callback;
    }

    /// Begin a new walk.
    ///
    /// Calling this while already recording is a successful no-op and keeps
    /// the walk in progress.
    pub fn start(&mut self) -> Result<()> {
        if self.state == RecorderState::Recording {
            return Ok(());
        }

        if !self.permission.location_granted() {
            error!("[PathRecorder] Location permission not granted");
            return Err(PathMatchError::PermissionDenied);
        }

        self.points = Vec::new();
        self.state = RecorderState::Recording;
        info!("[PathRecorder] Recording started");
        Ok(())
    }

    /// Append a sample to the walk in progress.
    ///
    /// Returns `false` (and ignores the sample) when not recording or when
    /// the sample is not a valid location.
    pub fn append(&mut self, coordinate: Coordinate) -> bool {
        if self.state != RecorderState::Recording {
            debug!("[PathRecorder] Ignoring sample while idle");
            return false;
        }
        if !coordinate.is_valid() {
            warn!(
                "[PathRecorder] Dropping invalid sample ({}, {})",
                coordinate.x, coordinate.y
            );
            return false;
        }
        self.points.push(coordinate);
        true
    }

    /// Finish the walk, persisting it if it has any points.
    ///
    /// Returns the id the path was written under, or `None` if nothing was
    /// written (not recording, or no samples).
    pub fn stop(&mut self) -> Option<String> {
        self.stop_at(Local::now())
    }

    /// Like [`stop`](Self::stop) with an explicit save time.
    pub fn stop_at(&mut self, at: DateTime<Local>) -> Option<String> {
        if self.state != RecorderState::Recording {
            return None;
        }
        self.state = RecorderState::Idle;

        let points = mem::take(&mut self.points);
        if points.is_empty() {
            info!("[PathRecorder] Recording stopped with no points; nothing saved");
            return None;
        }

        let path = Path::new(path_id_for(&at), points);
        let result = self.store.save_path(&path);
        match &result {
            Ok(()) => info!(
                "[PathRecorder] Path {} saved with {} points",
                path.id,
                path.len()
            ),
            Err(e) => error!("[PathRecorder] Failed to save path {}: {}", path.id, e),
        }
        if let Some(callback) = &self.callback {
            callback.on_write_complete(&path.id, &result);
        }

        Some(path.id)
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// The walk in progress (empty when idle).
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }
}
