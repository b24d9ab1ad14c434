//! Persistence contracts for recorded paths and points of interest.
//!
//! Components receive their stores as trait objects at construction, so the
//! SQLite store and the in-memory store are interchangeable. Write outcomes
//! are reported to an optional [`WriteCallback`] as well as returned.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::{Coordinate, Path, PathMatchError, Result};

/// Persisted collection of recorded paths.
pub trait PathStore: Send + Sync {
    /// All stored paths with their points in recording order.
    fn list_paths(&self) -> Result<Vec<Path>>;

    /// Store a path under `path.id`, replacing any path with the same id.
    fn save_path(&self, path: &Path) -> Result<()>;
}

/// A stored point of interest whose location has not been decoded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub name: String,
    /// Location as stored (JSON `{x, y, z}`)
    pub payload: String,
}

/// Persisted collection of named points.
pub trait PointStore: Send + Sync {
    fn list_points(&self) -> Result<Vec<StoredPoint>>;

    /// Store `location` under `name`, replacing any existing entry.
    fn save_point(&self, name: &str, location: &Coordinate) -> Result<()>;

    fn delete_point(&self, name: &str) -> Result<()>;
}

/// Receives the outcome of store writes started by the recorder or registry.
pub trait WriteCallback: Send + Sync {
    /// `key` is the path id or point name that was written.
    fn on_write_complete(&self, key: &str, result: &Result<()>);
}

/// Encode a location the way point stores persist it.
pub fn encode_location(location: &Coordinate) -> Result<String> {
    serde_json::to_string(location).map_err(|e| PathMatchError::StoreWrite {
        message: format!("failed to encode location: {}", e),
    })
}

/// Decode a stored location payload.
pub fn decode_location(payload: &str) -> std::result::Result<Coordinate, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// In-memory store
// ============================================================================

/// A successful write recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRecord {
    Path { id: String, point_count: usize },
    Point { name: String },
    Delete { name: String },
}

/// In-memory path and point store.
///
/// Paths enumerate in ascending id order. Every successful write is logged,
/// and reads or writes can be made to fail for testing error handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    paths: Mutex<BTreeMap<String, Vec<Coordinate>>>,
    points: Mutex<BTreeMap<String, String>>,
    writes: Mutex<Vec<WriteRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with paths (not logged as writes).
    pub fn with_paths(paths: Vec<Path>) -> Self {
        let store = Self::new();
        {
            let mut stored = lock(&store.paths);
            for path in paths {
                stored.insert(path.id, path.points);
            }
        }
        store
    }

    /// Insert a raw point payload directly, bypassing encoding.
    pub fn insert_raw_point(&self, name: &str, payload: &str) {
        lock(&self.points).insert(name.to_string(), payload.to_string());
    }

    /// Successful writes in the order they happened.
    pub fn writes(&self) -> Vec<WriteRecord> {
        lock(&self.writes).clone()
    }

    pub fn path(&self, id: &str) -> Option<Path> {
        lock(&self.paths)
            .get(id)
            .map(|points| Path::new(id, points.clone()))
    }

    pub fn path_count(&self) -> usize {
        lock(&self.paths).len()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PathMatchError::StoreRead {
                message: "memory store read failure".to_string(),
            });
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PathMatchError::StoreWrite {
                message: "memory store write failure".to_string(),
            });
        }
        Ok(())
    }
}

impl PathStore for MemoryStore {
    fn list_paths(&self) -> Result<Vec<Path>> {
        self.check_read()?;
        Ok(lock(&self.paths)
            .iter()
            .map(|(id, points)| Path::new(id.clone(), points.clone()))
            .collect())
    }

    fn save_path(&self, path: &Path) -> Result<()> {
        self.check_write()?;
        lock(&self.paths).insert(path.id.clone(), path.points.clone());
        lock(&self.writes).push(WriteRecord::Path {
            id: path.id.clone(),
            point_count: path.points.len(),
        });
        Ok(())
    }
}

impl PointStore for MemoryStore {
    fn list_points(&self) -> Result<Vec<StoredPoint>> {
        self.check_read()?;
        Ok(lock(&self.points)
            .iter()
            .map(|(name, payload)| StoredPoint {
                name: name.clone(),
                payload: payload.clone(),
            })
            .collect())
    }

    fn save_point(&self, name: &str, location: &Coordinate) -> Result<()> {
        self.check_write()?;
        let payload = encode_location(location)?;
        lock(&self.points).insert(name.to_string(), payload);
        lock(&self.writes).push(WriteRecord::Point {
            name: name.to_string(),
        });
        Ok(())
    }

    fn delete_point(&self, name: &str) -> Result<()> {
        self.check_write()?;
        lock(&self.points).remove(name);
        lock(&self.writes).push(WriteRecord::Delete {
            name: name.to_string(),
        });
        Ok(())
    }
}
