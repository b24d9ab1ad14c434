//! # SQLite Store
//!
//! Durable [`PathStore`] and [`PointStore`] backed by a single SQLite file.
//!
//! ## Layout
//!
//! - `paths`: one row per recorded walk, points as a MessagePack blob
//! - `points_of_interest`: one row per bookmark, location as JSON text
//!
//! Both tables are keyed by the caller's id/name; saving an existing key
//! replaces the row.

use std::sync::Mutex;

use log::{debug, info, warn};
use rusqlite::{params, Connection, Result as SqlResult};

use crate::store::{encode_location, lock, PathStore, PointStore, StoredPoint};
use crate::{Coordinate, Path, PathMatchError, Result};

/// SQLite-backed path and point store.
pub struct SqliteStore {
    db: Mutex<Connection>,
    db_path: String,
}

impl SqliteStore {
    // ========================================================================
    // Initialization
    // ========================================================================

    /// Open (or create) the database at `db_path`.
    pub fn new(db_path: &str) -> SqlResult<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        info!("[SqliteStore] Opened {}", db_path);

        Ok(Self {
            db: Mutex::new(db),
            db_path: db_path.to_string(),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> SqlResult<Self> {
        Self::new(":memory:")
    }

    fn init_schema(conn: &Connection) -> SqlResult<()> {
        conn.execute_batch(
            r#"
            -- Recorded walks
            CREATE TABLE IF NOT EXISTS paths (
                id TEXT PRIMARY KEY,
                points BLOB NOT NULL,
                point_count INTEGER NOT NULL,
                created_at INTEGER DEFAULT (strftime('%s', 'now'))
            );

            -- Named bookmarks
            CREATE TABLE IF NOT EXISTS points_of_interest (
                name TEXT PRIMARY KEY,
                location TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn path_count(&self) -> Result<usize> {
        let db = lock(&self.db);
        let count: i64 = db.query_row("SELECT COUNT(*) FROM paths", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn write_error(what: &str, err: rusqlite::Error) -> PathMatchError {
    PathMatchError::StoreWrite {
        message: format!("{}: {}", what, err),
    }
}

impl PathStore for SqliteStore {
    fn list_paths(&self) -> Result<Vec<Path>> {
        let db = lock(&self.db);
        let mut stmt = db.prepare("SELECT id, points FROM paths ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((id, blob))
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        let paths: Vec<Path> = rows
            .into_iter()
            .filter_map(|(id, blob)| {
                match rmp_serde::from_slice::<Vec<Coordinate>>(&blob) {
                    Ok(points) => Some(Path::new(id, points)),
                    Err(e) => {
                        warn!("[SqliteStore] Skipping path {}: unreadable points ({})", id, e);
                        None
                    }
                }
            })
            .collect();

        debug!("[SqliteStore] Loaded {} paths", paths.len());
        Ok(paths)
    }

    fn save_path(&self, path: &Path) -> Result<()> {
        let blob = rmp_serde::to_vec(&path.points).map_err(|e| PathMatchError::StoreWrite {
            message: format!("failed to encode path {}: {}", path.id, e),
        })?;

        lock(&self.db)
            .execute(
                "INSERT OR REPLACE INTO paths (id, points, point_count) VALUES (?, ?, ?)",
                params![path.id, blob, path.points.len() as i64],
            )
            .map_err(|e| write_error("failed to save path", e))?;
        Ok(())
    }
}

impl PointStore for SqliteStore {
    fn list_points(&self) -> Result<Vec<StoredPoint>> {
        let db = lock(&self.db);
        let mut stmt = db.prepare("SELECT name, location FROM points_of_interest ORDER BY name")?;
        let points = stmt
            .query_map([], |row| {
                Ok(StoredPoint {
                    name: row.get(0)?,
                    payload: row.get(1)?,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(points)
    }

    fn save_point(&self, name: &str, location: &Coordinate) -> Result<()> {
        let payload = encode_location(location)?;
        lock(&self.db)
            .execute(
                "INSERT OR REPLACE INTO points_of_interest (name, location) VALUES (?, ?)",
                params![name, payload],
            )
            .map_err(|e| write_error("failed to save point", e))?;
        Ok(())
    }

    fn delete_point(&self, name: &str) -> Result<()> {
        lock(&self.db)
            .execute(
                "DELETE FROM points_of_interest WHERE name = ?",
                params![name],
            )
            .map_err(|e| write_error("failed to delete point", e))?;
        Ok(())
    }
}
