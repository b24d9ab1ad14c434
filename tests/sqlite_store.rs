//! SQLite store integration tests.
//!
//! Run with: `cargo test --features persistence --test sqlite_store`

use std::sync::Arc;

use tempfile::TempDir;

use path_matcher::{
    Coordinate, Path, PathStore, PointOfInterestRegistry, PointStore, SqliteStore,
};

/// Helper: open a store in a fresh temp dir, return store + temp dir.
fn open_store() -> (SqliteStore, TempDir) {
    let tmp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = tmp_dir.path().join("paths.db");
    let store = SqliteStore::new(db_path.to_str().unwrap()).expect("failed to open store");
    (store, tmp_dir)
}

fn walk(n: usize) -> Vec<Coordinate> {
    (0..n)
        .map(|i| Coordinate::new(32.0 + i as f64 * 0.00001, 34.0, 3.0))
        .collect()
}

#[test]
fn test_paths_survive_reopen() {
    let (store, tmp_dir) = open_store();
    store
        .save_path(&Path::new("2024-05-01_08-00-00", walk(4)))
        .unwrap();
    store
        .save_path(&Path::new("2024-05-01_09-30-00", walk(2)))
        .unwrap();
    let db_path = store.db_path().to_string();
    drop(store);

    let reopened = SqliteStore::new(&db_path).unwrap();
    let paths = reopened.list_paths().unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].points, walk(4));
    assert_eq!(paths[1].id, "2024-05-01_09-30-00");
    drop(tmp_dir);
}

#[test]
fn test_registry_over_sqlite() {
    let (store, _tmp_dir) = open_store();
    let store = Arc::new(store);
    let registry = PointOfInterestRegistry::new(store.clone());

    assert!(registry.save("Cafe", Coordinate::new(32.0, 34.0, 1.0)));
    assert!(registry.save("Cafe", Coordinate::new(32.5, 34.5, 1.0)));
    assert!(!registry.save(" ", Coordinate::new(0.0, 0.0, 0.0)));

    let points = registry.load_all().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].location, Coordinate::new(32.5, 34.5, 1.0));

    registry.delete("Cafe");
    assert!(store.list_points().unwrap().is_empty());
}

#[test]
fn test_point_names_are_stored_verbatim() {
    let (store, _tmp_dir) = open_store();
    store
        .save_point("Gate 4 ", &Coordinate::new(1.0, 2.0, 0.0))
        .unwrap();

    let points = store.list_points().unwrap();
    assert_eq!(points[0].name, "Gate 4 ");
}
