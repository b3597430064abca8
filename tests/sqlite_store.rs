//! SQLite calibration store, including persistence across reopen.

use std::sync::mpsc::channel;

use tempfile::TempDir;

use stepdist::geo_utils::offset_north;
use stepdist::{
    CalibrationStore, GpsPoint, LocationFix, MotionSample, PersistedCalibration, SqliteStore,
    StepDistConfig, StepDistEngine,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("stepdist.db").to_string_lossy().to_string()
}

fn walking(i: usize) -> MotionSample {
    let m = (i % 20) as f64;
    MotionSample::new(1.0 - (m - 10.0).abs() / 5.0, 0.0, 9.81, i as f64 * 0.1)
}

fn fix(meters_north: f64, timestamp: f64) -> LocationFix {
    let origin = GpsPoint::new(47.3769, 8.5417);
    LocationFix::new(offset_north(&origin, meters_north), 3.0, timestamp)
}

#[test]
fn test_empty_database() {
    init();
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::new(&db_path(&dir)).unwrap();
    assert_eq!(store.load().unwrap(), PersistedCalibration::default());
    assert!(store.path().ends_with("stepdist.db"));
}

#[test]
fn test_record_survives_reopen() {
    init();
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    {
        let mut store = SqliteStore::new(&path).unwrap();
        store.save_step_length(0.74, 1_700_000_000).unwrap();
        store.save_body_height(Some(1.82)).unwrap();
        // Overwrites replace the previous value
        store.save_step_length(0.76, 1_700_000_600).unwrap();
    }

    let store = SqliteStore::new(&path).unwrap();
    let record = store.load().unwrap();
    assert_eq!(record.step_length, Some(0.76));
    assert_eq!(record.last_calibrated, Some(1_700_000_600));
    assert_eq!(record.body_height, Some(1.82));
}

#[test]
fn test_clear_and_remove_body_height() {
    init();
    let mut store = SqliteStore::in_memory().unwrap();
    store.save_step_length(0.7, 42).unwrap();
    store.save_body_height(Some(1.7)).unwrap();

    store.save_body_height(None).unwrap();
    let record = store.load().unwrap();
    assert_eq!(record.body_height, None);
    assert_eq!(record.step_length, Some(0.7));

    store.clear().unwrap();
    assert_eq!(store.load().unwrap(), PersistedCalibration::default());
}

#[test]
fn test_engine_persists_calibration() {
    init();
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    {
        let store = SqliteStore::new(&path).unwrap();
        let (tx, _rx) = channel();
        let mut engine = StepDistEngine::new(Box::new(store), Box::new(tx)).unwrap();
        engine
            .start(StepDistConfig {
                horizontal_accuracy_filter: 5.0,
                horizontal_distance_filter: 0.0,
                distance_to_calibrate: 10.0,
                ..StepDistConfig::default()
            })
            .unwrap();

        for i in 0..77 {
            engine.feed_motion_sample(walking(i)).unwrap();
            engine.tick(i as f64 * 0.1).unwrap();
        }
        engine.feed_location_fix(fix(-80.0, 1.5), 7.6).unwrap();
        engine.feed_location_fix(fix(0.0, 4.5), 7.6).unwrap();
        engine.feed_location_fix(fix(12.0, 7.5), 7.6).unwrap();
        engine.stop();
    }

    let store = SqliteStore::new(&path).unwrap();
    let record = store.load().unwrap();
    let step_length = record.step_length.unwrap();
    assert!((step_length - 2.0).abs() < 1e-3);
    assert_eq!(record.last_calibrated, Some(7));

    // A fresh engine picks the record up
    let (tx, _rx) = channel();
    let engine = StepDistEngine::new(Box::new(store), Box::new(tx)).unwrap();
    assert!(engine.status().is_ready_to_start);
    assert_eq!(engine.persisted().step_length, Some(step_length));
}
