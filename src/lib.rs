//! # StepDist
//!
//! Pedestrian dead-reckoning from a phone's gravity sensor and occasional
//! location fixes.
//!
//! This library provides:
//! - Step counting from stride patterns in the 3-axis gravity signal
//! - Step length calibration from accurate location fixes
//! - Walking distance from calibrated step length and/or body height
//! - Relative elevation gain from fix altitudes
//!
//! ## Features
//!
//! - **`persistence`** - Enable the SQLite calibration store
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::mpsc::channel;
//! use stepdist::{MemoryStore, MotionSample, StepDistConfig, StepDistEngine};
//!
//! let (events, _rx) = channel();
//! let mut engine =
//!     StepDistEngine::new(Box::new(MemoryStore::new()), Box::new(events)).unwrap();
//! engine.start(StepDistConfig::default()).unwrap();
//!
//! for i in 0..100 {
//!     let t = i as f64 * 0.1;
//!     engine.feed_motion_sample(MotionSample::new(0.0, 0.0, 9.81, t)).unwrap();
//!     engine.tick(t).unwrap();
//! }
//! assert_eq!(engine.total_steps(), 0); // a phone lying still
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, StepDistError};

// Start configuration
pub mod config;
pub use config::{StepDistConfig, DEFAULT_SIMILARITY_DEPTH};

// Signal processing: extrema, smoothing, strides
pub mod extrema;
pub use extrema::{classify, Extremum};

pub mod smoothing;
pub use smoothing::smooth_window;

pub mod stride;
pub use stride::{similar, ExtremumPoint, Stride, StrideKind};

pub mod axis;
pub use axis::AxisWindow;

// Representative stride state machine
pub mod similarity;
pub use similarity::{SimilarityEngine, SimilarityParams, StrideOutcome, Verdict};

// Step timestamps
pub mod ledger;
pub use ledger::StepLedger;

pub mod step_counter;
pub use step_counter::{
    StepCountUpdate, StepCounter, BACKFILL_STEPS, LOCK_ALL_AFTER_STEPS, STEP_RETENTION_SECS,
};

// Geographic utilities (great-circle distance)
pub mod geo_utils;

// Calibration, distance and elevation
pub mod elevation;
pub use elevation::ElevationTracker;

pub mod distance;
pub use distance::{Calibration, DistanceEstimator, DistanceUpdate, FixOutcome};

// Persisted calibration record
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteStore;
pub use persistence::{CalibrationStore, MemoryStore, PersistedCalibration};

// Outbound notifications
pub mod events;
pub use events::{EngineEvent, EventLog, StatusInfo, StatusNotice, StepDistListener};

// Stateful engine and its worker
pub mod engine;
pub use engine::{StepDistEngine, MOTION_TIMEOUT_SECS};

pub mod session;
pub use session::{epoch_seconds, StepDistSession};

/// Initialize logging for Android
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("StepDistRust"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use stepdist::GpsPoint;
/// let point = GpsPoint::new(47.3769, 8.5417); // Zurich
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One reading of the gravity vector (m/s² per axis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Epoch seconds
    pub timestamp: f64,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self { x, y, z, timestamp }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A satellite position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub position: GpsPoint,
    /// Meters (radius of the 68% confidence circle)
    pub horizontal_accuracy: f64,
    /// Meters above the reference ellipsoid
    pub altitude: f64,
    /// Meters; absent on platforms that do not report it
    pub vertical_accuracy: Option<f64>,
    /// Epoch seconds
    pub timestamp: f64,
}

impl LocationFix {
    /// Fix without altitude information.
    pub fn new(position: GpsPoint, horizontal_accuracy: f64, timestamp: f64) -> Self {
        Self {
            position,
            horizontal_accuracy,
            altitude: 0.0,
            vertical_accuracy: None,
            timestamp,
        }
    }

    pub fn with_altitude(mut self, altitude: f64, vertical_accuracy: Option<f64>) -> Self {
        self.altitude = altitude;
        self.vertical_accuracy = vertical_accuracy;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.position.is_valid()
            && self.horizontal_accuracy.is_finite()
            && self.horizontal_accuracy >= 0.0
            && self.altitude.is_finite()
            && self.timestamp.is_finite()
            && self.vertical_accuracy.map_or(true, |v| v.is_finite())
    }
}
