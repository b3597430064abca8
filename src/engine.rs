//! # StepDist Engine
//!
//! Control surface of a measurement session. The engine owns all per-session
//! state (step counter, calibration, elevation) plus the persisted record,
//! and reports through a [`StepDistListener`].
//!
//! ## Lifecycle
//!
//! ```text
//! new ──▶ start(config) ──▶ feed_motion_sample / tick / feed_location_fix ──▶ stop
//!              ▲                                                               │
//!              └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! `tick` is the heartbeat: every call processes the most recent motion
//! sample once. The engine never reads a clock; callers pass `now` in epoch
//! seconds. [`crate::StepDistSession`] drives it from a worker thread.

use log::{debug, info, warn};

use crate::config::StepDistConfig;
use crate::distance::{DistanceEstimator, DistanceUpdate, FixOutcome};
use crate::error::{OptionExt, Result, StepDistError};
use crate::events::{StatusInfo, StatusNotice, StepDistListener};
use crate::persistence::{CalibrationStore, PersistedCalibration};
use crate::step_counter::StepCounter;
use crate::{LocationFix, MotionSample};

/// Seconds of ticks without any motion sample before the motion source is
/// reported as unavailable.
pub const MOTION_TIMEOUT_SECS: f64 = 2.0;

// ============================================================================
// Session state
// ============================================================================

/// Everything that lives only while measuring.
struct Measurement {
    config: StepDistConfig,
    counter: StepCounter,
    distance: DistanceEstimator,
    latest_sample: Option<MotionSample>,
    ticks_without_motion: u32,
    motion_timeout_ticks: u32,
    motion_reported: bool,
    last_accuracy: Option<f64>,
}

impl Measurement {
    fn new(config: StepDistConfig, persisted: &PersistedCalibration) -> Self {
        let motion_timeout_ticks = (MOTION_TIMEOUT_SECS / config.update_interval).round().max(1.0) as u32;
        Self {
            counter: StepCounter::new(&config),
            distance: DistanceEstimator::new(&config, persisted.step_length, persisted.body_height),
            config,
            latest_sample: None,
            ticks_without_motion: 0,
            motion_timeout_ticks,
            motion_reported: false,
            last_accuracy: None,
        }
    }
}

// ============================================================================
// StepDist Engine
// ============================================================================

/// The step counting and distance engine.
pub struct StepDistEngine {
    store: Box<dyn CalibrationStore>,
    listener: Box<dyn StepDistListener>,
    persisted: PersistedCalibration,
    location_available: bool,
    measurement: Option<Measurement>,
}

impl StepDistEngine {
    /// Create an engine and load the persisted calibration record.
    pub fn new(
        store: Box<dyn CalibrationStore>,
        listener: Box<dyn StepDistListener>,
    ) -> Result<Self> {
        let persisted = store.load()?;
        info!(
            "[StepDist] Engine created (step length {:?}, body height {:?})",
            persisted.step_length, persisted.body_height
        );
        Ok(Self {
            store,
            listener,
            persisted,
            location_available: true,
            measurement: None,
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start (or restart) a measurement.
    ///
    /// The configuration is validated first; on error nothing changes. All
    /// transient state is reset, the persisted record is reloaded but never
    /// overwritten.
    pub fn start(&mut self, config: StepDistConfig) -> Result<()> {
        config.validate()?;
        self.persisted = self.store.load()?;

        let mut measurement = Measurement::new(config, &self.persisted);
        if !self.location_available {
            measurement.distance.disable_calibration();
        }
        info!(
            "[StepDist] Measurement started (interval {}s, RT {}, calibration {})",
            measurement.config.update_interval,
            measurement.config.smoothing_timeframe,
            measurement.config.enable_gps_calibration && self.location_available
        );
        self.measurement = Some(measurement);

        self.listener.on_distance_changed(0, 0, 0);
        self.emit_status(None);
        Ok(())
    }

    /// Stop measuring and discard all transient state.
    pub fn stop(&mut self) {
        if let Some(measurement) = self.measurement.take() {
            info!(
                "[StepDist] Measurement stopped after {} steps",
                measurement.counter.total_steps()
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.measurement.is_some()
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    /// Store the latest gravity vector; the next tick consumes it.
    pub fn feed_motion_sample(&mut self, sample: MotionSample) -> Result<()> {
        if !sample.is_valid() {
            return Err(StepDistError::InvalidInput {
                message: "motion sample contains non-finite values".to_string(),
            });
        }
        let measurement = self.measurement.as_mut().ok_or_not_running("feed_motion_sample")?;
        measurement.latest_sample = Some(sample);
        Ok(())
    }

    /// Run one step counter cycle at `now` (epoch seconds).
    pub fn tick(&mut self, now: f64) -> Result<()> {
        let measurement = self.measurement.as_mut().ok_or_not_running("tick")?;

        let Some(sample) = measurement.latest_sample else {
            measurement.ticks_without_motion += 1;
            if !measurement.motion_reported
                && measurement.ticks_without_motion >= measurement.motion_timeout_ticks
            {
                measurement.motion_reported = true;
                warn!(
                    "[StepDist] No motion samples after {:.1}s, step counting unavailable",
                    MOTION_TIMEOUT_SECS
                );
                self.emit_status(Some(StatusNotice::MotionUnavailable));
            }
            return Ok(());
        };

        let updates = measurement.counter.tick(&sample, now);
        // An open calibration window still needs its steps
        let keep_from = measurement.distance.window_start();
        measurement.counter.prune(now, keep_from);
        let mut distances: Vec<DistanceUpdate> = Vec::with_capacity(updates.len());
        for update in &updates {
            distances.push(
                measurement
                    .distance
                    .on_step_count(update.total_steps, update.frequency),
            );
        }

        for (update, distance) in updates.iter().zip(distances) {
            self.listener
                .on_step_count_changed(update.total_steps, update.frequency);
            self.listener.on_distance_changed(
                distance.distance,
                distance.total_steps,
                distance.altitude_gain,
            );
        }
        Ok(())
    }

    /// Process a location fix received at `now` (epoch seconds).
    pub fn feed_location_fix(&mut self, fix: LocationFix, now: f64) -> Result<()> {
        if !fix.is_valid() {
            return Err(StepDistError::InvalidInput {
                message: format!(
                    "invalid location fix ({}, {}) ±{}",
                    fix.position.latitude, fix.position.longitude, fix.horizontal_accuracy
                ),
            });
        }
        let measurement = self.measurement.as_mut().ok_or_not_running("feed_location_fix")?;

        let counter = &measurement.counter;
        let outcome = measurement
            .distance
            .on_fix(&fix, now, |start, end| counter.steps_between(start, end));
        measurement.last_accuracy = Some(fix.horizontal_accuracy);

        let mut write = Ok(());
        let notice = match outcome {
            FixOutcome::Ignored => {
                debug!("[StepDist] Fix within distance filter ignored");
                return Ok(());
            }
            FixOutcome::Accepted => None,
            FixOutcome::Rejected { accuracy } => Some(StatusNotice::CalibrationCancelled { accuracy }),
            FixOutcome::Calibrated(calibration) => {
                self.persisted.step_length = Some(calibration.step_length);
                self.persisted.last_calibrated = Some(calibration.calibrated_at);
                write = self
                    .store
                    .save_step_length(calibration.step_length, calibration.calibrated_at);
                if let Err(e) = &write {
                    warn!("[Calibration] Failed to persist step length: {}", e);
                }
                Some(StatusNotice::CalibrationCompleted {
                    step_length: calibration.step_length,
                })
            }
        };

        self.emit_status(notice);
        write
    }

    /// Set and persist the user's body height in meters.
    pub fn set_body_height(&mut self, meters: f64) -> Result<()> {
        let meters = Some(meters)
            .filter(|m| m.is_finite() && *m > 0.0)
            .ok_or_invalid("body height must be a positive number of meters")?;

        self.store.save_body_height(Some(meters))?;
        self.persisted.body_height = Some(meters);
        if let Some(measurement) = self.measurement.as_mut() {
            measurement.distance.set_body_height(Some(meters));
        }
        info!("[StepDist] Body height set to {:.2} m", meters);
        self.emit_status(None);
        Ok(())
    }

    /// Erase the persisted record: step length, calibration time and body
    /// height.
    pub fn reset_calibration(&mut self) -> Result<()> {
        self.store.clear()?;
        self.persisted = PersistedCalibration::default();
        if let Some(measurement) = self.measurement.as_mut() {
            measurement.distance.clear_step_length();
            measurement.distance.set_body_height(None);
        }
        info!("[StepDist] Calibration reset");
        self.emit_status(None);
        Ok(())
    }

    /// Report whether location access is available. Without it, calibration
    /// stays off until the next start.
    pub fn set_location_available(&mut self, available: bool) {
        self.location_available = available;
        if available {
            return;
        }
        if let Some(measurement) = self.measurement.as_mut() {
            measurement.distance.disable_calibration();
        }
        warn!("[StepDist] Location unavailable, step length calibration disabled");
        self.emit_status(Some(StatusNotice::LocationUnavailable));
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn status(&self) -> StatusInfo {
        self.status_with(None)
    }

    pub fn persisted(&self) -> PersistedCalibration {
        self.persisted
    }

    pub fn config(&self) -> Option<&StepDistConfig> {
        self.measurement.as_ref().map(|m| &m.config)
    }

    pub fn total_steps(&self) -> u32 {
        self.measurement
            .as_ref()
            .map(|m| m.counter.total_steps())
            .unwrap_or(0)
    }

    pub fn steps_per_minute(&self, now: f64) -> u32 {
        self.measurement
            .as_ref()
            .map(|m| m.counter.steps_per_minute(now))
            .unwrap_or(0)
    }

    /// Latest distance report (all zero when not running).
    pub fn distance(&self) -> DistanceUpdate {
        self.measurement
            .as_ref()
            .map(|m| m.distance.current())
            .unwrap_or(DistanceUpdate {
                distance: 0,
                total_steps: 0,
                altitude_gain: 0,
            })
    }

    fn status_with(&self, notice: Option<StatusNotice>) -> StatusInfo {
        let is_ready_to_start = match &self.measurement {
            Some(m) => m.distance.is_ready(m.last_accuracy),
            None => self.persisted.step_length.is_some() || self.persisted.body_height.is_some(),
        };
        StatusInfo {
            is_ready_to_start,
            step_length: self.persisted.step_length,
            last_calibrated: self.persisted.last_calibrated,
            body_height: self.persisted.body_height,
            notice,
        }
    }

    fn emit_status(&mut self, notice: Option<StatusNotice>) {
        let status = self.status_with(notice);
        self.listener.on_status_changed(&status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EngineEvent;
    use crate::persistence::MemoryStore;
    use crate::GpsPoint;
    use std::sync::mpsc::{channel, Receiver};

    fn engine_with(store: MemoryStore) -> (StepDistEngine, Receiver<EngineEvent>) {
        let (tx, rx) = channel();
        let engine = StepDistEngine::new(Box::new(store), Box::new(tx)).unwrap();
        (engine, rx)
    }

    fn walking(i: usize) -> MotionSample {
        let m = (i % 20) as f64;
        MotionSample::new(1.0 - (m - 10.0).abs() / 5.0, 0.0, 9.81, i as f64 * 0.1)
    }

    #[test]
    fn test_start_emits_initial_events() {
        let (mut engine, rx) = engine_with(MemoryStore::new());
        engine.start(StepDistConfig::default()).unwrap();

        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert_eq!(
            events[0],
            EngineEvent::Distance {
                distance_m: 0,
                total_steps: 0,
                altitude_gain_m: 0
            }
        );
        match events[1] {
            EngineEvent::Status(status) => assert!(!status.is_ready_to_start),
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_config_keeps_engine_stopped() {
        let (mut engine, rx) = engine_with(MemoryStore::new());
        let config = StepDistConfig {
            smoothing_timeframe: 0,
            ..StepDistConfig::default()
        };
        assert!(matches!(engine.start(config), Err(StepDistError::Config { .. })));
        assert!(!engine.is_running());
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn test_inputs_require_running_session() {
        let (mut engine, _rx) = engine_with(MemoryStore::new());
        assert!(matches!(
            engine.feed_motion_sample(walking(0)),
            Err(StepDistError::NotRunning { .. })
        ));
        assert!(matches!(engine.tick(0.0), Err(StepDistError::NotRunning { .. })));
        let fix = LocationFix::new(GpsPoint::new(47.0, 8.0), 3.0, 0.0);
        assert!(matches!(
            engine.feed_location_fix(fix, 0.0),
            Err(StepDistError::NotRunning { .. })
        ));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let (mut engine, _rx) = engine_with(MemoryStore::new());
        engine.start(StepDistConfig::default()).unwrap();

        let sample = MotionSample::new(f64::NAN, 0.0, 9.81, 0.0);
        assert!(matches!(
            engine.feed_motion_sample(sample),
            Err(StepDistError::InvalidInput { .. })
        ));
        let fix = LocationFix::new(GpsPoint::new(123.0, 8.0), 3.0, 0.0);
        assert!(matches!(
            engine.feed_location_fix(fix, 0.0),
            Err(StepDistError::InvalidInput { .. })
        ));
        assert!(engine.set_body_height(-1.0).is_err());
        assert!(engine.set_body_height(f64::INFINITY).is_err());
    }

    #[test]
    fn test_motion_unavailable_reported_once() {
        let (mut engine, rx) = engine_with(MemoryStore::new());
        engine.start(StepDistConfig::default()).unwrap();
        rx.try_iter().count();

        for i in 0..19 {
            engine.tick(i as f64 * 0.1).unwrap();
        }
        assert_eq!(rx.try_iter().count(), 0);

        for i in 19..100 {
            engine.tick(i as f64 * 0.1).unwrap();
        }
        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        match events[0] {
            EngineEvent::Status(status) => {
                assert_eq!(status.notice, Some(StatusNotice::MotionUnavailable))
            }
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[test]
    fn test_walk_with_body_height() {
        let (mut engine, rx) = engine_with(MemoryStore::new());
        engine.set_body_height(1.8).unwrap();
        engine.start(StepDistConfig::default()).unwrap();
        rx.try_iter().count();

        for i in 0..200 {
            engine.feed_motion_sample(walking(i)).unwrap();
            engine.tick(i as f64 * 0.1).unwrap();
        }
        assert_eq!(engine.total_steps(), 18);

        let events: Vec<EngineEvent> = rx.try_iter().collect();
        let steps: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::StepCount { total_steps, .. } => Some(*total_steps),
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec![6, 8, 10, 12, 14, 16, 18]);

        // 18 steps × 0.33 × 1.8 m × √1 Hz = 10.69 m
        match events.last() {
            Some(EngineEvent::Distance {
                distance_m,
                total_steps,
                ..
            }) => {
                assert_eq!(*distance_m, 11);
                assert_eq!(*total_steps, 18);
            }
            other => panic!("expected distance, got {:?}", other),
        }
    }

    #[test]
    fn test_open_calibration_window_outlives_retention() {
        let (mut engine, _rx) = engine_with(MemoryStore::new());
        engine.start(StepDistConfig::default()).unwrap();
        let origin = GpsPoint::new(47.0, 8.0);
        let north = |meters: f64, timestamp: f64| {
            LocationFix::new(crate::geo_utils::offset_north(&origin, meters), 3.0, timestamp)
        };

        for i in 0..1000 {
            let now = i as f64 * 0.1;
            engine.feed_motion_sample(walking(i)).unwrap();
            engine.tick(now).unwrap();
            match i {
                16 => engine.feed_location_fix(north(0.0, 1.5), now).unwrap(),
                506 => engine.feed_location_fix(north(1000.0, 50.5), now).unwrap(),
                _ => {}
            }
        }
        // Steps at whole seconds 2..=99 s, the first ones far older than the
        // retention window
        engine.feed_location_fix(north(1098.0, 99.5), 99.9).unwrap();

        let step_length = engine.persisted().step_length.unwrap();
        assert!((step_length - 1.0).abs() < 1e-3);

        // Without an open window only the retention window is kept
        engine.stop();
        engine.start(StepDistConfig::default()).unwrap();
        for i in 0..1000 {
            engine.feed_motion_sample(walking(i)).unwrap();
            engine.tick(i as f64 * 0.1).unwrap();
        }
        let measurement = engine.measurement.as_ref().unwrap();
        assert_eq!(measurement.counter.total_steps(), 98);
        assert!(measurement.counter.retained_steps() <= 62);
    }

    #[test]
    fn test_stop_discards_session() {
        let (mut engine, _rx) = engine_with(MemoryStore::new());
        engine.start(StepDistConfig::default()).unwrap();
        for i in 0..100 {
            engine.feed_motion_sample(walking(i)).unwrap();
            engine.tick(i as f64 * 0.1).unwrap();
        }
        assert!(engine.total_steps() > 0);

        engine.stop();
        assert!(!engine.is_running());
        assert_eq!(engine.total_steps(), 0);

        engine.start(StepDistConfig::default()).unwrap();
        assert_eq!(engine.total_steps(), 0);
    }

    #[test]
    fn test_body_height_and_reset_persist() {
        let store = MemoryStore::with_record(PersistedCalibration {
            step_length: Some(0.7),
            last_calibrated: Some(1_600_000_000),
            body_height: None,
        });
        let (mut engine, rx) = engine_with(store.clone());
        assert!(engine.status().is_ready_to_start);

        engine.set_body_height(1.72).unwrap();
        assert_eq!(store.load().unwrap().body_height, Some(1.72));
        match rx.try_recv().unwrap() {
            EngineEvent::Status(status) => {
                assert_eq!(status.body_height, Some(1.72));
                assert_eq!(status.step_length, Some(0.7));
            }
            other => panic!("expected status, got {:?}", other),
        }

        engine.reset_calibration().unwrap();
        assert_eq!(store.load().unwrap(), PersistedCalibration::default());
        assert!(!engine.status().is_ready_to_start);
    }

    #[test]
    fn test_start_never_overwrites_persisted_record() {
        let record = PersistedCalibration {
            step_length: Some(0.74),
            last_calibrated: Some(1_700_000_000),
            body_height: Some(1.8),
        };
        let store = MemoryStore::with_record(record);
        let (mut engine, _rx) = engine_with(store.clone());

        engine.start(StepDistConfig::default()).unwrap();
        engine.stop();
        engine.start(StepDistConfig::default()).unwrap();

        assert_eq!(store.load().unwrap(), record);
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_location_unavailable() {
        let (mut engine, rx) = engine_with(MemoryStore::new());
        engine.start(StepDistConfig::default()).unwrap();
        rx.try_iter().count();

        engine.set_location_available(false);
        match rx.try_recv().unwrap() {
            EngineEvent::Status(status) => {
                assert_eq!(status.notice, Some(StatusNotice::LocationUnavailable))
            }
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[test]
    fn test_fix_reports_readiness() {
        let (mut engine, rx) = engine_with(MemoryStore::new());
        engine.start(StepDistConfig::default()).unwrap();
        rx.try_iter().count();

        engine
            .feed_location_fix(LocationFix::new(GpsPoint::new(47.0, 8.0), 25.0, 1.0), 1.0)
            .unwrap();
        engine
            .feed_location_fix(LocationFix::new(GpsPoint::new(47.001, 8.0), 5.0, 2.0), 2.0)
            .unwrap();

        let statuses: Vec<StatusInfo> = rx
            .try_iter()
            .filter_map(|e| match e {
                EngineEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(statuses.len(), 2);
        assert!(!statuses[0].is_ready_to_start);
        assert_eq!(
            statuses[0].notice,
            Some(StatusNotice::CalibrationCancelled { accuracy: 25.0 })
        );
        assert!(statuses[1].is_ready_to_start);
    }
}
