//! Step length calibration and distance blending.
//!
//! Two distance estimates run side by side:
//! - **calibrated**: steps times a step length derived from location fixes,
//! - **heuristic**: steps times `factor × body height × √frequency`.
//!
//! The reported distance is whichever of them is non-zero, or their average
//! when both are.
//!
//! Calibration watches a window of consecutive accurate fixes. Once the path
//! they trace is long enough, the steps counted between the first and last fix
//! of the window give the step length. An inaccurate fix discards the window.

use log::{debug, info};

use crate::config::StepDistConfig;
use crate::elevation::ElevationTracker;
use crate::geo_utils::haversine_distance;
use crate::{GpsPoint, LocationFix};

/// A completed calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Meters per step
    pub step_length: f64,
    /// Epoch seconds
    pub calibrated_at: i64,
    /// Path length the step length was derived from
    pub distance: f64,
    pub steps: u32,
}

/// What a location fix did to the calibration state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// Accurate but too close to the previous accurate fix, nothing was
    /// updated
    Ignored,
    /// Joined the calibration window
    Accepted,
    /// Too inaccurate: the calibration window was discarded
    Rejected { accuracy: f64 },
    /// Joined the window and completed a calibration
    Calibrated(Calibration),
}

/// Values reported with every distance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceUpdate {
    /// Meters, rounded
    pub distance: i64,
    pub total_steps: u32,
    /// Meters, rounded
    pub altitude_gain: i64,
}

/// Consecutive accurate fixes, reduced to what calibration needs.
#[derive(Debug, Clone, Copy)]
struct CalibrationWindow {
    /// Start of the window; its position does not count towards the distance
    start: f64,
    last: LocationFix,
    len: usize,
    /// Path length from the second fix onwards
    distance: f64,
}

impl CalibrationWindow {
    fn open(fix: LocationFix) -> Self {
        Self {
            start: fix.timestamp,
            last: fix,
            len: 1,
            distance: 0.0,
        }
    }

    fn extend(&mut self, fix: LocationFix) {
        if self.len >= 2 {
            self.distance += haversine_distance(&self.last.position, &fix.position);
        }
        self.last = fix;
        self.len += 1;
    }
}

#[derive(Debug, Clone)]
pub struct DistanceEstimator {
    horizontal_accuracy_filter: f64,
    horizontal_distance_filter: f64,
    vertical_accuracy_filter: f64,
    distance_to_calibrate: f64,
    step_length_factor: f64,
    calibration_enabled: bool,

    step_length: Option<f64>,
    body_height: Option<f64>,

    window: Option<CalibrationWindow>,
    last_processed: Option<GpsPoint>,
    calibration_in_progress: bool,

    steps_total: u32,
    steps_persistent: u32,
    steps_provisional: u32,
    distance_persistent: f64,
    distance_heuristic: f64,

    elevation: ElevationTracker,
}

impl DistanceEstimator {
    pub fn new(config: &StepDistConfig, step_length: Option<f64>, body_height: Option<f64>) -> Self {
        Self {
            horizontal_accuracy_filter: config.horizontal_accuracy_filter,
            horizontal_distance_filter: config.horizontal_distance_filter,
            vertical_accuracy_filter: config.vertical_accuracy_filter,
            distance_to_calibrate: config.distance_to_calibrate,
            step_length_factor: config.step_length_factor,
            calibration_enabled: config.enable_gps_calibration,
            step_length,
            body_height,
            window: None,
            last_processed: None,
            calibration_in_progress: false,
            steps_total: 0,
            steps_persistent: 0,
            steps_provisional: 0,
            distance_persistent: 0.0,
            distance_heuristic: 0.0,
            elevation: ElevationTracker::new(config.vertical_distance_filter as usize),
        }
    }

    pub fn step_length(&self) -> Option<f64> {
        self.step_length
    }

    pub fn body_height(&self) -> Option<f64> {
        self.body_height
    }

    pub fn set_body_height(&mut self, meters: Option<f64>) {
        self.body_height = meters;
    }

    /// Forget the calibrated step length. Distance already frozen into the
    /// persistent total is kept.
    pub fn clear_step_length(&mut self) {
        self.step_length = None;
    }

    pub fn disable_calibration(&mut self) {
        if self.calibration_enabled {
            info!("[Calibration] GPS calibration disabled for this session");
        }
        self.calibration_enabled = false;
        self.window = None;
        if self.calibration_in_progress {
            self.roll_provisional();
        }
    }

    pub fn calibration_in_progress(&self) -> bool {
        self.calibration_in_progress
    }

    /// Timestamp of the fix that opened the current calibration window.
    pub fn window_start(&self) -> Option<f64> {
        self.window.map(|w| w.start)
    }

    /// Length of the current calibration path in meters (0 without a window).
    pub fn candidate_distance(&self) -> f64 {
        self.window.map(|w| w.distance).unwrap_or(0.0)
    }

    /// Whether a measurement can produce a distance: a step length or body
    /// height is known, or the latest fix is accurate enough to calibrate.
    pub fn is_ready(&self, accuracy: Option<f64>) -> bool {
        accuracy.is_some_and(|a| a <= self.horizontal_accuracy_filter)
            || self.step_length.is_some()
            || self.body_height.is_some()
    }

    /// Update both estimates after the step count changed.
    pub fn on_step_count(&mut self, total_steps: u32, frequency: f64) -> DistanceUpdate {
        self.steps_provisional = total_steps.saturating_sub(self.steps_persistent);

        let new_steps = total_steps.saturating_sub(self.steps_total);
        let body_height = self.body_height.unwrap_or(0.0);
        if frequency.is_finite() && frequency > 0.0 {
            self.distance_heuristic +=
                new_steps as f64 * self.step_length_factor * body_height * frequency.sqrt();
        }
        self.steps_total = total_steps;

        self.current()
    }

    /// Current distance report without a step change.
    pub fn current(&self) -> DistanceUpdate {
        DistanceUpdate {
            distance: self.blended_distance(),
            total_steps: self.steps_total,
            altitude_gain: self.elevation.gain(),
        }
    }

    fn calibrated_distance(&self) -> f64 {
        self.distance_persistent + self.steps_provisional as f64 * self.step_length.unwrap_or(0.0)
    }

    fn blended_distance(&self) -> i64 {
        let calibrated = self.calibrated_distance();
        let heuristic = self.distance_heuristic;
        let blended = match (calibrated != 0.0, heuristic != 0.0) {
            (true, true) => (calibrated + heuristic) / 2.0,
            (true, false) => calibrated,
            (false, true) => heuristic,
            (false, false) => 0.0,
        };
        blended.round() as i64
    }

    /// Freeze the provisional steps at the current step length.
    fn roll_provisional(&mut self) {
        self.steps_persistent += self.steps_provisional;
        self.distance_persistent +=
            self.steps_provisional as f64 * self.step_length.unwrap_or(0.0);
        self.steps_provisional = 0;
        self.calibration_in_progress = false;
    }

    /// Process one location fix.
    ///
    /// `steps_between` counts the steps strictly between two epoch-second
    /// timestamps; `now` stamps a completed calibration.
    pub fn on_fix<F>(&mut self, fix: &LocationFix, now: f64, steps_between: F) -> FixOutcome
    where
        F: Fn(f64, f64) -> u32,
    {
        let accurate = fix.horizontal_accuracy <= self.horizontal_accuracy_filter;

        if !accurate {
            self.update_elevation(fix, false);
            self.window = None;
            if self.calibration_in_progress {
                self.roll_provisional();
            }
            info!(
                "[Calibration] Cancelled: horizontal accuracy {:.1} m exceeds {:.1} m",
                fix.horizontal_accuracy, self.horizontal_accuracy_filter
            );
            return FixOutcome::Rejected {
                accuracy: fix.horizontal_accuracy,
            };
        }

        // The distance filter only applies between accurate fixes
        if let Some(previous) = self.last_processed {
            if self.horizontal_distance_filter > 0.0
                && haversine_distance(&previous, &fix.position) < self.horizontal_distance_filter
            {
                return FixOutcome::Ignored;
            }
        }
        self.last_processed = Some(fix.position);
        self.update_elevation(fix, true);

        let window = match self.window.as_mut() {
            Some(window) => {
                window.extend(*fix);
                *window
            }
            None => {
                let window = CalibrationWindow::open(*fix);
                self.window = Some(window);
                window
            }
        };

        if !self.calibration_enabled || window.len < 3 {
            return FixOutcome::Accepted;
        }

        if window.distance >= self.distance_to_calibrate {
            self.calibration_in_progress = true;
            let steps = steps_between(window.start, window.last.timestamp);
            if steps == 0 {
                debug!(
                    "[Calibration] {:.1} m walked but no steps counted yet",
                    window.distance
                );
                return FixOutcome::Accepted;
            }

            let step_length = window.distance / steps as f64;
            self.step_length = Some(step_length);
            self.calibration_in_progress = false;
            info!(
                "[Calibration] Step length {:.3} m from {:.1} m over {} steps",
                step_length, window.distance, steps
            );
            return FixOutcome::Calibrated(Calibration {
                step_length,
                calibrated_at: now.floor() as i64,
                distance: window.distance,
                steps,
            });
        }

        if self.calibration_in_progress {
            self.roll_provisional();
        }
        FixOutcome::Accepted
    }

    fn update_elevation(&mut self, fix: &LocationFix, horizontally_accurate: bool) {
        let usable = match fix.vertical_accuracy {
            Some(vertical) => vertical <= self.vertical_accuracy_filter,
            None => horizontally_accurate,
        };
        if usable {
            self.elevation.push(fix.altitude);
        } else {
            self.elevation.clear_window();
        }
    }
}
