//! Outbound notifications.
//!
//! The engine reports through a [`StepDistListener`] that it calls
//! synchronously. Hosts that prefer a queue can pass an
//! `mpsc::Sender<EngineEvent>` instead; every event is also serializable to
//! JSON.

use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

/// One-off condition reported together with a status event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StatusNotice {
    /// A fix was too inaccurate; the calibration window was discarded
    CalibrationCancelled { accuracy: f64 },
    /// A new step length was derived and persisted
    #[serde(rename_all = "camelCase")]
    CalibrationCompleted { step_length: f64 },
    /// No motion sample arrived after start
    MotionUnavailable,
    /// Location access is missing; calibration is off for this session
    LocationUnavailable,
}

/// Readiness and calibration status.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub is_ready_to_start: bool,
    /// Meters per step
    pub step_length: Option<f64>,
    /// Epoch seconds
    pub last_calibrated: Option<i64>,
    /// Meters
    pub body_height: Option<f64>,
    pub notice: Option<StatusNotice>,
}

/// Receiver of engine notifications. Called on the thread that drives the
/// engine, so implementations should return quickly.
pub trait StepDistListener: Send {
    fn on_step_count_changed(&mut self, total_steps: u32, frequency_hz: f64);

    fn on_distance_changed(&mut self, distance_m: i64, total_steps: u32, altitude_gain_m: i64);

    fn on_status_changed(&mut self, status: &StatusInfo);
}

/// Engine notifications as values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    StepCount { total_steps: u32, frequency_hz: f64 },
    #[serde(rename_all = "camelCase")]
    Distance {
        distance_m: i64,
        total_steps: u32,
        altitude_gain_m: i64,
    },
    Status(StatusInfo),
}

impl EngineEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Forwards every notification into a channel. A disconnected receiver is
/// ignored.
impl StepDistListener for Sender<EngineEvent> {
    fn on_step_count_changed(&mut self, total_steps: u32, frequency_hz: f64) {
        let _ = self.send(EngineEvent::StepCount {
            total_steps,
            frequency_hz,
        });
    }

    fn on_distance_changed(&mut self, distance_m: i64, total_steps: u32, altitude_gain_m: i64) {
        let _ = self.send(EngineEvent::Distance {
            distance_m,
            total_steps,
            altitude_gain_m,
        });
    }

    fn on_status_changed(&mut self, status: &StatusInfo) {
        let _ = self.send(EngineEvent::Status(*status));
    }
}

/// Listener that records every event. Useful for tests and polling hosts.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub events: Vec<EngineEvent>,
}

impl StepDistListener for EventLog {
    fn on_step_count_changed(&mut self, total_steps: u32, frequency_hz: f64) {
        self.events.push(EngineEvent::StepCount {
            total_steps,
            frequency_hz,
        });
    }

    fn on_distance_changed(&mut self, distance_m: i64, total_steps: u32, altitude_gain_m: i64) {
        self.events.push(EngineEvent::Distance {
            distance_m,
            total_steps,
            altitude_gain_m,
        });
    }

    fn on_status_changed(&mut self, status: &StatusInfo) {
        self.events.push(EngineEvent::Status(*status));
    }
}
