//! Start configuration for a measurement session.

use serde::{Deserialize, Serialize};

use crate::error::{config_error, Result};

/// Default number of trailing similarity comparisons inspected before a
/// representative stride may be elected.
pub const DEFAULT_SIMILARITY_DEPTH: u32 = 3;

/// Parameters passed to [`crate::StepDistEngine::start`].
///
/// JSON keys are camelCase, matching the option names hosts already send.
/// Every host parameter is mandatory when parsing JSON; only
/// `similarityDepth` may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepDistConfig {
    /// Tick period of the step counter in seconds.
    /// Default: 0.1
    pub update_interval: f64,

    /// Smoothing timeframe (RT) in samples. Also the output lag of the
    /// smoothing filter.
    /// Default: 6
    pub smoothing_timeframe: u32,

    /// Allowed relative deviation in stride length for two strides to be
    /// similar.
    /// Default: 0.35
    pub deviation_length: f64,

    /// Allowed relative deviation in stride amplitude for two strides to be
    /// similar.
    /// Default: 0.35
    pub deviation_amplitude: f64,

    /// Minimum amplitude a stride needs to become the representative.
    /// Default: 0.2
    pub min_stride_amplitude: f64,

    /// A newly found pattern replaces the representative only if its amplitude
    /// exceeds `representative.amplitude * better_stride_factor`.
    /// Default: 1.2
    pub better_stride_factor: f64,

    /// Scale of the body-height/frequency step length heuristic.
    /// Default: 0.33
    pub step_length_factor: f64,

    /// Fixes closer than this to the previously processed fix are ignored
    /// (meters, 0 disables).
    /// Default: 4.0
    pub horizontal_distance_filter: f64,

    /// Maximum horizontal accuracy (meters) for a fix to join a calibration
    /// window.
    /// Default: 8.0
    pub horizontal_accuracy_filter: f64,

    /// Altitude window size in samples.
    /// Default: 4
    pub vertical_distance_filter: u32,

    /// Maximum vertical accuracy (meters) for an altitude to be used.
    /// Default: 10.0
    pub vertical_accuracy_filter: f64,

    /// GPS distance (meters) a calibration window must span.
    /// Default: 40.0
    pub distance_to_calibrate: f64,

    /// Derive the step length from location fixes.
    /// Default: true
    #[serde(rename = "enableGPSCalibration", alias = "enableGpsCalibration")]
    pub enable_gps_calibration: bool,

    /// Trailing similarity comparisons inspected before electing a
    /// representative (same-phase entries among them must all be true).
    /// Default: 3
    #[serde(default = "default_similarity_depth")]
    pub similarity_depth: u32,
}

fn default_similarity_depth() -> u32 {
    DEFAULT_SIMILARITY_DEPTH
}

impl Default for StepDistConfig {
    fn default() -> Self {
        Self {
            update_interval: 0.1,
            smoothing_timeframe: 6,
            deviation_length: 0.35,
            deviation_amplitude: 0.35,
            min_stride_amplitude: 0.2,
            better_stride_factor: 1.2,
            step_length_factor: 0.33,
            horizontal_distance_filter: 4.0,
            horizontal_accuracy_filter: 8.0,
            vertical_distance_filter: 4,
            vertical_accuracy_filter: 10.0,
            distance_to_calibrate: 40.0,
            enable_gps_calibration: true,
            similarity_depth: DEFAULT_SIMILARITY_DEPTH,
        }
    }
}

impl StepDistConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StepDistConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter range. Returns the first offending field.
    pub fn validate(&self) -> Result<()> {
        positive("updateInterval", self.update_interval)?;
        if self.smoothing_timeframe < 2 {
            return Err(config_error("smoothingTimeframe", "must be at least 2 samples"));
        }
        non_negative("deviationLength", self.deviation_length)?;
        non_negative("deviationAmplitude", self.deviation_amplitude)?;
        non_negative("minStrideAmplitude", self.min_stride_amplitude)?;
        non_negative("betterStrideFactor", self.better_stride_factor)?;
        non_negative("stepLengthFactor", self.step_length_factor)?;
        non_negative("horizontalDistanceFilter", self.horizontal_distance_filter)?;
        positive("horizontalAccuracyFilter", self.horizontal_accuracy_filter)?;
        if self.vertical_distance_filter == 0 {
            return Err(config_error("verticalDistanceFilter", "must be at least 1 sample"));
        }
        positive("verticalAccuracyFilter", self.vertical_accuracy_filter)?;
        positive("distanceToCalibrate", self.distance_to_calibrate)?;
        if self.similarity_depth < 3 {
            return Err(config_error("similarityDepth", "must be at least 3 comparisons"));
        }
        Ok(())
    }

    /// Output delay of the smoothing filter in seconds.
    pub fn smoothing_lag(&self) -> f64 {
        self.update_interval * self.smoothing_timeframe as f64
    }
}

fn positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(config_error(field, format!("must be a positive number, got {}", value)))
    }
}

fn non_negative(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(config_error(field, format!("must be zero or positive, got {}", value)))
    }
}
