//! Stride records built from three consecutive extrema.

use serde::{Deserialize, Serialize};

use crate::extrema::Extremum;

/// Shape of a stride: the order of its three extrema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrideKind {
    MaxMinMax,
    MinMaxMin,
}

/// One gait pattern unit on a single sensor axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stride {
    pub height_max: f64,
    pub height_min: f64,
    /// Always `|height_max - height_min|`, except on averaged strides where it
    /// is the mean amplitude of the sources
    pub amplitude: f64,
    /// Samples between the first and the middle extremum
    pub length_first: usize,
    /// Samples between the middle and the last extremum
    pub length_second: usize,
    /// Stride duration in samples
    pub length_total: usize,
    pub axis: usize,
    pub kind: StrideKind,
}

/// A confirmed extremum: sample position and (smoothed) value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremumPoint {
    pub position: usize,
    pub value: f64,
}

impl Stride {
    /// Build a stride from three consecutive extrema, oldest first.
    ///
    /// `newest` is the flag of the last extremum and decides the kind: a
    /// maximum closes a max-min-max stride, a minimum a min-max-min one.
    /// Returns `None` when `newest` is not an extremum.
    pub fn from_extrema(points: [ExtremumPoint; 3], newest: Extremum, axis: usize) -> Option<Self> {
        let [first, middle, last] = points;
        let flanks = (first.value + last.value) / 2.0;
        let (height_max, height_min, kind) = match newest {
            Extremum::Max => (flanks, middle.value, StrideKind::MaxMinMax),
            Extremum::Min => (middle.value, flanks, StrideKind::MinMaxMin),
            Extremum::None => return None,
        };
        let length_first = middle.position.saturating_sub(first.position);
        let length_second = last.position.saturating_sub(middle.position);

        Some(Self {
            height_max,
            height_min,
            amplitude: (height_max - height_min).abs(),
            length_first,
            length_second,
            length_total: length_first + length_second,
            axis,
            kind,
        })
    }

    /// Average three strides into a representative.
    ///
    /// The result keeps only amplitude (mean) and total length (rounded mean);
    /// heights and partial lengths are zero. Axis and kind come from the first
    /// source.
    pub fn averaged(sources: &[Stride; 3]) -> Self {
        let amplitude = sources.iter().map(|s| s.amplitude).sum::<f64>() / 3.0;
        let length_sum: usize = sources.iter().map(|s| s.length_total).sum();
        let length_total = (length_sum as f64 / 3.0).round() as usize;

        Self {
            height_max: 0.0,
            height_min: 0.0,
            amplitude,
            length_first: 0,
            length_second: 0,
            length_total,
            axis: sources[0].axis,
            kind: sources[0].kind,
        }
    }

    /// Stride duration in seconds for a given tick period.
    pub fn duration(&self, update_interval: f64) -> f64 {
        self.length_total as f64 * update_interval
    }

    /// Instantaneous step frequency in Hz: one stride carries two steps.
    pub fn step_frequency(&self, update_interval: f64) -> f64 {
        1.0 / (self.duration(update_interval) * 0.5)
    }
}

/// Whether `candidate` matches `reference` within the allowed deviations.
///
/// Deviations are relative to the reference, so the relation is asymmetric.
/// A reference with zero amplitude or length matches nothing.
pub fn similar(
    reference: &Stride,
    candidate: &Stride,
    deviation_length: f64,
    deviation_amplitude: f64,
) -> bool {
    if reference.length_total == 0 || reference.amplitude <= 0.0 {
        return false;
    }
    let diff_length = (reference.length_total as f64 - candidate.length_total as f64).abs()
        / reference.length_total as f64;
    let diff_amplitude = (reference.amplitude - candidate.amplitude).abs() / reference.amplitude;

    diff_length <= deviation_length && diff_amplitude <= deviation_amplitude
}
