//! Relative elevation gain from fix altitudes.
//!
//! Altitudes are averaged over a small sliding window. A window whose
//! consecutive differences add up to a meter or more is considered noise and
//! skipped. Only ascents count: the gain never decreases.

use std::collections::VecDeque;

/// Summed absolute differences at or above this (meters) mark a noisy window.
const NOISE_THRESHOLD_M: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct ElevationTracker {
    window_size: usize,
    window: VecDeque<f64>,
    previous_mean: Option<f64>,
    gain: i64,
}

impl ElevationTracker {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            window: VecDeque::with_capacity(window_size),
            previous_mean: None,
            gain: 0,
        }
    }

    /// Admit one altitude reading. Returns the cumulative gain.
    pub fn push(&mut self, altitude: f64) -> i64 {
        self.window.push_back(altitude);
        if self.window.len() < self.window_size {
            return self.gain;
        }

        let noise: f64 = self
            .window
            .iter()
            .zip(self.window.iter().skip(1))
            .map(|(a, b)| (b - a).abs())
            .sum();

        if noise < NOISE_THRESHOLD_M {
            let mean = (self.window.iter().sum::<f64>() / self.window.len() as f64).round();
            if let Some(previous) = self.previous_mean {
                let delta = mean - previous;
                if delta > 0.0 {
                    self.gain += delta as i64;
                }
            }
            self.previous_mean = Some(mean);
        }

        self.window.pop_front();
        self.gain
    }

    /// Forget the current window after an unusable reading. The gain and the
    /// last window mean are kept.
    pub fn clear_window(&mut self) {
        self.window.clear();
    }

    pub fn gain(&self) -> i64 {
        self.gain
    }
}
