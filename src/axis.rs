//! Per-axis sample window: classification, smoothing and stride building.
//!
//! Each axis keeps only `RT + 1` raw samples. A sample is classified one tick
//! after it arrives (it needs its right neighbour), smoothed while it sits in
//! the window, and handed on once it leaves: `RT` ticks after arrival.

use std::collections::VecDeque;

use crate::extrema::{classify, Extremum};
use crate::smoothing::smooth_window;
use crate::stride::{ExtremumPoint, Stride};

/// Trailing window and extrema FIFO for one sensor axis.
#[derive(Debug, Clone)]
pub struct AxisWindow {
    axis: usize,
    smoothing_timeframe: usize,
    /// Raw (later smoothed) values, positions `index - len ..= index - 1`
    values: VecDeque<f64>,
    /// Flags for all but the newest value
    flags: VecDeque<Extremum>,
    /// Last confirmed extrema, at most 3
    extrema: VecDeque<ExtremumPoint>,
    /// Number of samples pushed so far
    index: usize,
}

/// Classification needs three samples in the window.
const MIN_SMOOTHING_TIMEFRAME: usize = 2;

impl AxisWindow {
    /// `smoothing_timeframe` is raised to 2 samples if smaller.
    pub fn new(axis: usize, smoothing_timeframe: usize) -> Self {
        let smoothing_timeframe = smoothing_timeframe.max(MIN_SMOOTHING_TIMEFRAME);
        Self {
            axis,
            smoothing_timeframe,
            values: VecDeque::with_capacity(smoothing_timeframe + 1),
            flags: VecDeque::with_capacity(smoothing_timeframe + 1),
            extrema: VecDeque::with_capacity(3),
            index: 0,
        }
    }

    /// Push the next sample. Returns a stride when the sample leaving the
    /// window completes one.
    pub fn push(&mut self, value: f64) -> Option<Stride> {
        let i = self.index;
        self.index += 1;
        self.values.push_back(value);

        if i == 0 {
            self.flags.push_back(Extremum::None);
        } else if i >= 2 {
            let n = self.values.len();
            let flag = classify(self.values[n - 3], self.values[n - 2], self.values[n - 1]);
            self.flags.push_back(flag);
        }

        let rt = self.smoothing_timeframe;
        if i < rt {
            return None;
        }

        let values = self.values.make_contiguous();
        let flags = self.flags.make_contiguous();
        smooth_window(&mut values[..rt], &mut flags[..rt]);

        let position = i - rt;
        let value = self.values.pop_front()?;
        let flag = self.flags.pop_front()?;
        if !flag.is_extremum() {
            return None;
        }
        self.accept_extremum(ExtremumPoint { position, value }, flag)
    }

    fn accept_extremum(&mut self, point: ExtremumPoint, flag: Extremum) -> Option<Stride> {
        self.extrema.push_back(point);
        if self.extrema.len() < 3 {
            return None;
        }
        let stride = Stride::from_extrema(
            [self.extrema[0], self.extrema[1], self.extrema[2]],
            flag,
            self.axis,
        );
        self.extrema.pop_front();
        stride
    }

    /// Samples pushed since creation.
    pub fn samples_seen(&self) -> usize {
        self.index
    }
}
