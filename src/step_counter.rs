//! Step counting pipeline: three axis windows feeding the similarity engine,
//! which in turn writes step timestamps into the ledger.

use log::info;

use crate::axis::AxisWindow;
use crate::config::StepDistConfig;
use crate::ledger::StepLedger;
use crate::similarity::{SimilarityEngine, SimilarityParams, Verdict};
use crate::stride::Stride;
use crate::MotionSample;

/// Steps implied before the stride that elects a representative.
pub const BACKFILL_STEPS: usize = 4;

/// Once the active pattern holds this many steps, all axes are locked.
pub const LOCK_ALL_AFTER_STEPS: usize = 15;

/// Step timestamps younger than this are always kept for interval queries.
pub const STEP_RETENTION_SECS: f64 = 60.0;

/// A step count change: cumulative steps and current step frequency (Hz).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCountUpdate {
    pub total_steps: u32,
    pub frequency: f64,
}

#[derive(Debug, Clone)]
pub struct StepCounter {
    update_interval: f64,
    lag: f64,
    axes: [AxisWindow; 3],
    similarity: SimilarityEngine,
    ledger: StepLedger,
}

impl StepCounter {
    pub fn new(config: &StepDistConfig) -> Self {
        let rt = config.smoothing_timeframe as usize;
        Self {
            update_interval: config.update_interval,
            lag: config.smoothing_lag(),
            axes: [
                AxisWindow::new(0, rt),
                AxisWindow::new(1, rt),
                AxisWindow::new(2, rt),
            ],
            similarity: SimilarityEngine::new(SimilarityParams::from(config)),
            ledger: StepLedger::new(),
        }
    }

    /// Process one tick with the latest motion vector.
    ///
    /// `now` is the tick time in epoch seconds. Returns one update per
    /// confirmed stride, in axis order.
    pub fn tick(&mut self, sample: &MotionSample, now: f64) -> Vec<StepCountUpdate> {
        let values = [sample.x, sample.y, sample.z];
        let mut updates = Vec::new();

        for (axis, value) in values.into_iter().enumerate() {
            if let Some(stride) = self.axes[axis].push(value) {
                if let Some(update) = self.feed_stride(stride, now) {
                    updates.push(update);
                }
            }
        }

        if self.ledger.current_len() >= LOCK_ALL_AFTER_STEPS {
            self.similarity.lock_all();
        }
        updates
    }

    /// Run a completed stride through the similarity engine and record its
    /// steps. `now` is the time the stride left the smoothing window.
    pub fn feed_stride(&mut self, stride: Stride, now: f64) -> Option<StepCountUpdate> {
        let outcome = self.similarity.observe(stride);

        if let Some(representative) = outcome.elected {
            let step = representative.duration(self.update_interval) / 2.0;
            self.ledger.backfill(now, self.lag, step, BACKFILL_STEPS);
        }

        match outcome.verdict {
            Verdict::Match => {
                let step = stride.duration(self.update_interval) / 2.0;
                self.ledger.record_stride(now, self.lag, step);
                Some(StepCountUpdate {
                    total_steps: self.ledger.total_steps(),
                    frequency: stride.step_frequency(self.update_interval),
                })
            }
            Verdict::Break => {
                self.ledger.roll_over();
                info!(
                    "[StepCounter] Searching for a new pattern ({} steps kept)",
                    self.ledger.total_steps()
                );
                None
            }
            Verdict::Unrelated => None,
        }
    }

    pub fn total_steps(&self) -> u32 {
        self.ledger.total_steps()
    }

    pub fn steps_between(&self, start: f64, end: f64) -> u32 {
        self.ledger.steps_between(start, end)
    }

    pub fn steps_per_minute(&self, now: f64) -> u32 {
        self.ledger.steps_per_minute(now, self.lag)
    }

    /// Forget step timestamps older than the retention window at `now`, or
    /// older than `keep_from` if that is earlier. Totals are unaffected.
    pub fn prune(&mut self, now: f64, keep_from: Option<f64>) {
        let mut cutoff = now - self.lag - STEP_RETENTION_SECS;
        if let Some(start) = keep_from {
            cutoff = cutoff.min(start);
        }
        self.ledger.prune_before(cutoff);
    }

    /// Step timestamps currently held.
    pub fn retained_steps(&self) -> usize {
        self.ledger.retained()
    }

    pub fn representative(&self) -> Option<&Stride> {
        self.similarity.representative()
    }
}
