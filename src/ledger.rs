//! Step timestamp ledger.
//!
//! Steps are never counted directly: every counted step is a timestamp
//! reconstructed from stride duration and the smoothing lag. Two buckets are
//! kept. `current` holds the steps of the active representative pattern and is
//! replaced when a new pattern is elected; `preceding` holds everything that
//! was counted under earlier patterns.
//!
//! Each bucket keeps a running count next to its timestamps, so old
//! timestamps can be pruned without changing the totals.

use std::collections::VecDeque;

/// Window used by [`StepLedger::steps_per_minute`], in seconds.
const CADENCE_WINDOW_SECS: f64 = 15.0;

#[derive(Debug, Clone, Default)]
struct Bucket {
    timestamps: VecDeque<f64>,
    count: u32,
}

impl Bucket {
    fn clear(&mut self) {
        self.timestamps.clear();
        self.count = 0;
    }

    fn push(&mut self, t: f64) {
        self.timestamps.push_back(t);
        self.count += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepLedger {
    preceding: Bucket,
    current: Bucket,
}

impl StepLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps counted so far across both buckets, pruned ones included.
    pub fn total_steps(&self) -> u32 {
        self.preceding.count + self.current.count
    }

    /// Steps of the active pattern.
    pub fn current_len(&self) -> usize {
        self.current.count as usize
    }

    /// Timestamps still held in memory.
    pub fn retained(&self) -> usize {
        self.preceding.timestamps.len() + self.current.timestamps.len()
    }

    /// Steps whose timestamp lies strictly inside `(start, end)`. Only
    /// exact while `start` is not older than the last prune cutoff.
    pub fn steps_between(&self, start: f64, end: f64) -> u32 {
        self.preceding
            .timestamps
            .iter()
            .chain(self.current.timestamps.iter())
            .filter(|&&t| t > start && t < end)
            .count() as u32
    }

    /// Cadence over the last 15 seconds that can already contain steps.
    ///
    /// `lag` is the smoothing delay: nothing newer than `now - lag` has been
    /// counted yet.
    pub fn steps_per_minute(&self, now: f64, lag: f64) -> u32 {
        let end = now - lag;
        let steps = self.steps_between(end - CADENCE_WINDOW_SECS, end);
        steps * (60.0 / CADENCE_WINDOW_SECS) as u32
    }

    /// Replace the current bucket with `count` steps implied before the
    /// stride that completed at `now`.
    ///
    /// The newest stride itself is skipped: the first back-filled step lies
    /// two step durations before the lag-compensated `now`.
    pub fn backfill(&mut self, now: f64, lag: f64, step_duration: f64, count: usize) {
        self.current.clear();
        let mut t = now - lag - step_duration;
        for _ in 0..count {
            t -= step_duration;
            self.current.push(t);
        }
    }

    /// Append the two steps of a stride that completed at `now`.
    pub fn record_stride(&mut self, now: f64, lag: f64, step_duration: f64) {
        let t = now - lag;
        self.current.push(t);
        self.current.push(t - step_duration);
    }

    /// Move the active pattern's steps into the preceding bucket.
    pub fn roll_over(&mut self) {
        let current = std::mem::take(&mut self.current);
        self.preceding.timestamps.extend(current.timestamps);
        self.preceding.count += current.count;
    }

    /// Drop timestamps older than `cutoff`; the totals are kept.
    pub fn prune_before(&mut self, cutoff: f64) {
        self.preceding.timestamps.retain(|&t| t >= cutoff);
        self.current.timestamps.retain(|&t| t >= cutoff);
    }
}
