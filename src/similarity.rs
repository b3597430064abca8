//! Representative stride state machine.
//!
//! Every axis searches independently for a repeating gait pattern: each new
//! stride is compared with the stride two positions earlier (same kind) and
//! the result is appended to the axis' similarity history. Once the trailing
//! same-phase comparisons all agree, the average of the last three same-kind
//! strides becomes the single representative for all axes, and that axis is
//! locked. Subsequent strides of the representative's axis and kind either
//! confirm it (two steps) or break it (search restarts everywhere).

use std::collections::VecDeque;

use log::{debug, info};

use crate::config::StepDistConfig;
use crate::stride::{similar, Stride};

/// Strides kept per axis: enough to reach `n - 4`.
const STRIDE_HISTORY: usize = 5;

/// Thresholds of the state machine, taken from the start configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityParams {
    pub deviation_length: f64,
    pub deviation_amplitude: f64,
    pub min_stride_amplitude: f64,
    pub better_stride_factor: f64,
    pub depth: usize,
}

impl From<&StepDistConfig> for SimilarityParams {
    fn from(config: &StepDistConfig) -> Self {
        Self {
            deviation_length: config.deviation_length,
            deviation_amplitude: config.deviation_amplitude,
            min_stride_amplitude: config.min_stride_amplitude,
            better_stride_factor: config.better_stride_factor,
            depth: config.similarity_depth as usize,
        }
    }
}

/// What the representative made of the newest stride.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Different axis or kind, or no representative yet
    Unrelated,
    /// Similar to the representative: two more steps
    Match,
    /// Not similar: the pattern is gone
    Break,
}

/// Result of feeding one stride.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrideOutcome {
    /// The representative elected by this stride, if any
    pub elected: Option<Stride>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Default)]
struct AxisState {
    strides: VecDeque<Stride>,
    history: VecDeque<bool>,
    locked: bool,
}

impl AxisState {
    /// Whether the trailing `depth` comparisons agree in phase with the newest.
    fn pattern_found(&self, depth: usize) -> bool {
        if self.history.len() < depth {
            return false;
        }
        // Newest first: offsets 0, 2, 4, ... are the same-phase entries
        self.history.iter().rev().take(depth).step_by(2).all(|&s| s)
    }

    fn same_kind_triple(&self) -> Option<[Stride; 3]> {
        let n = self.strides.len();
        if n < STRIDE_HISTORY {
            return None;
        }
        Some([self.strides[n - 5], self.strides[n - 3], self.strides[n - 1]])
    }
}

#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    params: SimilarityParams,
    axes: [AxisState; 3],
    representative: Option<Stride>,
}

impl SimilarityEngine {
    pub fn new(params: SimilarityParams) -> Self {
        Self {
            params,
            axes: Default::default(),
            representative: None,
        }
    }

    pub fn representative(&self) -> Option<&Stride> {
        self.representative.as_ref()
    }

    pub fn is_locked(&self, axis: usize) -> bool {
        self.axes.get(axis).map(|a| a.locked).unwrap_or(false)
    }

    /// Lock every axis so no other axis can replace the representative.
    pub fn lock_all(&mut self) {
        for state in self.axes.iter_mut() {
            state.locked = true;
        }
    }

    /// Feed the newest stride of `stride.axis`.
    pub fn observe(&mut self, stride: Stride) -> StrideOutcome {
        let params = self.params;
        let Some(state) = self.axes.get_mut(stride.axis) else {
            return StrideOutcome {
                elected: None,
                verdict: Verdict::Unrelated,
            };
        };

        state.strides.push_back(stride);
        if state.strides.len() > STRIDE_HISTORY {
            state.strides.pop_front();
        }

        let n = state.strides.len();
        if n >= 3 {
            let same = similar(
                &state.strides[n - 3],
                &state.strides[n - 1],
                params.deviation_length,
                params.deviation_amplitude,
            );
            state.history.push_back(same);
            if state.history.len() > params.depth {
                state.history.pop_front();
            }
        }

        let mut elected = None;
        if !state.locked && state.pattern_found(params.depth) {
            let threshold = self
                .representative
                .map(|r| r.amplitude * params.better_stride_factor)
                .unwrap_or(0.0);
            if stride.amplitude >= params.min_stride_amplitude && stride.amplitude > threshold {
                if let Some(sources) = state.same_kind_triple() {
                    let representative = Stride::averaged(&sources);
                    info!(
                        "[StepCounter] Representative stride on axis {}: amplitude {:.3}, length {}",
                        representative.axis, representative.amplitude, representative.length_total
                    );
                    state.locked = true;
                    self.representative = Some(representative);
                    elected = Some(representative);
                }
            }
        }

        let verdict = match self.representative {
            Some(rep) if rep.axis == stride.axis && rep.kind == stride.kind => {
                if similar(&rep, &stride, params.deviation_length, params.deviation_amplitude) {
                    Verdict::Match
                } else {
                    debug!(
                        "[StepCounter] Pattern broken on axis {} (amplitude {:.3}, length {})",
                        stride.axis, stride.amplitude, stride.length_total
                    );
                    self.reset();
                    Verdict::Break
                }
            }
            _ => Verdict::Unrelated,
        };

        StrideOutcome { elected, verdict }
    }

    /// Drop the representative, all locks and all similarity histories.
    /// Stride histories are kept.
    pub fn reset(&mut self) {
        self.representative = None;
        for state in self.axes.iter_mut() {
            state.locked = false;
            state.history.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stride::StrideKind;

    fn params() -> SimilarityParams {
        SimilarityParams {
            deviation_length: 0.3,
            deviation_amplitude: 0.3,
            min_stride_amplitude: 0.5,
            better_stride_factor: 1.0,
            depth: 3,
        }
    }

    fn stride(axis: usize, amplitude: f64, length_total: usize, kind: StrideKind) -> Stride {
        Stride {
            height_max: amplitude,
            height_min: 0.0,
            amplitude,
            length_first: length_total / 2,
            length_second: length_total - length_total / 2,
            length_total,
            axis,
            kind,
        }
    }

    #[test]
    fn test_identical_strides_elect_on_fifth() {
        let mut engine = SimilarityEngine::new(params());
        let s = stride(0, 2.0, 20, StrideKind::MaxMinMax);

        for n in 1..=4 {
            let outcome = engine.observe(s);
            assert!(outcome.elected.is_none(), "stride {}", n);
            assert_eq!(outcome.verdict, Verdict::Unrelated);
        }

        let outcome = engine.observe(s);
        let rep = outcome.elected.expect("elected on the 5th stride");
        assert!((rep.amplitude - 2.0).abs() < 1e-12);
        assert_eq!(rep.length_total, 20);
        assert_eq!(outcome.verdict, Verdict::Match);
        assert!(engine.is_locked(0));
        assert!(!engine.is_locked(1));

        for _ in 6..=10 {
            let outcome = engine.observe(s);
            assert!(outcome.elected.is_none());
            assert_eq!(outcome.verdict, Verdict::Match);
        }
    }

    #[test]
    fn test_weak_strides_never_elect() {
        let mut engine = SimilarityEngine::new(params());
        for _ in 0..10 {
            let outcome = engine.observe(stride(0, 0.3, 20, StrideKind::MaxMinMax));
            assert!(outcome.elected.is_none());
        }
        assert!(engine.representative().is_none());
    }

    #[test]
    fn test_dissimilar_history_blocks_election() {
        let mut engine = SimilarityEngine::new(params());
        // Period of three: a stride never matches the one two before it
        let lengths = [20, 20, 30, 45, 20, 30, 45, 20];
        for len in lengths {
            let outcome = engine.observe(stride(0, 2.0, len, StrideKind::MaxMinMax));
            assert!(outcome.elected.is_none());
        }
    }

    #[test]
    fn test_alternating_kinds_compare_same_phase() {
        let mut engine = SimilarityEngine::new(params());
        let mut elected_at = None;
        for n in 1..=8 {
            let kind = if n % 2 == 1 {
                StrideKind::MaxMinMax
            } else {
                StrideKind::MinMaxMin
            };
            // The two phases differ in amplitude but each phase repeats itself
            let amplitude = if n % 2 == 1 { 2.0 } else { 1.0 };
            let outcome = engine.observe(stride(1, amplitude, 20, kind));
            if outcome.elected.is_some() && elected_at.is_none() {
                elected_at = Some(n);
            }
        }
        assert_eq!(elected_at, Some(5));
        let rep = engine.representative().unwrap();
        assert_eq!(rep.kind, StrideKind::MaxMinMax);
        assert_eq!(rep.axis, 1);
    }

    #[test]
    fn test_break_resets_everything() {
        let mut engine = SimilarityEngine::new(params());
        let s = stride(0, 2.0, 20, StrideKind::MaxMinMax);
        for _ in 0..5 {
            engine.observe(s);
        }
        assert!(engine.representative().is_some());

        let outcome = engine.observe(stride(0, 2.0, 40, StrideKind::MaxMinMax));
        assert_eq!(outcome.verdict, Verdict::Break);
        assert!(engine.representative().is_none());
        assert!(!engine.is_locked(0));

        // History was cleared: three fresh comparisons are needed again
        assert!(engine.observe(s).elected.is_none());
        assert!(engine.observe(s).elected.is_none());
    }

    #[test]
    fn test_other_kind_is_unrelated() {
        let mut engine = SimilarityEngine::new(params());
        let s = stride(0, 2.0, 20, StrideKind::MaxMinMax);
        for _ in 0..5 {
            engine.observe(s);
        }
        let outcome = engine.observe(stride(0, 9.0, 50, StrideKind::MinMaxMin));
        assert_eq!(outcome.verdict, Verdict::Unrelated);
        assert!(engine.representative().is_some());
    }

    #[test]
    fn test_stronger_axis_takes_over_until_locked() {
        let mut engine = SimilarityEngine::new(params());
        for _ in 0..5 {
            engine.observe(stride(0, 1.0, 20, StrideKind::MaxMinMax));
        }
        assert_eq!(engine.representative().unwrap().axis, 0);

        let mut took_over = false;
        for _ in 0..5 {
            took_over |= engine
                .observe(stride(2, 3.0, 20, StrideKind::MaxMinMax))
                .elected
                .is_some();
        }
        assert!(took_over);
        assert_eq!(engine.representative().unwrap().axis, 2);

        // With every axis locked nobody can replace it
        engine.lock_all();
        for _ in 0..5 {
            assert!(engine
                .observe(stride(1, 6.0, 20, StrideKind::MaxMinMax))
                .elected
                .is_none());
        }
        assert_eq!(engine.representative().unwrap().axis, 2);
    }
}
