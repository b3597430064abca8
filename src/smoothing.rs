//! Noise smoothing over the trailing sample window.
//!
//! Sensor noise around a turning point produces two extrema of the same kind
//! in quick succession. The filter looks at the first extremum of the window
//! and the next flagged sample after it. When both are of the same kind the
//! samples between them are flattened to the midpoint of the two raw values
//! and only the more extreme of the pair keeps its flag.

use crate::extrema::Extremum;

/// Resolve a same-kind conflict anchored at the first extremum of the window.
///
/// `values` and `flags` cover the same positions. Returns `true` when a
/// conflict was found and resolved; the window is left untouched otherwise,
/// including when the next extremum after the anchor is of the opposite kind.
pub fn smooth_window(values: &mut [f64], flags: &mut [Extremum]) -> bool {
    debug_assert_eq!(values.len(), flags.len());
    let len = flags.len().min(values.len());

    let Some(f) = (0..len).find(|&j| flags[j].is_extremum()) else {
        return false;
    };
    let Some(k) = (f + 1..len).find(|&j| flags[j].is_extremum()) else {
        return false;
    };
    if flags[f] != flags[k] {
        return false;
    }
    merge_pair(values, flags, f, k);
    true
}

/// Flatten the interior of `f..=k` and keep the flag on the stronger end.
fn merge_pair(values: &mut [f64], flags: &mut [Extremum], f: usize, k: usize) {
    let midpoint = (values[f] + values[k]) / 2.0;
    for j in f + 1..k {
        values[j] = midpoint;
        flags[j] = Extremum::None;
    }

    match flags[k] {
        Extremum::Max => {
            if values[f] > values[k] {
                flags[k] = Extremum::None;
            } else {
                flags[f] = Extremum::None;
            }
        }
        _ => {
            if values[f] > values[k] {
                flags[f] = Extremum::None;
            } else {
                flags[k] = Extremum::None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Extremum::{Max, Min, None as Flat};

    #[test]
    fn test_merges_double_minimum() {
        let mut values = vec![3.0, 1.0, 1.0, 0.0, 2.0, 3.0];
        let mut flags = vec![Flat, Min, Flat, Min, Flat, Flat];

        assert!(smooth_window(&mut values, &mut flags));
        assert_eq!(flags, vec![Flat, Flat, Flat, Min, Flat, Flat]);
        assert_eq!(values, vec![3.0, 1.0, 0.5, 0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_keeps_larger_maximum() {
        let mut values = vec![0.0, 2.0, 1.8, 1.9, 1.5, 0.0];
        let mut flags = vec![Flat, Max, Flat, Max, Flat, Flat];

        assert!(smooth_window(&mut values, &mut flags));
        assert_eq!(flags[1], Max);
        assert_eq!(flags[3], Flat);
        assert!((values[2] - 1.95).abs() < 1e-12);
        // Endpoints keep their raw values
        assert_eq!(values[1], 2.0);
        assert_eq!(values[3], 1.9);
    }

    #[test]
    fn test_only_first_conflict_resolved() {
        let mut values = vec![1.0, 0.0, 0.5, 0.2, 2.0, 1.0, 3.0];
        let mut flags = vec![Flat, Min, Flat, Min, Max, Flat, Max];

        assert!(smooth_window(&mut values, &mut flags));
        assert_eq!(flags, vec![Flat, Min, Flat, Flat, Max, Flat, Max]);
        // The maxima pair is not anchored at the first extremum
        assert!(!smooth_window(&mut values, &mut flags));
        assert_eq!(flags, vec![Flat, Min, Flat, Flat, Max, Flat, Max]);
    }

    #[test]
    fn test_later_pair_is_left_alone() {
        let original_values = vec![2.0, 1.0, 0.0, 0.5, -0.2, 1.0];
        let original_flags = vec![Max, Flat, Min, Flat, Min, Flat];
        let mut values = original_values.clone();
        let mut flags = original_flags.clone();

        assert!(!smooth_window(&mut values, &mut flags));
        assert_eq!(values, original_values);
        assert_eq!(flags, original_flags);
    }

    #[test]
    fn test_no_extremum_after_anchor() {
        let mut values = vec![0.0, 1.0, 0.5, 0.4];
        let mut flags = vec![Flat, Max, Flat, Flat];
        assert!(!smooth_window(&mut values, &mut flags));
    }

    #[test]
    fn test_alternating_window_is_untouched() {
        let original_values = vec![0.0, 1.0, 0.5, -1.0, 0.0, 1.0];
        let original_flags = vec![Flat, Max, Flat, Min, Flat, Max];
        let mut values = original_values.clone();
        let mut flags = original_flags.clone();

        assert!(!smooth_window(&mut values, &mut flags));
        assert!(!smooth_window(&mut values, &mut flags));
        assert_eq!(values, original_values);
        assert_eq!(flags, original_flags);
    }

    #[test]
    fn test_smoothing_converges() {
        let mut values = vec![0.0, 2.0, 1.0, 2.5, 1.0, 3.0, 0.0];
        let mut flags = vec![Flat, Max, Min, Max, Min, Max, Flat];

        // Alternating flags: no adjacent same-kind pair, nothing to do
        assert!(!smooth_window(&mut values, &mut flags));

        let mut values = vec![0.0, 2.0, 2.0, 2.5, 1.9, 3.0, 0.5];
        let mut flags = vec![Flat, Max, Flat, Max, Flat, Max, Flat];
        assert!(smooth_window(&mut values, &mut flags));
        assert_eq!(flags, vec![Flat, Flat, Flat, Max, Flat, Max, Flat]);
        assert!(smooth_window(&mut values, &mut flags));
        assert_eq!(flags, vec![Flat, Flat, Flat, Flat, Flat, Max, Flat]);
        let settled = (values.clone(), flags.clone());
        assert!(!smooth_window(&mut values, &mut flags));
        assert_eq!((values, flags), settled);
    }
}
