//! Local extrema classification of a sample triple.

use serde::{Deserialize, Serialize};

/// Classification of a single sample on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Extremum {
    Max,
    Min,
    #[default]
    None,
}

impl Extremum {
    /// Whether this sample is flagged as a maximum or minimum.
    pub fn is_extremum(self) -> bool {
        self != Extremum::None
    }
}

/// Classify the middle sample `p1` of a triple.
///
/// A plateau counts once: the rising edge into it is the maximum (or the
/// falling edge the minimum), its remaining samples are not extrema.
pub fn classify(p0: f64, p1: f64, p2: f64) -> Extremum {
    if p0 < p1 && p2 <= p1 {
        Extremum::Max
    } else if p0 > p1 && p2 >= p1 {
        Extremum::Min
    } else {
        Extremum::None
    }
}
