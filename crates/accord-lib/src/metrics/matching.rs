use crate::signal::Events;
use serde::{Deserialize, Serialize};

/// Detection-quality counts and rates for one reference/test comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "TP")]
    pub true_positives: usize,
    #[serde(rename = "FN")]
    pub false_negatives: usize,
    #[serde(rename = "FP")]
    pub false_positives: usize,
    #[serde(rename = "Se")]
    pub sensitivity: f64,
    #[serde(rename = "PPV")]
    pub ppv: f64,
    #[serde(rename = "F1")]
    pub f1: f64,
    /// Mean distance of the accepted matches, in samples.
    #[serde(rename = "MeanDist", default, skip_serializing_if = "Option::is_none")]
    pub mean_distance: Option<f64>,
}

impl MatchResult {
    fn empty() -> Self {
        Self {
            true_positives: 0,
            false_negatives: 0,
            false_positives: 0,
            sensitivity: 0.0,
            ppv: 0.0,
            f1: 0.0,
            mean_distance: None,
        }
    }
}

/// Nearest element of a sorted slice, as (slice index, distance in samples).
/// Ties go to the earlier element.
fn nearest(positions: &[usize], pos: usize) -> (usize, f64) {
    let k = positions.partition_point(|&p| p < pos);
    if k == 0 {
        return (0, (positions[0] - pos) as f64);
    }
    if k == positions.len() {
        let last = positions.len() - 1;
        return (last, (pos - positions[last]) as f64);
    }
    let d_prev = (pos - positions[k - 1]) as f64;
    let d_next = (positions[k] - pos) as f64;
    if d_prev <= d_next {
        (k - 1, d_prev)
    } else {
        (k, d_next)
    }
}

/// Scores how well `test` reproduces `reference` by nearest-neighbor
/// matching with a strict distance cutoff.
///
/// Each test event claims its nearest reference event; claims at or past
/// `tolerance_samples` are discarded, and a reference event claimed more
/// than once counts a single true positive (the earliest claim keeps its
/// distance). Either stream empty scores all zeros without any lookup.
pub fn match_events(reference: &Events, test: &Events, tolerance_samples: f64) -> MatchResult {
    if reference.is_empty() || test.is_empty() {
        return MatchResult::empty();
    }

    let mut claims: Vec<(usize, f64)> = Vec::new();
    for &t in &test.indices {
        let (ref_idx, dist) = nearest(&reference.indices, t);
        if dist < tolerance_samples {
            claims.push((ref_idx, dist));
        }
    }
    claims.sort_by_key(|&(ref_idx, _)| ref_idx);
    claims.dedup_by_key(|&mut (ref_idx, _)| ref_idx);

    let tp = claims.len();
    let sensitivity = tp as f64 / reference.len() as f64;
    let ppv = tp as f64 / test.len() as f64;
    let f1 = if sensitivity + ppv > 0.0 {
        2.0 * sensitivity * ppv / (sensitivity + ppv)
    } else {
        0.0
    };
    let mean_distance = if claims.is_empty() {
        None
    } else {
        Some(claims.iter().map(|&(_, d)| d).sum::<f64>() / claims.len() as f64)
    };

    MatchResult {
        true_positives: tp,
        false_negatives: reference.len() - tp,
        false_positives: test.len() - tp,
        sensitivity,
        ppv,
        f1,
        mean_distance,
    }
}
