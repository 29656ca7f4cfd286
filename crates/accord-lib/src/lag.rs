use crate::error::{Error, Result};
use crate::intervals::interpolate_missing;
use crate::signal::{Events, LagSeries};
use serde::{Deserialize, Serialize};

/// Acceptance bounds and smoothing for per-event lag estimation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LagConfig {
    /// Shortest physiologically plausible lag, in seconds.
    pub min_lag_s: f64,
    /// Longest physiologically plausible lag, in seconds.
    pub max_lag_s: f64,
    /// Width of the zero-phase smoothing window, in series elements.
    pub smoothing_len: usize,
}

impl Default for LagConfig {
    fn default() -> Self {
        Self {
            min_lag_s: 0.20,
            max_lag_s: 0.54,
            smoothing_len: 300,
        }
    }
}

/// First event of `events` strictly inside the open interval `(start, end)`.
fn first_between(events: &Events, start: usize, end: usize) -> Option<usize> {
    let idx = events.indices.partition_point(|&p| p <= start);
    match events.indices.get(idx) {
        Some(&p) if p < end => Some(p),
        _ => None,
    }
}

/// Centered moving average with the window truncated at both ends, so the
/// output keeps the input length and no phase shift is introduced.
fn smooth(values: &[f64], len: usize) -> Vec<f64> {
    let half = len / 2;
    if half == 0 || values.len() < 2 {
        return values.to_vec();
    }
    let n = values.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let lo = i.saturating_sub(half);
        let hi = (i + half).min(n - 1);
        let window = &values[lo..=hi];
        out.push(window.iter().sum::<f64>() / window.len() as f64);
    }
    out
}

/// Estimates the per-event lag from each anchor event to the first paired
/// event that follows it, before the next anchor event.
///
/// Anchor intervals with no candidate are filled by linear interpolation;
/// estimates outside `[min_lag_s, max_lag_s]` are replaced by the mean of
/// the in-range ones; the result is smoothed and rounded to whole samples.
/// The last anchor event has no following interval and is always filled.
pub fn estimate_lag(
    anchor: &Events,
    other: &Events,
    fs: f64,
    cfg: &LagConfig,
) -> Result<LagSeries> {
    let n = anchor.len();
    if n == 0 {
        return Ok(LagSeries { samples: Vec::new(), unresolved: 0 });
    }

    let mut lag = vec![f64::NAN; n];
    let mut unresolved = 0usize;
    for i in 0..n - 1 {
        let start = anchor.indices[i];
        let end = anchor.indices[i + 1];
        match first_between(other, start, end) {
            Some(p) => lag[i] = (p - start) as f64,
            None => unresolved += 1,
        }
    }

    if lag.iter().all(|v| v.is_nan()) {
        return Err(Error::InsufficientData(
            "no lag could be measured between the two streams".into(),
        ));
    }
    interpolate_missing(&mut lag)?;

    let lo = cfg.min_lag_s * fs;
    let hi = cfg.max_lag_s * fs;
    let in_range: Vec<f64> = lag.iter().copied().filter(|&v| v >= lo && v <= hi).collect();
    if in_range.is_empty() {
        return Err(Error::InsufficientData(format!(
            "no lag estimate inside [{:.3} s, {:.3} s]",
            cfg.min_lag_s, cfg.max_lag_s
        )));
    }
    let mean = in_range.iter().sum::<f64>() / in_range.len() as f64;
    for v in lag.iter_mut() {
        if *v < lo || *v > hi {
            *v = mean;
        }
    }

    let samples = smooth(&lag, cfg.smoothing_len)
        .into_iter()
        .map(|v| v.round() as i64)
        .collect();
    Ok(LagSeries { samples, unresolved })
}

/// Anchor events moved forward by their own lag estimate. Collisions after
/// the shift collapse to a single event.
pub fn shift_by_lag(anchor: &Events, lag: &LagSeries) -> Events {
    let mut indices: Vec<usize> = anchor
        .indices
        .iter()
        .zip(lag.samples.iter())
        .map(|(&p, &d)| (p as i64 + d).max(0) as usize)
        .collect();
    indices.sort_unstable();
    indices.dedup();
    Events::from_indices(indices)
}
