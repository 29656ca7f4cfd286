use crate::error::{Error, Result};
use crate::intervals::{adaptive_filter, forward_intervals};
use crate::signal::Events;
use serde::{Deserialize, Serialize};

/// Both rate functions are resampled on a uniform grid at this rate.
const GRID_HZ: f64 = 2.0;

/// Parameters for windowed instantaneous-rate agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateAgreementConfig {
    /// Window length in seconds.
    pub window_s: f64,
    /// Agreement cutoffs in beats per minute, one output column each.
    pub tolerance_bpm_levels: Vec<f64>,
    /// Half-width of the interval outlier filter, in elements.
    pub outlier_window: usize,
    /// Outlier band around the local interval average, in percent.
    pub outlier_percent: f64,
}

impl Default for RateAgreementConfig {
    fn default() -> Self {
        Self {
            window_s: 30.0,
            tolerance_bpm_levels: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            outlier_window: 10,
            outlier_percent: 50.0,
        }
    }
}

/// One completed window of rate agreement, one fraction per cutoff level
/// in configuration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementRow {
    pub epoch: usize,
    pub agreement: Vec<f64>,
}

/// Piecewise-linear rate value at time `t` (in samples), with knots at the
/// event positions. Callers keep `t` within the knot span.
fn rate_at(positions: &[usize], rates: &[f64], t: f64) -> f64 {
    let k = positions.partition_point(|&p| (p as f64) <= t);
    if k == 0 {
        return rates[0];
    }
    if k == positions.len() {
        return rates[rates.len() - 1];
    }
    let x0 = positions[k - 1] as f64;
    let x1 = positions[k] as f64;
    let y0 = rates[k - 1];
    let y1 = rates[k];
    y0 + (y1 - y0) * ((t - x0) / (x1 - x0))
}

/// Fraction of grid samples where the two rates agree within `level` BPM.
/// A NaN reference sample counts as agreement; a NaN test sample does not,
/// unless the reference is NaN there as well.
fn fraction_within(reference: &[f64], test: &[f64], level: f64) -> f64 {
    let hits = reference
        .iter()
        .zip(test)
        .filter(|(r, t)| r.is_nan() || (**t - **r).abs() <= level)
        .count();
    hits as f64 / reference.len() as f64
}

/// Windowed agreement between the instantaneous rates of two event streams.
///
/// The test stream is first clipped to the reference support. Reference
/// intervals pass through the adaptive outlier filter; test intervals are
/// used raw, so the trailing NaN stays in its rate function. Both rates are
/// then sampled on a shared 2 Hz grid spanning the clipped test stream and
/// compared per window, with the trailing partial window dropped.
pub fn score_rate_agreement(
    reference: &Events,
    test: &Events,
    fs: f64,
    cfg: &RateAgreementConfig,
) -> Result<Vec<AgreementRow>> {
    let (ref_first, ref_last) = match (reference.support(), test.is_empty()) {
        (Some(span), false) => span,
        _ => {
            return Err(Error::InsufficientData(
                "both streams need events to build rate functions".into(),
            ))
        }
    };
    let window_len = (cfg.window_s * GRID_HZ) as usize;
    if window_len == 0 {
        return Err(Error::InvalidInput(format!(
            "window of {} s is shorter than one grid sample",
            cfg.window_s
        )));
    }

    let trimmed = test.clipped_to(ref_first, ref_last);
    if trimmed.len() < 2 {
        return Ok(Vec::new());
    }

    let ref_intervals = forward_intervals(reference).to_seconds(fs);
    let ref_filtered = adaptive_filter(&ref_intervals, cfg.outlier_window, cfg.outlier_percent)?;
    let ref_rate: Vec<f64> = ref_filtered.intervals.iter().map(|&s| 60.0 / s).collect();
    let test_rate: Vec<f64> = forward_intervals(&trimmed)
        .to_seconds(fs)
        .intervals
        .iter()
        .map(|&s| 60.0 / s)
        .collect();

    let start = trimmed.indices[0] as f64;
    let stop = trimmed.indices[trimmed.len() - 1] as f64;
    let step = fs / GRID_HZ;
    let count = ((stop - start) / step).ceil() as usize;
    let mut ref_grid = Vec::with_capacity(count);
    let mut test_grid = Vec::with_capacity(count);
    for k in 0..count {
        let t = start + k as f64 * step;
        ref_grid.push(rate_at(&reference.indices, &ref_rate, t));
        test_grid.push(rate_at(&trimmed.indices, &test_rate, t));
    }

    let mut rows = Vec::with_capacity(count / window_len);
    for epoch in 0..count / window_len {
        let lo = epoch * window_len;
        let hi = lo + window_len;
        let agreement = cfg
            .tolerance_bpm_levels
            .iter()
            .map(|&level| fraction_within(&ref_grid[lo..hi], &test_grid[lo..hi], level))
            .collect();
        rows.push(AgreementRow { epoch, agreement });
    }
    Ok(rows)
}
