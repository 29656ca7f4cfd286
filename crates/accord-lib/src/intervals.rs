use crate::error::{Error, Result};
use crate::signal::{Events, IntervalSeries};

/// Forward differences between consecutive events, in samples. The series
/// keeps one slot per event; the last slot has no successor and holds NaN.
pub fn forward_intervals(events: &Events) -> IntervalSeries {
    if events.is_empty() {
        return IntervalSeries { intervals: Vec::new() };
    }
    let mut intervals = Vec::with_capacity(events.len());
    for w in events.indices.windows(2) {
        intervals.push(w[1] as f64 - w[0] as f64);
    }
    intervals.push(f64::NAN);
    IntervalSeries { intervals }
}

/// Mean of the finite neighbors within `half_width` positions of `center`,
/// with the center itself excluded. NaN when no finite neighbor exists.
fn neighbor_average(values: &[f64], center: usize, half_width: usize) -> f64 {
    let lo = center.saturating_sub(half_width);
    let hi = (center + half_width).min(values.len() - 1);
    let mut sum = 0.0;
    let mut count = 0usize;
    for (idx, &v) in values.iter().enumerate().take(hi + 1).skip(lo) {
        if idx == center || !v.is_finite() {
            continue;
        }
        sum += v;
        count += 1;
    }
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Marks samples deviating more than `percent` percent from their local
/// neighborhood average as invalid, then fills every invalid slot by linear
/// interpolation over the valid ones. Deviations exactly at the boundary
/// stay valid. NaN inputs are always invalid; a sample whose neighborhood
/// has no finite member is left untested.
pub fn adaptive_filter(
    series: &IntervalSeries,
    window_size: usize,
    percent: f64,
) -> Result<IntervalSeries> {
    let values = &series.intervals;
    if values.is_empty() {
        return Err(Error::InsufficientData(
            "cannot filter an empty interval series".into(),
        ));
    }
    let band = percent / 100.0;
    let mut filtered = values.clone();
    for i in 0..filtered.len() {
        if !values[i].is_finite() {
            filtered[i] = f64::NAN;
            continue;
        }
        let local = neighbor_average(values, i, window_size);
        if local.is_finite() && (values[i] - local).abs() > band * local.abs() {
            filtered[i] = f64::NAN;
        }
    }
    interpolate_missing(&mut filtered)?;
    Ok(IntervalSeries { intervals: filtered })
}

/// Fills every NaN slot in place by linear interpolation over the finite
/// slots, using positions as the interpolation domain. Slots outside the
/// first/last finite position take the nearest finite value. Returns the
/// number of slots filled; errors when no finite slot exists.
pub fn interpolate_missing(values: &mut [f64]) -> Result<usize> {
    let finite: Vec<usize> = (0..values.len())
        .filter(|&i| values[i].is_finite())
        .collect();
    if finite.is_empty() {
        return Err(Error::InsufficientData(
            "no finite samples to interpolate from".into(),
        ));
    }
    let mut filled = 0usize;
    for i in 0..values.len() {
        if values[i].is_finite() {
            continue;
        }
        values[i] = interpolate_at(i, &finite, values);
        filled += 1;
    }
    Ok(filled)
}

fn interpolate_at(pos: usize, finite: &[usize], values: &[f64]) -> f64 {
    let k = finite.partition_point(|&p| p < pos);
    if k == 0 {
        return values[finite[0]];
    }
    if k == finite.len() {
        return values[finite[finite.len() - 1]];
    }
    let (x0, x1) = (finite[k - 1], finite[k]);
    let (y0, y1) = (values[x0], values[x1]);
    y0 + (y1 - y0) * ((pos - x0) as f64 / (x1 - x0) as f64)
}
