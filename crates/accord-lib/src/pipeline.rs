use crate::error::{Error, Result};
use crate::lag::{estimate_lag, shift_by_lag, LagConfig};
use crate::metrics::matching::{match_events, MatchResult};
use crate::metrics::rate::{score_rate_agreement, AgreementRow, RateAgreementConfig};
use crate::signal::Events;
use serde::{Deserialize, Serialize};

/// Lag applied to the reference stream when no explicit mode is configured
/// for the rate pipeline, in seconds.
pub const DEFAULT_RATE_LAG_S: f64 = 0.45;

/// How the reference stream is aligned to the test stream before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "seconds", rename_all = "lowercase")]
pub enum LagMode {
    /// No alignment.
    Off,
    /// Constant shift by a fixed number of seconds.
    Fixed(f64),
    /// Per-event lag estimation from the streams themselves.
    Estimated,
}

/// Parameters shared by the windowed comparison pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Window length in seconds.
    pub window_s: f64,
    /// Match acceptance distance in seconds.
    pub tolerance_s: f64,
    /// Agreement cutoffs in BPM for the rate pipeline.
    pub tolerance_bpm_levels: Vec<f64>,
    /// Shortest plausible lag in seconds.
    pub min_ptt_s: f64,
    /// Longest plausible lag in seconds.
    pub max_ptt_s: f64,
    /// Width of the lag smoothing window, in series elements.
    pub smoothing_len: usize,
    /// Half-width of the interval outlier filter, in elements.
    pub outlier_window: usize,
    /// Outlier band around the local interval average, in percent.
    pub outlier_percent: f64,
    /// Alignment override. When absent the match pipeline estimates the
    /// lag and the rate pipeline shifts by `DEFAULT_RATE_LAG_S`.
    pub lag: Option<LagMode>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            window_s: 30.0,
            tolerance_s: 0.15,
            tolerance_bpm_levels: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            min_ptt_s: 0.20,
            max_ptt_s: 0.54,
            smoothing_len: 300,
            outlier_window: 10,
            outlier_percent: 50.0,
            lag: None,
        }
    }
}

impl CompareConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.window_s.is_finite() && self.window_s > 0.0) {
            return Err(Error::InvalidInput(format!(
                "window length must be positive and finite, got {}",
                self.window_s
            )));
        }
        if !(self.tolerance_s.is_finite() && self.tolerance_s >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "match tolerance must be non-negative, got {}",
                self.tolerance_s
            )));
        }
        if self.min_ptt_s > self.max_ptt_s {
            return Err(Error::InvalidInput(format!(
                "lag bounds are inverted: [{} s, {} s]",
                self.min_ptt_s, self.max_ptt_s
            )));
        }
        if !(self.outlier_percent.is_finite() && self.outlier_percent >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "outlier band must be non-negative, got {} percent",
                self.outlier_percent
            )));
        }
        Ok(())
    }

    fn lag_config(&self) -> LagConfig {
        LagConfig {
            min_lag_s: self.min_ptt_s,
            max_lag_s: self.max_ptt_s,
            smoothing_len: self.smoothing_len,
        }
    }

    fn rate_config(&self) -> RateAgreementConfig {
        RateAgreementConfig {
            window_s: self.window_s,
            tolerance_bpm_levels: self.tolerance_bpm_levels.clone(),
            outlier_window: self.outlier_window,
            outlier_percent: self.outlier_percent,
        }
    }
}

/// One completed window of match-quality metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatchRow {
    #[serde(rename = "Epoch")]
    pub epoch: usize,
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
}

impl MatchRow {
    fn new(epoch: usize, result: MatchResult) -> Self {
        Self {
            epoch,
            true_positives: result.true_positives,
            false_negatives: result.false_negatives,
            false_positives: result.false_positives,
            sensitivity: result.sensitivity,
            ppv: result.ppv,
            f1: result.f1,
        }
    }
}

/// Rejects inputs no pipeline step can make sense of: a non-positive or
/// non-finite sample rate, or event indices that are not strictly
/// increasing.
pub fn validate_inputs(reference: &Events, test: &Events, fs: f64) -> Result<()> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(Error::InvalidInput(format!(
            "sample rate must be positive and finite, got {fs}"
        )));
    }
    for (name, events) in [("reference", reference), ("test", test)] {
        if !events.is_strictly_increasing() {
            return Err(Error::InvalidInput(format!(
                "{name} events must be strictly increasing"
            )));
        }
    }
    Ok(())
}

fn align_reference(
    reference: &Events,
    test: &Events,
    fs: f64,
    mode: LagMode,
    cfg: &CompareConfig,
) -> Result<Events> {
    match mode {
        LagMode::Off => Ok(reference.clone()),
        LagMode::Fixed(lag_s) => Ok(reference.shifted((lag_s * fs).round() as i64)),
        LagMode::Estimated => {
            let lag = estimate_lag(reference, test, fs, &cfg.lag_config())?;
            Ok(shift_by_lag(reference, &lag))
        }
    }
}

/// Windowed nearest-neighbor match quality between two event streams.
///
/// The test stream is clipped to the reference support, the reference is
/// then aligned to the clipped test stream (estimated lag unless configured
/// otherwise), and consecutive windows starting at sample zero are scored
/// independently. The extent ends one sample past the last event of either
/// stream; a trailing partial window is dropped. Streams that never overlap
/// produce an empty table in every alignment mode.
pub fn windowed_match(
    reference: &Events,
    test: &Events,
    fs: f64,
    cfg: &CompareConfig,
) -> Result<Vec<MatchRow>> {
    validate_inputs(reference, test, fs)?;
    cfg.validate()?;
    let (ref_first, ref_last) = match reference.support() {
        Some(span) => span,
        None => return Ok(Vec::new()),
    };
    let trimmed = test.clipped_to(ref_first, ref_last);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mode = cfg.lag.unwrap_or(LagMode::Estimated);
    let aligned = align_reference(reference, &trimmed, fs, mode, cfg)?;

    let window_len = (cfg.window_s * fs) as usize;
    if window_len == 0 {
        return Err(Error::InvalidInput(format!(
            "window of {} s is shorter than one sample",
            cfg.window_s
        )));
    }
    let last = aligned.indices[aligned.len() - 1].max(trimmed.indices[trimmed.len() - 1]);
    let extent = last + 1;
    let tolerance = cfg.tolerance_s * fs;

    let mut rows = Vec::with_capacity(extent / window_len);
    for epoch in 0..extent / window_len {
        let lo = epoch * window_len;
        let hi = lo + window_len;
        let window_ref = aligned.in_window(lo, hi);
        let window_test = trimmed.in_window(lo, hi);
        rows.push(MatchRow::new(epoch, match_events(&window_ref, &window_test, tolerance)));
    }
    Ok(rows)
}

/// Windowed instantaneous-rate agreement between two event streams.
///
/// The reference stream is aligned to the test stream (a fixed
/// `DEFAULT_RATE_LAG_S` shift unless configured otherwise) and handed to
/// the rate scorer, which clips, resamples and windows the rate functions.
/// Streams that never overlap produce an empty table in every alignment
/// mode.
pub fn windowed_rate_agreement(
    reference: &Events,
    test: &Events,
    fs: f64,
    cfg: &CompareConfig,
) -> Result<Vec<AgreementRow>> {
    validate_inputs(reference, test, fs)?;
    cfg.validate()?;
    if cfg.tolerance_bpm_levels.is_empty() {
        return Err(Error::InvalidInput("at least one agreement level is required".into()));
    }

    let mode = cfg.lag.unwrap_or(LagMode::Fixed(DEFAULT_RATE_LAG_S));
    // Disjoint supports leave the estimator nothing to measure; that is an
    // empty table, not an error.
    if mode == LagMode::Estimated
        && !test.is_empty()
        && reference
            .support()
            .map_or(false, |(first, last)| test.clipped_to(first, last).is_empty())
    {
        return Ok(Vec::new());
    }
    let aligned = align_reference(reference, test, fs, mode, cfg)?;
    score_rate_agreement(&aligned, test, fs, &cfg.rate_config())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beats(count: usize, spacing: usize) -> Events {
        Events::from_indices((0..count).map(|i| i * spacing).collect())
    }

    fn offset(events: &Events, delta: usize) -> Events {
        Events::from_indices(events.indices.iter().map(|&p| p + delta).collect())
    }

    #[test]
    fn estimated_lag_recovers_a_constant_offset() {
        // one beat per second for 95 s, the test stream 70 samples behind
        let reference = beats(96, 256);
        let test = offset(&reference, 70);
        let rows = windowed_match(&reference, &test, 256.0, &CompareConfig::default()).unwrap();
        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.epoch, i);
            assert_eq!(row.true_positives, 30);
            assert_eq!(row.false_negatives, 0);
            assert_eq!(row.false_positives, 0);
            assert_eq!(row.f1, 1.0);
        }
    }

    #[test]
    fn unaligned_offset_beyond_tolerance_scores_zero() {
        let reference = beats(96, 256);
        let test = offset(&reference, 70);
        let cfg = CompareConfig {
            lag: Some(LagMode::Off),
            ..CompareConfig::default()
        };
        let rows = windowed_match(&reference, &test, 256.0, &cfg).unwrap();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert_eq!(row.true_positives, 0);
            assert_eq!(row.f1, 0.0);
        }
    }

    #[test]
    fn fixed_lag_shifts_the_reference() {
        let reference = beats(96, 256);
        // 0.45 s at 256 Hz rounds to 115 samples
        let test = offset(&reference, 115);
        let cfg = CompareConfig {
            lag: Some(LagMode::Fixed(0.45)),
            tolerance_s: 0.01,
            ..CompareConfig::default()
        };
        let rows = windowed_match(&reference, &test, 256.0, &cfg).unwrap();
        assert!(!rows.is_empty());
        for row in &rows {
            assert_eq!(row.f1, 1.0);
        }
    }

    #[test]
    fn empty_streams_produce_an_empty_table() {
        let reference = beats(96, 256);
        let empty = Events::from_indices(Vec::new());
        let cfg = CompareConfig::default();
        assert!(windowed_match(&reference, &empty, 256.0, &cfg).unwrap().is_empty());
        assert!(windowed_match(&empty, &reference, 256.0, &cfg).unwrap().is_empty());
    }

    #[test]
    fn disjoint_streams_produce_an_empty_table() {
        let reference = beats(10, 256);
        let test = Events::from_indices((0..10).map(|i| 100_000 + i * 256).collect());
        // the default config estimates the lag; disjoint supports must fall
        // out as zero rows before estimation ever runs
        let rows = windowed_match(&reference, &test, 256.0, &CompareConfig::default()).unwrap();
        assert!(rows.is_empty());
        let cfg = CompareConfig {
            lag: Some(LagMode::Off),
            ..CompareConfig::default()
        };
        assert!(windowed_match(&reference, &test, 256.0, &cfg).unwrap().is_empty());
    }

    #[test]
    fn event_free_windows_score_all_zeros() {
        // beats in the first and third seconds only, one-second windows
        let stream = Events::from_indices(vec![0, 30, 60, 90, 200, 230, 260, 290, 299]);
        let cfg = CompareConfig {
            window_s: 1.0,
            lag: Some(LagMode::Off),
            ..CompareConfig::default()
        };
        let rows = windowed_match(&stream, &stream.clone(), 100.0, &cfg).unwrap();
        assert_eq!(rows.len(), 3);
        let gap = &rows[1];
        assert_eq!(gap.true_positives, 0);
        assert_eq!(gap.false_negatives, 0);
        assert_eq!(gap.false_positives, 0);
        assert_eq!(gap.sensitivity, 0.0);
        assert_eq!(gap.ppv, 0.0);
        assert_eq!(gap.f1, 0.0);
        assert_eq!(rows[0].true_positives, 4);
        assert_eq!(rows[2].true_positives, 5);
        assert_eq!(rows[0].f1, 1.0);
        assert_eq!(rows[2].f1, 1.0);
    }

    #[test]
    fn exact_multiple_extent_keeps_the_final_window() {
        let reference = Events::from_indices(vec![0, 50, 99, 150, 199]);
        let cfg = CompareConfig {
            window_s: 1.0,
            lag: Some(LagMode::Off),
            ..CompareConfig::default()
        };
        let rows = windowed_match(&reference, &reference.clone(), 100.0, &cfg).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].true_positives, 3);
        assert_eq!(rows[1].true_positives, 2);
    }

    #[test]
    fn invalid_sample_rate_is_rejected() {
        let reference = beats(10, 256);
        for fs in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = windowed_match(&reference, &reference.clone(), fs, &Default::default());
            assert!(matches!(result, Err(Error::InvalidInput(_))), "fs {fs}");
        }
    }

    #[test]
    fn unsorted_events_are_rejected() {
        let reference = Events::from_indices(vec![100, 50, 200]);
        let test = beats(10, 256);
        let result = windowed_match(&reference, &test, 256.0, &Default::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let duplicated = Events::from_indices(vec![50, 50, 200]);
        let result = windowed_rate_agreement(&duplicated, &test, 256.0, &Default::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn inverted_lag_bounds_are_rejected() {
        let reference = beats(10, 256);
        let cfg = CompareConfig {
            min_ptt_s: 0.6,
            max_ptt_s: 0.2,
            ..CompareConfig::default()
        };
        let result = windowed_match(&reference, &reference.clone(), 256.0, &cfg);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn rate_pipeline_defaults_to_the_fixed_shift() {
        // reference shifted by the default 0.45 s lands exactly on the test
        let reference = beats(101, 256);
        let test = offset(&reference, 115);
        let rows =
            windowed_rate_agreement(&reference, &test, 256.0, &CompareConfig::default()).unwrap();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert!(row.agreement.iter().all(|&v| v == 1.0));
        }
    }

    #[test]
    fn rate_pipeline_can_estimate_the_lag() {
        let reference = beats(101, 256);
        let test = offset(&reference, 77);
        let cfg = CompareConfig {
            lag: Some(LagMode::Estimated),
            ..CompareConfig::default()
        };
        let rows = windowed_rate_agreement(&reference, &test, 256.0, &cfg).unwrap();
        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert!(row.agreement.iter().all(|&v| v == 1.0));
        }
    }

    #[test]
    fn rate_pipeline_on_disjoint_streams_produces_an_empty_table() {
        let reference = beats(10, 256);
        let test = Events::from_indices((0..10).map(|i| 100_000 + i * 256).collect());
        let fixed = CompareConfig::default();
        assert!(windowed_rate_agreement(&reference, &test, 256.0, &fixed).unwrap().is_empty());
        let estimated = CompareConfig {
            lag: Some(LagMode::Estimated),
            ..CompareConfig::default()
        };
        let rows = windowed_rate_agreement(&reference, &test, 256.0, &estimated).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn rate_pipeline_requires_levels() {
        let reference = beats(10, 256);
        let cfg = CompareConfig {
            tolerance_bpm_levels: Vec::new(),
            ..CompareConfig::default()
        };
        let result = windowed_rate_agreement(&reference, &reference.clone(), 256.0, &cfg);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
