use serde::{Deserialize, Serialize};

/// Point events on a shared sample clock (e.g., R-peak or pulse-peak indices).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// First and last event as a closed span, `None` when there are no events.
    pub fn support(&self) -> Option<(usize, usize)> {
        let first = *self.indices.first()?;
        let last = *self.indices.last()?;
        Some((first, last))
    }

    pub fn is_strictly_increasing(&self) -> bool {
        self.indices.windows(2).all(|w| w[0] < w[1])
    }

    /// Events inside the closed range `[lo, hi]`.
    pub fn clipped_to(&self, lo: usize, hi: usize) -> Events {
        let start = self.indices.partition_point(|&p| p < lo);
        let stop = self.indices.partition_point(|&p| p <= hi);
        Events::from_indices(self.indices[start..stop].to_vec())
    }

    /// Events inside the half-open window `[start, end)`.
    pub fn in_window(&self, start: usize, end: usize) -> Events {
        let lo = self.indices.partition_point(|&p| p < start);
        let hi = self.indices.partition_point(|&p| p < end);
        Events::from_indices(self.indices[lo..hi].to_vec())
    }

    /// Every event moved by a constant number of samples, clamped at zero.
    pub fn shifted(&self, delta: i64) -> Events {
        let mut indices: Vec<usize> = self
            .indices
            .iter()
            .map(|&p| (p as i64 + delta).max(0) as usize)
            .collect();
        indices.dedup();
        Events::from_indices(indices)
    }
}

/// Forward inter-event intervals, padded with a trailing NaN so the series
/// stays index-aligned with its source events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalSeries {
    pub intervals: Vec<f64>,
}

impl IntervalSeries {
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Seconds view of a series recorded in samples.
    pub fn to_seconds(&self, fs: f64) -> IntervalSeries {
        IntervalSeries {
            intervals: self.intervals.iter().map(|&v| v / fs).collect(),
        }
    }
}

/// Per-event lag between two streams, in whole samples. One entry per
/// anchor event; `unresolved` counts the anchor intervals where no
/// candidate event was found before interpolation filled the gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LagSeries {
    pub samples: Vec<i64>,
    pub unresolved: usize,
}

impl LagSeries {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean_samples(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|&v| v as f64).sum::<f64>() / self.samples.len() as f64
    }
}
