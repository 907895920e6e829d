use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Fixed-depth history of harmonic vectors for one signal, oldest first
///
/// Every slot starts as a zero vector. Until `depth` real samples have been
/// pushed, the statistics include those zero slots and are biased toward zero.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    slots: VecDeque<Vec<f64>>,
    width: usize,
    pushed: usize,
}

impl HistoryBuffer {
    /// Create a zero-filled history of `depth` vectors of `width` coefficients
    pub fn new(depth: usize, width: usize) -> Self {
        let depth = depth.max(1);
        Self {
            slots: (0..depth).map(|_| vec![0.0; width]).collect(),
            width,
            pushed: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Real samples pushed so far, saturating at the depth
    pub fn filled(&self) -> usize {
        self.pushed.min(self.depth())
    }

    /// Drop the oldest vector and append `sample` as the newest
    pub fn push(&mut self, sample: Vec<f64>) {
        debug_assert_eq!(sample.len(), self.width);
        self.slots.pop_front();
        self.slots.push_back(sample);
        self.pushed = self.pushed.saturating_add(1);
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.slots.iter().map(Vec::as_slice)
    }

    /// Elementwise arithmetic mean over all slots
    pub fn mean(&self) -> Vec<f64> {
        let n = self.depth() as f64;
        let mut mean = vec![0.0; self.width];
        for slot in &self.slots {
            for (acc, v) in mean.iter_mut().zip(slot) {
                *acc += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);
        mean
    }

    /// Elementwise sample variance over all slots (divides by depth - 1)
    pub fn variance(&self, mean: &[f64]) -> Vec<f64> {
        let depth = self.depth();
        let mut variance = vec![0.0; self.width];
        if depth < 2 {
            return variance;
        }
        for slot in &self.slots {
            for ((acc, v), m) in variance.iter_mut().zip(slot).zip(mean) {
                let d = v - m;
                *acc += d * d;
            }
        }
        let denom = (depth - 1) as f64;
        variance.iter_mut().for_each(|s| *s /= denom);
        variance
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let mean = self.mean();
        let variance = self.variance(&mean);
        StatsSnapshot {
            mean,
            variance,
            samples: self.filled(),
            updated_at: Some(Utc::now()),
        }
    }
}

/// Published statistics for one tracked signal
///
/// Snapshots are immutable once published; each tick swaps in a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    /// Real samples behind these statistics (at most the averaging depth)
    pub samples: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatsSnapshot {
    pub fn empty(width: usize) -> Self {
        Self {
            mean: vec![0.0; width],
            variance: vec![0.0; width],
            samples: 0,
            updated_at: None,
        }
    }

    /// Whether the statistics still include zero-initialized slots
    pub fn is_warming_up(&self, depth: usize) -> bool {
        self.samples < depth
    }
}
