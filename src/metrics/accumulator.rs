//! Running metrics accumulated over a replay.

use std::collections::BTreeMap;

use serde::Serialize;

use super::thresholds::DistanceBand;
use crate::utils::ratio;

/// Mean of the values pushed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunningMean {
    sum: f64,
    count: usize,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value; `None` (not applicable) is skipped.
    pub fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.count += 1;
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Current mean, `None` until a value has been pushed.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Pass/total counter for a ratio metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HitCounter {
    pub hits: usize,
    pub total: usize,
}

impl HitCounter {
    pub fn record(&mut self, hit: bool) {
        self.total += 1;
        if hit {
            self.hits += 1;
        }
    }

    pub fn merge(&mut self, other: &HitCounter) {
        self.hits += other.hits;
        self.total += other.total;
    }

    pub fn rate(&self) -> Option<f64> {
        ratio(self.hits, self.total)
    }
}

/// Summary of the accumulated metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    /// Number of cycles that contributed.
    pub cycles: usize,
    pub mean_precision_rate: Option<f64>,
    pub mean_recall_rate: Option<f64>,
    pub positional_accuracy_rate: Option<f64>,
    pub velocity_accuracy: BTreeMap<DistanceBand, Option<f64>>,
}

/// Accumulator for cycle metrics across the replayed sequence.
///
/// Reported to the caller, never asserted.
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    cycles: usize,
    precision: RunningMean,
    recall: RunningMean,
    positional: HitCounter,
    velocity: BTreeMap<DistanceBand, HitCounter>,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the accumulator with one cycle's results.
    pub fn update(
        &mut self,
        precision_rate: Option<f64>,
        recall_rate: Option<f64>,
        positional: &HitCounter,
        velocity: &BTreeMap<DistanceBand, HitCounter>,
    ) {
        self.cycles += 1;
        self.precision.push(precision_rate);
        self.recall.push(recall_rate);
        self.positional.merge(positional);
        for (band, counter) in velocity {
            self.velocity.entry(*band).or_default().merge(counter);
        }
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub fn mean_precision_rate(&self) -> Option<f64> {
        self.precision.mean()
    }

    pub fn mean_recall_rate(&self) -> Option<f64> {
        self.recall.mean()
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            cycles: self.cycles,
            mean_precision_rate: self.precision.mean(),
            mean_recall_rate: self.recall.mean(),
            positional_accuracy_rate: self.positional.rate(),
            velocity_accuracy: DistanceBand::ALL
                .iter()
                .map(|band| (*band, self.velocity.get(band).and_then(|c| c.rate())))
                .collect(),
        }
    }
}
