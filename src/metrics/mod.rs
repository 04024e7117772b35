//! Ground-truth accuracy metrics.
//!
//! This module provides:
//!
//! - `AccuracyBounds` - distance-dependent positional and velocity thresholds
//! - `MetricsAggregator` - per-cycle precision, recall and accuracy rates
//! - `MetricsAccumulator` - running means and binned ratios over a replay
//!
//! Rates are reported as `Option<f64>`; `None` means there was nothing to
//! evaluate in that cycle.

mod accumulator;
mod aggregator;
mod thresholds;

pub use accumulator::{HitCounter, MetricsAccumulator, MetricsSummary, RunningMean};
pub use aggregator::{CycleInputs, CycleMetrics, MetricsAggregator};
pub use thresholds::{AccuracyBounds, BoundStep, DistanceBand};
