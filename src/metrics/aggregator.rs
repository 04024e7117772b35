//! Per-cycle precision, recall and accuracy metrics.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::accumulator::{HitCounter, MetricsAccumulator, MetricsSummary};
use super::thresholds::{AccuracyBounds, DistanceBand};
use crate::config::ValidationConfig;
use crate::dynamic_object::{DynamicObject, ObjectId, Positioned, TimeFrame, Timestamp};
use crate::ground_truth::GroundTruthAssociation;
use crate::matching::FrameAssociator;
use crate::sensors::SensorSource;

/// Everything the aggregator needs for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleInputs<'a> {
    /// Fused output of the cycle.
    pub frame: &'a TimeFrame,
    /// Fused output associated with ground truth.
    pub ground_truth: &'a GroundTruthAssociation,
    /// Raw detections of each camera closest to the cycle timestamp.
    pub raw_frames: &'a [(SensorSource, &'a TimeFrame)],
}

/// Metrics of one cycle. Rates are `None` when not applicable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleMetrics {
    pub timestamp: Timestamp,
    pub precision_rate: Option<f64>,
    pub recall_rate: Option<f64>,
    pub precision_by_source: BTreeMap<SensorSource, Option<f64>>,
    pub positional_accuracy_rate: Option<f64>,
    pub velocity_accuracy: BTreeMap<DistanceBand, Option<f64>>,
    /// Fused id -> gt id.
    pub associated_objects: BTreeMap<ObjectId, ObjectId>,
    pub accurate_raw_detections: usize,
    pub confirmed_raw_detections: usize,
    pub gt_seen: usize,
    pub gt_covered: usize,
}

/// Computes cycle metrics and accumulates them over the replay.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    positional_bounds: AccuracyBounds,
    velocity_bounds: AccuracyBounds,
    gt_associator: FrameAssociator,
    raw_associator: FrameAssociator,
    accumulator: MetricsAccumulator,
}

impl MetricsAggregator {
    pub fn new(
        positional_bounds: AccuracyBounds,
        velocity_bounds: AccuracyBounds,
        gt_gate_distance: f64,
        raw_gate_distance: f64,
    ) -> Self {
        Self {
            positional_bounds,
            velocity_bounds,
            gt_associator: FrameAssociator::new(gt_gate_distance),
            raw_associator: FrameAssociator::new(raw_gate_distance),
            accumulator: MetricsAccumulator::new(),
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(
            config.positional_bounds.clone(),
            config.velocity_bounds.clone(),
            config.gt_gate_distance_m,
            config.raw_gate_distance_m,
        )
    }

    /// Compute the metrics of one cycle and fold them into the running totals.
    pub fn calc(&mut self, inputs: &CycleInputs<'_>) -> CycleMetrics {
        let fused: Vec<DynamicObject> = inputs.frame.active_objects().cloned().collect();
        let gt_objects: Vec<_> = inputs.ground_truth.ground_truth.values().copied().collect();
        let gt_to_fused = inputs.ground_truth.inverse();

        let mut precision = HitCounter::default();
        let mut precision_by_source = BTreeMap::new();
        let mut gt_seen = BTreeSet::new();

        for (source, raw_frame) in inputs.raw_frames {
            let raw: Vec<DynamicObject> = raw_frame.active_objects().cloned().collect();
            let raw_to_gt = self.gt_associator.associate(&raw, &gt_objects);
            let raw_to_fused = self.raw_associator.associate(&raw, &fused);
            let mut source_precision = HitCounter::default();

            for (raw_id, gt_id, _) in raw_to_gt.matches() {
                let (Some(gt), Some(detection)) =
                    (inputs.ground_truth.ground_truth.get(&gt_id), raw_frame.object(raw_id))
                else {
                    continue;
                };
                let Some(bound) = self.positional_bounds.threshold_at(gt.distance_to_origin()) else {
                    continue;
                };
                if gt.position_error(detection) > bound {
                    continue;
                }

                gt_seen.insert(gt_id);
                let confirmed = raw_to_fused
                    .matched_id(raw_id)
                    .and_then(|fused_id| inputs.frame.object(fused_id))
                    .is_some_and(|track| gt.position_error(track) <= bound);
                source_precision.record(confirmed);
            }

            precision.merge(&source_precision);
            precision_by_source.insert(*source, source_precision.rate());
        }

        let mut recall = HitCounter::default();
        for gt_id in &gt_seen {
            let covered = match (
                inputs.ground_truth.ground_truth.get(gt_id),
                gt_to_fused.get(gt_id).and_then(|id| inputs.frame.object(*id)),
            ) {
                (Some(gt), Some(track)) => self
                    .positional_bounds
                    .is_within(gt.distance_to_origin(), gt.position_error(track))
                    .unwrap_or(false),
                _ => false,
            };
            recall.record(covered);
        }

        let mut positional = HitCounter::default();
        let mut velocity: BTreeMap<DistanceBand, HitCounter> = BTreeMap::new();
        for (fused_id, _, _) in inputs.ground_truth.association.matches() {
            let (Some(gt), Some(track)) = (inputs.ground_truth.gt_for(fused_id), inputs.frame.object(fused_id))
            else {
                continue;
            };
            let range = gt.distance_to_origin();
            if let Some(within) = self.positional_bounds.is_within(range, gt.position_error(track)) {
                positional.record(within);
            }
            if let (Some(band), Some(within)) = (
                DistanceBand::for_range(range),
                self.velocity_bounds.is_within(range, gt.velocity_error(track)),
            ) {
                velocity.entry(band).or_default().record(within);
            }
        }

        let metrics = CycleMetrics {
            timestamp: inputs.frame.timestamp(),
            precision_rate: precision.rate(),
            recall_rate: recall.rate(),
            precision_by_source,
            positional_accuracy_rate: positional.rate(),
            velocity_accuracy: DistanceBand::ALL
                .iter()
                .map(|band| (*band, velocity.get(band).and_then(|c| c.rate())))
                .collect(),
            associated_objects: inputs.ground_truth.forward(),
            accurate_raw_detections: precision.total,
            confirmed_raw_detections: precision.hits,
            gt_seen: recall.total,
            gt_covered: recall.hits,
        };

        self.accumulator
            .update(metrics.precision_rate, metrics.recall_rate, &positional, &velocity);
        metrics
    }

    pub fn summary(&self) -> MetricsSummary {
        self.accumulator.summary()
    }
}
