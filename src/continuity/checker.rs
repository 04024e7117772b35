//! Sequential identity-continuity checks over the replayed frames.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::state::ContinuityState;
use super::violation::{RuleName, Violation};
use crate::config::ValidationConfig;
use crate::dynamic_object::{
    micros_to_secs, secs_to_micros, DynamicObject, ObjectId, ObjectState, Positioned, TimeFrame, Timestamp,
};
use crate::ego_motion::{EgoMotion, MotionCompensator};
use crate::matching::{select_closest_to_origin, AssociationOutcome, FrameAssociator};
use crate::sensors::{SensorCapability, SensorSource, SensorSuite};
use crate::Result;

/// Inputs of one checker step.
#[derive(Debug, Clone, Copy)]
pub struct CycleInput<'a> {
    /// Fused output of the current cycle.
    pub frame: &'a TimeFrame,
    /// Fused output of the previous cycle.
    pub previous: Option<&'a TimeFrame>,
    /// Transform from the previous ego frame into the current one.
    pub motion: Option<&'a EgoMotion>,
    /// Raw detections per camera at the current cycle.
    pub raw_frames: &'a [(SensorSource, &'a TimeFrame)],
    /// Configured cameras without a frame at the current cycle.
    pub missing_sources: &'a [SensorSource],
    /// Raw detections per camera at the previous cycle.
    pub previous_raw_frames: &'a [(SensorSource, &'a TimeFrame)],
}

/// An association the checker could not resolve; no verdict was drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ambiguity {
    pub object_id: ObjectId,
    pub rule: RuleName,
    pub candidate_ids: Vec<ObjectId>,
}

/// Findings of one checker step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub violations: Vec<Violation>,
    pub ambiguities: Vec<Ambiguity>,
}

/// Raw-detection support of one fused object, combined over cameras.
#[derive(Debug, Clone, PartialEq)]
enum RawStatus {
    Matched { best_raw_prob: f64 },
    Missing,
    Ambiguous(Vec<ObjectId>),
}

#[derive(Debug, Clone)]
enum PendingUpdate {
    Observe(DynamicObject),
    Delete(ObjectId),
    StartPrediction(ObjectId),
    EndPrediction(ObjectId),
}

/// State machine enforcing the identity-continuity rules.
///
/// Each call to [`step`](Self::step) reads the whole frame against the state
/// left by the previous frame, then commits the frame's updates.
#[derive(Debug, Clone)]
pub struct IdentityContinuityChecker {
    config: ValidationConfig,
    suite: SensorSuite,
    reuse_time_us: Timestamp,
    frame_associator: FrameAssociator,
    raw_associator: FrameAssociator,
    state: ContinuityState,
}

impl IdentityContinuityChecker {
    pub fn new(config: &ValidationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            suite: config.sensor_suite()?,
            reuse_time_us: secs_to_micros(config.reuse_time_s),
            frame_associator: FrameAssociator::new(config.association_gate_m),
            raw_associator: FrameAssociator::new(config.raw_gate_distance_m),
            state: ContinuityState::new(),
            config: config.clone(),
        })
    }

    pub fn state(&self) -> &ContinuityState {
        &self.state
    }

    /// Check one cycle and advance the continuity state.
    pub fn step(&mut self, input: &CycleInput<'_>) -> StepOutcome {
        let timestamp = input.frame.timestamp();
        self.state.purge_expired(timestamp, self.reuse_time_us);

        let mut outcome = StepOutcome::default();
        let mut pending = Vec::new();

        let active: Vec<DynamicObject> = input.frame.active_objects().cloned().collect();
        let raw_status = if input.raw_frames.is_empty() {
            BTreeMap::new()
        } else {
            self.raw_status(&active, input.raw_frames, input.missing_sources)
        };

        for object in input.frame.dynamic_objects() {
            let id = object.object_id;
            if object.is_deleted() {
                pending.push(PendingUpdate::Delete(id));
                continue;
            }

            if self.config.rule_enabled(RuleName::PrematureReuse) {
                outcome.violations.extend(self.check_premature_reuse(object, timestamp));
            }

            match raw_status.get(&id) {
                Some(RawStatus::Missing) => {
                    if self.state.prediction_start(id).is_none() {
                        pending.push(PendingUpdate::StartPrediction(id));
                    }
                }
                Some(RawStatus::Matched { best_raw_prob }) => {
                    if let Some(start) = self.state.prediction_start(id) {
                        pending.push(PendingUpdate::EndPrediction(id));
                        if self.config.rule_enabled(RuleName::PredictionDuration) {
                            outcome
                                .violations
                                .extend(self.check_prediction_duration(id, start, timestamp));
                        }
                    }
                    if self.config.rule_enabled(RuleName::MeasuredConfidenceDrop) {
                        outcome
                            .violations
                            .extend(self.check_confidence_drop(object, *best_raw_prob, timestamp));
                    }
                }
                Some(RawStatus::Ambiguous(candidate_ids)) => {
                    outcome.ambiguities.push(Ambiguity {
                        object_id: id,
                        rule: RuleName::PredictionDuration,
                        candidate_ids: candidate_ids.clone(),
                    });
                }
                None => {}
            }

            pending.push(PendingUpdate::Observe(object.clone()));
        }

        if let Some(motion) = input.motion {
            if let Some(previous) = input.previous {
                if self.config.rule_enabled(RuleName::IdSwitch) {
                    self.check_id_switch(input.frame, &active, previous, motion, &mut outcome);
                }
            }
            if self.config.rule_enabled(RuleName::CapacityRetention) {
                self.check_capacity_retention(&active, input.previous_raw_frames, motion, timestamp, &mut outcome);
            }
        }

        let present: BTreeSet<ObjectId> = input.frame.dynamic_objects().iter().map(|o| o.object_id).collect();
        self.commit(pending, &present, timestamp);
        outcome
    }

    fn commit(&mut self, pending: Vec<PendingUpdate>, present: &BTreeSet<ObjectId>, timestamp: Timestamp) {
        for update in pending {
            match update {
                PendingUpdate::Observe(object) => self.state.observe(&object, timestamp),
                PendingUpdate::Delete(id) => self.state.mark_deleted(id, timestamp),
                PendingUpdate::StartPrediction(id) => self.state.start_prediction(id, timestamp),
                PendingUpdate::EndPrediction(id) => {
                    self.state.end_prediction(id);
                }
            }
        }
        self.state.forget_absent(present, timestamp, self.reuse_time_us);
    }

    /// Associate fused objects with each camera separately.
    ///
    /// Any camera match wins; the object is missing only if every camera
    /// reports it missing. Objects a camera without a frame could have seen
    /// get no status.
    fn raw_status(
        &self,
        fused: &[DynamicObject],
        raw_frames: &[(SensorSource, &TimeFrame)],
        missing_sources: &[SensorSource],
    ) -> BTreeMap<ObjectId, RawStatus> {
        let mut status: BTreeMap<ObjectId, RawStatus> =
            fused.iter().map(|o| (o.object_id, RawStatus::Missing)).collect();

        for (_, raw_frame) in raw_frames {
            let raw: Vec<DynamicObject> = raw_frame.active_objects().cloned().collect();
            let association = self.raw_associator.associate(fused, &raw);

            for (id, current) in status.iter_mut() {
                match association.outcome(*id) {
                    Some(AssociationOutcome::Matched { candidate_id, .. }) => {
                        let prob = raw_frame.object(*candidate_id).map_or(0.0, |o| o.existence_prob);
                        match current {
                            RawStatus::Matched { best_raw_prob } => {
                                *best_raw_prob = (*best_raw_prob).max(prob);
                            }
                            _ => *current = RawStatus::Matched { best_raw_prob: prob },
                        }
                    }
                    Some(AssociationOutcome::Ambiguous { candidate_ids }) => match current {
                        RawStatus::Missing => *current = RawStatus::Ambiguous(candidate_ids.clone()),
                        RawStatus::Ambiguous(ids) => ids.extend(candidate_ids.iter().copied()),
                        RawStatus::Matched { .. } => {}
                    },
                    Some(AssociationOutcome::Missing) | None => {}
                }
            }
        }

        for object in fused {
            let unobserved = missing_sources.iter().any(|source| source.observes(&object.center()));
            if unobserved && status.get(&object.object_id) == Some(&RawStatus::Missing) {
                status.remove(&object.object_id);
            }
        }
        status
    }

    fn check_premature_reuse(&self, object: &DynamicObject, timestamp: Timestamp) -> Option<Violation> {
        if object.state != ObjectState::Predicted {
            return None;
        }
        let entry = self.state.entry(object.object_id)?;
        if entry.last_state == ObjectState::Deleted {
            return None;
        }
        let reference = entry.deleted_at.unwrap_or(entry.last_seen);
        if timestamp.saturating_sub(reference) >= self.reuse_time_us {
            return None;
        }
        if !self.suite.in_field_of_view(&object.center()) {
            return None;
        }

        (object.existence_prob > entry.last_existence_prob + self.config.probability_epsilon).then(|| {
            Violation::new(
                timestamp,
                object.object_id,
                RuleName::PrematureReuse,
                object.existence_prob,
                entry.last_existence_prob,
            )
        })
    }

    fn check_prediction_duration(&self, id: ObjectId, start: Timestamp, timestamp: Timestamp) -> Option<Violation> {
        let duration = micros_to_secs(timestamp.saturating_sub(start));
        let bound = if duration < self.config.min_tracking_time_s {
            self.config.min_tracking_time_s
        } else if duration > self.config.max_tracking_time_s {
            self.config.max_tracking_time_s
        } else {
            return None;
        };
        Some(Violation::new(timestamp, id, RuleName::PredictionDuration, duration, bound))
    }

    fn check_confidence_drop(
        &self,
        object: &DynamicObject,
        best_raw_prob: f64,
        timestamp: Timestamp,
    ) -> Option<Violation> {
        if object.state != ObjectState::Measured {
            return None;
        }
        let entry = self.state.entry(object.object_id)?;
        if entry.deleted_at.is_some() || entry.last_state != ObjectState::Measured {
            return None;
        }
        let dropped = object.existence_prob < entry.last_existence_prob - self.config.probability_epsilon;
        (best_raw_prob >= entry.last_existence_prob && dropped).then(|| {
            Violation::new(
                timestamp,
                object.object_id,
                RuleName::MeasuredConfidenceDrop,
                object.existence_prob,
                entry.last_existence_prob,
            )
        })
    }

    /// A new id that takes the place of a vanished one is an identity switch.
    fn check_id_switch(
        &self,
        frame: &TimeFrame,
        active: &[DynamicObject],
        previous: &TimeFrame,
        motion: &EgoMotion,
        outcome: &mut StepOutcome,
    ) {
        let new_objects: Vec<DynamicObject> = active
            .iter()
            .filter(|o| !previous.contains(o.object_id))
            .cloned()
            .collect();
        if new_objects.is_empty() {
            return;
        }
        let candidates: Vec<DynamicObject> = previous.active_objects().cloned().collect();
        let association = self
            .frame_associator
            .associate_compensated(&new_objects, &candidates, motion);

        for (new_id, previous_id, _) in association.matches() {
            if !frame.contains(previous_id) {
                outcome.violations.push(Violation::new(
                    frame.timestamp(),
                    new_id,
                    RuleName::IdSwitch,
                    f64::from(new_id),
                    f64::from(previous_id),
                ));
            }
        }
        for (new_id, candidate_ids) in association.ambiguous() {
            outcome.ambiguities.push(Ambiguity {
                object_id: new_id,
                rule: RuleName::IdSwitch,
                candidate_ids: candidate_ids.to_vec(),
            });
        }
    }

    /// The fused output must keep the raw candidates closest to the ego.
    fn check_capacity_retention(
        &self,
        active: &[DynamicObject],
        previous_raw_frames: &[(SensorSource, &TimeFrame)],
        motion: &EgoMotion,
        timestamp: Timestamp,
        outcome: &mut StepOutcome,
    ) {
        let (candidates, raw_ids) = self.capacity_candidates(previous_raw_frames);
        if candidates.len() <= self.config.max_num_objects {
            return;
        }

        let compensated = MotionCompensator::transform_all(&candidates, motion);
        let association = self.raw_associator.associate(&compensated, active);

        let furthest_retained = compensated
            .iter()
            .filter(|c| association.matched_id(c.object_id).is_some())
            .map(|c| c.distance_to_origin())
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));
        let Some(furthest_retained) = furthest_retained else {
            return;
        };

        for candidate_id in select_closest_to_origin(&compensated, self.config.max_num_objects) {
            let idx = candidate_id as usize;
            let (Some(candidate), Some(raw_id)) = (compensated.get(idx), raw_ids.get(idx)) else {
                continue;
            };
            match association.outcome(candidate_id) {
                Some(AssociationOutcome::Missing) => {
                    let distance = candidate.distance_to_origin();
                    if distance < furthest_retained {
                        outcome.violations.push(Violation::new(
                            timestamp,
                            *raw_id,
                            RuleName::CapacityRetention,
                            distance,
                            furthest_retained,
                        ));
                    }
                }
                Some(AssociationOutcome::Ambiguous { candidate_ids }) => {
                    outcome.ambiguities.push(Ambiguity {
                        object_id: *raw_id,
                        rule: RuleName::CapacityRetention,
                        candidate_ids: candidate_ids.clone(),
                    });
                }
                _ => {}
            }
        }
    }

    /// Union of raw detections over all cameras, merged within the raw gate.
    ///
    /// Candidates are re-keyed by position in the returned vector; the second
    /// vector holds the originating raw ids.
    fn capacity_candidates(
        &self,
        raw_frames: &[(SensorSource, &TimeFrame)],
    ) -> (Vec<DynamicObject>, Vec<ObjectId>) {
        let gate = self.raw_associator.max_gate_distance;
        let mut merged: Vec<DynamicObject> = Vec::new();
        let mut raw_ids = Vec::new();

        for (_, frame) in raw_frames {
            for detection in frame.active_objects() {
                if merged.iter().any(|m| (m.center() - detection.center()).norm() <= gate) {
                    continue;
                }
                let mut candidate = detection.clone();
                candidate.object_id = merged.len() as ObjectId;
                raw_ids.push(detection.object_id);
                merged.push(candidate);
            }
        }
        (merged, raw_ids)
    }
}
