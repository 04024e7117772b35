//! Simulation ground truth and its association to tracked objects.

use std::collections::BTreeMap;

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::dynamic_object::{DynamicObject, ObjectId, Positioned, TimeFrame, Timestamp};
use crate::ego_motion::{
    CoordinateTransformation, EgoMotionBuffer, NilCoordinateTransformation, WorldToEgoTransformation,
};
use crate::matching::{Association, FrameAssociator};
use crate::utils::lerp;
use crate::Result;

/// Coordinate frame the ground-truth table is recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundTruthFrame {
    /// Fixed world coordinates; converted with the ego pose at lookup time.
    #[default]
    World,
    /// Already relative to the ego vehicle.
    Ego,
}

/// One row of the ground-truth export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthSample {
    pub timestamp: Timestamp,
    pub id: ObjectId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub vx: f64,
    #[serde(default)]
    pub vy: f64,
}

/// Ground-truth object state at one timestamp, in the ego frame once looked up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthObject {
    pub id: ObjectId,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl GroundTruthObject {
    pub fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.vx, self.vy)
    }

    /// Position error of a tracked object against this ground truth.
    pub fn position_error(&self, object: &DynamicObject) -> f64 {
        (object.center() - self.position()).norm()
    }

    /// Velocity error of a tracked object against this ground truth.
    pub fn velocity_error(&self, object: &DynamicObject) -> f64 {
        (object.velocity() - self.velocity()).norm()
    }

    fn transformed<T: CoordinateTransformation + ?Sized>(&self, transform: &T) -> Self {
        let p = transform.transform_point(&self.position());
        let v = transform.transform_vector(&self.velocity());
        Self {
            id: self.id,
            x: p.x,
            y: p.y,
            vx: v.x,
            vy: v.y,
        }
    }
}

impl Positioned for GroundTruthObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

impl GroundTruthSample {
    fn object(&self) -> GroundTruthObject {
        GroundTruthObject {
            id: self.id,
            x: self.x,
            y: self.y,
            vx: self.vx,
            vy: self.vy,
        }
    }

    fn interpolate(&self, other: &GroundTruthSample, timestamp: Timestamp) -> GroundTruthObject {
        let span = other.timestamp.saturating_sub(self.timestamp);
        if span == 0 {
            return self.object();
        }
        let t = (timestamp - self.timestamp) as f64 / span as f64;
        GroundTruthObject {
            id: self.id,
            x: lerp(self.x, other.x, t),
            y: lerp(self.y, other.y, t),
            vx: lerp(self.vx, other.vx, t),
            vy: lerp(self.vy, other.vy, t),
        }
    }
}

/// Per-object ground-truth tracks, each ordered by timestamp.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthTable {
    tracks: BTreeMap<ObjectId, Vec<GroundTruthSample>>,
    frame: GroundTruthFrame,
}

impl GroundTruthTable {
    pub fn new(samples: Vec<GroundTruthSample>, frame: GroundTruthFrame) -> Self {
        let mut tracks: BTreeMap<ObjectId, Vec<GroundTruthSample>> = BTreeMap::new();
        for sample in samples {
            tracks.entry(sample.id).or_default().push(sample);
        }
        for track in tracks.values_mut() {
            track.sort_by_key(|s| s.timestamp);
        }
        Self { tracks, frame }
    }

    pub fn frame(&self) -> GroundTruthFrame {
        self.frame
    }

    pub fn num_objects(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// States of all objects alive at `timestamp`, in the table's own frame.
    ///
    /// Samples bracketing the timestamp are interpolated when they are at most
    /// `max_gap` apart. Outside a track's time span, or inside a larger gap
    /// where the object left the simulation, the nearest sample is used if it
    /// is within `tolerance`.
    pub fn states_at(&self, timestamp: Timestamp, tolerance: Timestamp, max_gap: Timestamp) -> Vec<GroundTruthObject> {
        self.tracks
            .values()
            .filter_map(|track| Self::track_state_at(track, timestamp, tolerance, max_gap))
            .collect()
    }

    fn track_state_at(
        track: &[GroundTruthSample],
        timestamp: Timestamp,
        tolerance: Timestamp,
        max_gap: Timestamp,
    ) -> Option<GroundTruthObject> {
        let idx = track.partition_point(|s| s.timestamp < timestamp);
        let before = idx.checked_sub(1).and_then(|i| track.get(i));
        let after = track.get(idx);
        match (before, after) {
            (_, Some(after)) if after.timestamp == timestamp => Some(after.object()),
            (Some(before), Some(after)) if after.timestamp - before.timestamp <= max_gap => {
                Some(before.interpolate(after, timestamp))
            }
            _ => {
                let nearest_before = before.filter(|s| timestamp - s.timestamp <= tolerance);
                let nearest_after = after.filter(|s| s.timestamp - timestamp <= tolerance);
                match (nearest_before, nearest_after) {
                    (Some(b), Some(a)) if a.timestamp - timestamp < timestamp - b.timestamp => Some(a.object()),
                    (Some(b), _) => Some(b.object()),
                    (None, Some(a)) => Some(a.object()),
                    (None, None) => None,
                }
            }
        }
    }
}

/// Ground-truth association of one timeframe.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroundTruthAssociation {
    pub timestamp: Timestamp,
    /// Tracked id -> association outcome against ground truth.
    pub association: Association,
    /// Ground truth at the frame timestamp, in the ego frame.
    pub ground_truth: BTreeMap<ObjectId, GroundTruthObject>,
}

impl GroundTruthAssociation {
    /// Tracked id -> gt id.
    pub fn forward(&self) -> BTreeMap<ObjectId, ObjectId> {
        self.association.forward()
    }

    /// Gt id -> tracked id.
    pub fn inverse(&self) -> BTreeMap<ObjectId, ObjectId> {
        self.association.inverse()
    }

    /// Ground truth matched to a tracked object.
    pub fn gt_for(&self, tracked_id: ObjectId) -> Option<&GroundTruthObject> {
        self.association
            .matched_id(tracked_id)
            .and_then(|gt_id| self.ground_truth.get(&gt_id))
    }

    pub fn has_ground_truth(&self) -> bool {
        !self.ground_truth.is_empty()
    }
}

/// Per-timeframe one-to-one assignment of tracked objects to ground truth.
#[derive(Debug, Clone, Copy)]
pub struct GroundTruthAssociator<'a> {
    table: &'a GroundTruthTable,
    ego: &'a EgoMotionBuffer,
    associator: FrameAssociator,
    time_tolerance: Timestamp,
    max_sample_gap: Timestamp,
}

/// Default largest sample spacing still interpolated as one continuous track.
pub const DEFAULT_MAX_SAMPLE_GAP_US: Timestamp = 1_000_000;

impl<'a> GroundTruthAssociator<'a> {
    pub fn new(
        table: &'a GroundTruthTable,
        ego: &'a EgoMotionBuffer,
        gate_distance: f64,
        time_tolerance: Timestamp,
    ) -> Self {
        Self {
            table,
            ego,
            associator: FrameAssociator::new(gate_distance),
            time_tolerance,
            max_sample_gap: DEFAULT_MAX_SAMPLE_GAP_US,
        }
    }

    /// Treat sample spacings above `max_gap` as the object being absent.
    pub fn with_max_sample_gap(mut self, max_gap: Timestamp) -> Self {
        self.max_sample_gap = max_gap;
        self
    }

    /// Ground truth at `timestamp`, expressed in the ego frame of that timestamp.
    ///
    /// Fails if the table is in world coordinates and the ego buffer does not
    /// cover the timestamp.
    pub fn get_gt_at_timeframe(&self, timestamp: Timestamp) -> Result<BTreeMap<ObjectId, GroundTruthObject>> {
        let to_ego: Box<dyn CoordinateTransformation> = match self.table.frame() {
            GroundTruthFrame::Ego => Box::new(NilCoordinateTransformation),
            GroundTruthFrame::World => Box::new(WorldToEgoTransformation::new(&self.ego.pose_at(timestamp)?)),
        };
        Ok(self
            .table
            .states_at(timestamp, self.time_tolerance, self.max_sample_gap)
            .iter()
            .map(|s| (s.id, s.transformed(to_ego.as_ref())))
            .collect())
    }

    /// Associate the non-deleted objects of `frame` with ground truth.
    pub fn associate(&self, frame: &TimeFrame) -> Result<GroundTruthAssociation> {
        let ground_truth = self.get_gt_at_timeframe(frame.timestamp())?;
        let tracked: Vec<DynamicObject> = frame.active_objects().cloned().collect();
        let gt: Vec<GroundTruthObject> = ground_truth.values().copied().collect();

        Ok(GroundTruthAssociation {
            timestamp: frame.timestamp(),
            association: self.associator.associate(&tracked, &gt),
            ground_truth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic_object::ObjectState;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn sample(timestamp: Timestamp, id: ObjectId, x: f64, y: f64) -> GroundTruthSample {
        GroundTruthSample { timestamp, id, x, y, vx: 1.0, vy: 0.0 }
    }

    fn ego_still() -> EgoMotionBuffer {
        EgoMotionBuffer::from_samples(&[(0, 0.0, 0.0, 0.0), (10_000_000, 0.0, 0.0, 0.0)]).unwrap()
    }

    #[test]
    fn test_states_at_interpolates() {
        let table = GroundTruthTable::new(
            vec![sample(0, 1, 0.0, 0.0), sample(100_000, 1, 1.0, 2.0)],
            GroundTruthFrame::Ego,
        );
        let states = table.states_at(50_000, 0, DEFAULT_MAX_SAMPLE_GAP_US);
        assert_eq!(states.len(), 1);
        assert_relative_eq!(states[0].x, 0.5);
        assert_relative_eq!(states[0].y, 1.0);
    }

    #[test]
    fn test_states_at_respects_tolerance() {
        let table = GroundTruthTable::new(
            vec![sample(100_000, 1, 0.0, 0.0), sample(200_000, 1, 1.0, 0.0)],
            GroundTruthFrame::Ego,
        );
        assert!(table.states_at(50_000, 10_000, DEFAULT_MAX_SAMPLE_GAP_US).is_empty());
        assert_eq!(table.states_at(95_000, 10_000, DEFAULT_MAX_SAMPLE_GAP_US).len(), 1);
        assert_eq!(table.states_at(205_000, 10_000, DEFAULT_MAX_SAMPLE_GAP_US).len(), 1);
        assert!(table.states_at(300_000, 10_000, DEFAULT_MAX_SAMPLE_GAP_US).is_empty());
    }

    #[test]
    fn test_states_at_skips_track_gaps() {
        // Object leaves the simulation after 0.1 s and returns at 10 s
        let table = GroundTruthTable::new(
            vec![sample(0, 5, 0.0, 0.0), sample(100_000, 5, 0.1, 0.0), sample(10_000_000, 5, 10.0, 0.0)],
            GroundTruthFrame::Ego,
        );
        let ego = ego_still();
        let associator = GroundTruthAssociator::new(&table, &ego, 1.0, 50_000);

        assert!(associator.get_gt_at_timeframe(5_000_000).unwrap().is_empty());
        assert_relative_eq!(associator.get_gt_at_timeframe(50_000).unwrap()[&5].x, 0.05);
        // Near either edge of the gap the closest sample is used
        assert_relative_eq!(associator.get_gt_at_timeframe(140_000).unwrap()[&5].x, 0.1);
        assert_relative_eq!(associator.get_gt_at_timeframe(9_960_000).unwrap()[&5].x, 10.0);

        let bridged = associator.with_max_sample_gap(10_000_000);
        assert_eq!(bridged.get_gt_at_timeframe(5_000_000).unwrap().len(), 1);
    }

    #[test]
    fn test_world_ground_truth_moved_into_ego_frame() {
        let ego = EgoMotionBuffer::from_samples(&[(0, 0.0, 0.0, 0.0), (1_000_000, 10.0, 0.0, 0.0)]).unwrap();
        let table = GroundTruthTable::new(
            vec![sample(0, 4, 20.0, 1.0), sample(1_000_000, 4, 20.0, 1.0)],
            GroundTruthFrame::World,
        );
        let associator = GroundTruthAssociator::new(&table, &ego, 1.0, 0);
        let gt = associator.get_gt_at_timeframe(500_000).unwrap();
        assert_relative_eq!(gt[&4].x, 15.0, epsilon = 1e-9);
        assert_relative_eq!(gt[&4].y, 1.0, epsilon = 1e-9);

        assert!(associator.get_gt_at_timeframe(2_000_000).is_err());
    }

    #[test]
    fn test_associate_forward_and_inverse() {
        let ego = ego_still();
        let table = GroundTruthTable::new(
            vec![
                sample(1_000, 100, 5.0, 0.0),
                sample(1_000, 101, 0.0, 5.0),
                sample(1_000, 102, -5.0, 0.0),
            ],
            GroundTruthFrame::Ego,
        );
        let frame = TimeFrame::new(
            1_000,
            vec![
                DynamicObject::new(1, 5.2, 0.1, 0.9, ObjectState::Measured),
                DynamicObject::new(2, 0.1, 4.8, 0.9, ObjectState::Predicted),
                DynamicObject::new(3, -5.0, 0.0, 0.9, ObjectState::Deleted),
            ],
        )
        .unwrap();

        let result = GroundTruthAssociator::new(&table, &ego, 1.0, 0).associate(&frame).unwrap();
        let forward = result.forward();
        assert_eq!(forward.get(&1), Some(&100));
        assert_eq!(forward.get(&2), Some(&101));
        // Deleted objects are not associated
        assert!(result.association.outcome(3).is_none());

        // Inverse recovers the pairs and never repeats a gt id
        let inverse = result.inverse();
        for (gt_id, tracked_id) in &inverse {
            assert_eq!(forward.get(tracked_id), Some(gt_id));
        }
        let gt_ids: HashSet<_> = forward.values().collect();
        assert_eq!(gt_ids.len(), forward.len());

        assert_eq!(result.gt_for(1).map(|g| g.id), Some(100));
        assert_relative_eq!(
            result.gt_for(1).unwrap().position_error(frame.object(1).unwrap()),
            (0.04f64 + 0.01).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_associate_without_ground_truth() {
        let ego = ego_still();
        let table = GroundTruthTable::default();
        let frame = TimeFrame::new(
            1_000,
            vec![DynamicObject::new(1, 5.0, 0.0, 0.9, ObjectState::Measured)],
        )
        .unwrap();
        let result = GroundTruthAssociator::new(&table, &ego, 1.0, 0).associate(&frame).unwrap();
        assert!(!result.has_ground_truth());
        assert!(result.association.is_missing(1));
    }
}
