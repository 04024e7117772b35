//! Gated nearest-candidate association between two object sets.

use std::collections::{BTreeMap, HashMap};

use nalgebra::DMatrix;
use serde::Serialize;

use crate::dynamic_object::{DynamicObject, ObjectId, Positioned};
use crate::ego_motion::{CoordinateTransformation, MotionCompensator};
use crate::utils::warn_once;

/// Result of associating one current object against a candidate set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssociationOutcome {
    /// Exactly one candidate inside the gate.
    Matched { candidate_id: ObjectId, distance: f64 },
    /// Several candidates compete; the association cannot be asserted.
    Ambiguous { candidate_ids: Vec<ObjectId> },
    /// No candidate inside the gate.
    Missing,
}

/// Mapping from current object ids to their association outcome.
///
/// Injective over `Matched` entries: no two current ids share a candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Association {
    outcomes: BTreeMap<ObjectId, AssociationOutcome>,
}

impl Association {
    pub fn outcome(&self, current_id: ObjectId) -> Option<&AssociationOutcome> {
        self.outcomes.get(&current_id)
    }

    /// Matched candidate for `current_id`, if the match is unambiguous.
    pub fn matched_id(&self, current_id: ObjectId) -> Option<ObjectId> {
        match self.outcomes.get(&current_id) {
            Some(AssociationOutcome::Matched { candidate_id, .. }) => Some(*candidate_id),
            _ => None,
        }
    }

    pub fn is_missing(&self, current_id: ObjectId) -> bool {
        matches!(self.outcomes.get(&current_id), Some(AssociationOutcome::Missing))
    }

    pub fn is_ambiguous(&self, current_id: ObjectId) -> bool {
        matches!(
            self.outcomes.get(&current_id),
            Some(AssociationOutcome::Ambiguous { .. })
        )
    }

    /// Iterate `(current_id, candidate_id, distance)` over unambiguous matches.
    pub fn matches(&self) -> impl Iterator<Item = (ObjectId, ObjectId, f64)> + '_ {
        self.outcomes.iter().filter_map(|(&id, outcome)| match outcome {
            AssociationOutcome::Matched { candidate_id, distance } => Some((id, *candidate_id, *distance)),
            _ => None,
        })
    }

    /// Current ids whose association was skipped as ambiguous.
    pub fn ambiguous(&self) -> impl Iterator<Item = (ObjectId, &[ObjectId])> + '_ {
        self.outcomes.iter().filter_map(|(&id, outcome)| match outcome {
            AssociationOutcome::Ambiguous { candidate_ids } => Some((id, candidate_ids.as_slice())),
            _ => None,
        })
    }

    /// Current ids with no candidate inside the gate.
    pub fn missing(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| **outcome == AssociationOutcome::Missing)
            .map(|(&id, _)| id)
    }

    /// Forward view of unambiguous matches.
    pub fn forward(&self) -> BTreeMap<ObjectId, ObjectId> {
        self.matches().map(|(id, candidate, _)| (id, candidate)).collect()
    }

    /// Inverse view (candidate id -> current id) of unambiguous matches.
    pub fn inverse(&self) -> BTreeMap<ObjectId, ObjectId> {
        self.matches().map(|(id, candidate, _)| (candidate, id)).collect()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn num_matches(&self) -> usize {
        self.matches().count()
    }
}

/// Check if a matrix contains NaN values.
pub fn has_nan(matrix: &DMatrix<f64>) -> bool {
    matrix.iter().any(|&x| x.is_nan())
}

/// Euclidean center distances, shape (n_current x n_candidates).
pub fn distance_matrix<A, B>(current: &[A], candidates: &[B]) -> DMatrix<f64>
where
    A: Positioned + Sync,
    B: Positioned + Sync,
{
    let rows = current.len();
    let cols = candidates.len();

    #[cfg(feature = "parallel")]
    let values: Vec<f64> = {
        use rayon::prelude::*;
        current
            .par_iter()
            .flat_map_iter(|a| {
                let pa = a.position();
                candidates.iter().map(move |b| (pa - b.position()).norm())
            })
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let values: Vec<f64> = current
        .iter()
        .flat_map(|a| {
            let pa = a.position();
            candidates.iter().map(move |b| (pa - b.position()).norm())
        })
        .collect();

    DMatrix::from_row_slice(rows, cols, &values)
}

/// Nearest-candidate association under a distance gate.
///
/// Each current object is matched only when exactly one candidate lies within
/// `max_gate_distance`. Competing candidates make the association ambiguous and
/// it is skipped rather than guessed; the same holds when one candidate is the
/// sole in-gate candidate of several current objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAssociator {
    pub max_gate_distance: f64,
}

impl FrameAssociator {
    pub fn new(max_gate_distance: f64) -> Self {
        Self { max_gate_distance }
    }

    /// Associate two object sets already expressed in the same frame.
    pub fn associate<A, B>(&self, current: &[A], candidates: &[B]) -> Association
    where
        A: Positioned + Sync,
        B: Positioned + Sync,
    {
        let distances = distance_matrix(current, candidates);
        if has_nan(&distances) {
            warn_once("non-finite object positions are never associated");
        }
        self.associate_matrix(current, candidates, &distances)
    }

    /// Motion-compensate `candidates` into the current frame, then associate.
    pub fn associate_compensated<T>(
        &self,
        current: &[DynamicObject],
        candidates: &[DynamicObject],
        motion: &T,
    ) -> Association
    where
        T: CoordinateTransformation + ?Sized,
    {
        let compensated = MotionCompensator::transform_all(candidates, motion);
        self.associate(current, &compensated)
    }

    fn associate_matrix<A, B>(
        &self,
        current: &[A],
        candidates: &[B],
        distances: &DMatrix<f64>,
    ) -> Association
    where
        A: Positioned,
        B: Positioned,
    {
        let mut outcomes = BTreeMap::new();
        // candidate column -> current rows claiming it as their only in-gate candidate
        let mut claims: HashMap<usize, Vec<usize>> = HashMap::new();

        for (i, obj) in current.iter().enumerate() {
            let in_gate: Vec<usize> = (0..candidates.len())
                .filter(|&j| {
                    let d = distances[(i, j)];
                    d.is_finite() && d <= self.max_gate_distance
                })
                .collect();

            let outcome = match in_gate.as_slice() {
                [] => AssociationOutcome::Missing,
                [j] => {
                    claims.entry(*j).or_default().push(i);
                    AssociationOutcome::Matched {
                        candidate_id: candidates[*j].id(),
                        distance: distances[(i, *j)],
                    }
                }
                many => AssociationOutcome::Ambiguous {
                    candidate_ids: many.iter().map(|&j| candidates[j].id()).collect(),
                },
            };
            outcomes.insert(obj.id(), outcome);
        }

        for (j, rows) in claims {
            if rows.len() < 2 {
                continue;
            }
            for i in rows {
                outcomes.insert(
                    current[i].id(),
                    AssociationOutcome::Ambiguous {
                        candidate_ids: vec![candidates[j].id()],
                    },
                );
            }
        }

        Association { outcomes }
    }
}

/// Keep the `capacity` objects closest to the ego origin.
///
/// Objects are ordered by their minimum distance to the origin (ties broken by
/// id) and the first `capacity` ids are returned in that order.
pub fn select_closest_to_origin<P: Positioned>(objects: &[P], capacity: usize) -> Vec<ObjectId> {
    let mut ranked: Vec<(f64, ObjectId)> = objects
        .iter()
        .map(|o| (o.distance_to_origin(), o.id()))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    ranked.into_iter().take(capacity).map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic_object::ObjectState;
    use crate::ego_motion::EgoMotion;
    use std::collections::HashSet;

    fn obj(id: ObjectId, x: f64, y: f64) -> DynamicObject {
        DynamicObject::new(id, x, y, 0.9, ObjectState::Measured)
    }

    // ===== Test Gating =====

    #[test]
    fn test_single_candidate_in_gate() {
        let current = vec![obj(1, 0.0, 0.0), obj(2, 10.0, 0.0)];
        let candidates = vec![obj(11, 0.5, 0.0), obj(12, 10.0, 0.8)];
        let assoc = FrameAssociator::new(1.0).associate(&current, &candidates);

        assert_eq!(assoc.matched_id(1), Some(11));
        assert_eq!(assoc.matched_id(2), Some(12));
        assert_eq!(assoc.num_matches(), 2);
    }

    #[test]
    fn test_gate_is_inclusive() {
        let assoc = FrameAssociator::new(1.0).associate(&[obj(1, 0.0, 0.0)], &[obj(2, 1.0, 0.0)]);
        assert_eq!(assoc.matched_id(1), Some(2));
    }

    #[test]
    fn test_missing_when_gate_empty() {
        let assoc = FrameAssociator::new(1.0).associate(&[obj(1, 0.0, 0.0)], &[obj(2, 5.0, 0.0)]);
        assert!(assoc.is_missing(1));
        assert_eq!(assoc.missing().collect::<Vec<_>>(), vec![1]);
        assert_eq!(assoc.matched_id(1), None);
    }

    #[test]
    fn test_ambiguous_when_several_candidates() {
        let candidates = vec![obj(21, 0.4, 0.0), obj(22, -0.4, 0.0), obj(23, 9.0, 0.0)];
        let assoc = FrameAssociator::new(1.0).associate(&[obj(1, 0.0, 0.0)], &candidates);

        assert!(assoc.is_ambiguous(1));
        assert_eq!(assoc.matched_id(1), None);
        let ambiguous: Vec<_> = assoc.ambiguous().collect();
        assert_eq!(ambiguous, vec![(1, &[21, 22][..])]);
    }

    #[test]
    fn test_empty_sets() {
        let none: Vec<DynamicObject> = Vec::new();
        let assoc = FrameAssociator::new(1.0).associate(&none, &[obj(1, 0.0, 0.0)]);
        assert!(assoc.is_empty());

        let assoc = FrameAssociator::new(1.0).associate(&[obj(1, 0.0, 0.0)], &none);
        assert!(assoc.is_missing(1));
    }

    // ===== Test One-to-One Constraint =====

    #[test]
    fn test_shared_sole_candidate_is_ambiguous() {
        // Both current objects see only candidate 30 inside the gate
        let current = vec![obj(1, -0.6, 0.0), obj(2, 0.6, 0.0), obj(3, 20.0, 0.0)];
        let candidates = vec![obj(30, 0.0, 0.0), obj(31, 20.0, 0.1)];
        let assoc = FrameAssociator::new(1.0).associate(&current, &candidates);

        assert!(assoc.is_ambiguous(1));
        assert!(assoc.is_ambiguous(2));
        assert_eq!(assoc.matched_id(3), Some(31));
    }

    #[test]
    fn test_matches_are_injective() {
        let current: Vec<_> = (0..20).map(|i| obj(i, (i % 5) as f64 * 0.7, (i / 5) as f64 * 0.7)).collect();
        let candidates: Vec<_> = (0..20)
            .map(|i| obj(100 + i, (i % 5) as f64 * 0.7 + 0.2, (i / 5) as f64 * 0.7))
            .collect();
        let assoc = FrameAssociator::new(0.5).associate(&current, &candidates);

        let matched: Vec<ObjectId> = assoc.matches().map(|(_, c, _)| c).collect();
        let unique: HashSet<_> = matched.iter().collect();
        assert_eq!(matched.len(), unique.len());
        assert_eq!(assoc.forward().len(), assoc.inverse().len());
    }

    // ===== Test Motion Compensation =====

    #[test]
    fn test_associate_compensated() {
        // Previous frame: static object 20 m ahead; ego drove 5 m forward
        let previous = vec![obj(7, 20.0, 0.0)];
        let current = vec![obj(7, 15.1, 0.0)];
        let motion = EgoMotion::new(-5.0, 0.0, 0.0);

        let raw = FrameAssociator::new(0.5).associate(&current, &previous);
        assert!(raw.is_missing(7));

        let compensated = FrameAssociator::new(0.5).associate_compensated(&current, &previous, &motion);
        assert_eq!(compensated.matched_id(7), Some(7));
    }

    // ===== Test Distance Matrix =====

    #[test]
    fn test_distance_matrix_shape_and_values() {
        let a = vec![obj(1, 0.0, 0.0), obj(2, 3.0, 4.0)];
        let b = vec![obj(3, 0.0, 0.0)];
        let m = distance_matrix(&a, &b);
        assert_eq!((m.nrows(), m.ncols()), (2, 1));
        assert_eq!(m[(1, 0)], 5.0);
        assert!(!has_nan(&m));
    }

    #[test]
    fn test_nan_detection() {
        let matrix = DMatrix::from_row_slice(2, 2, &[0.5, f64::NAN, 1.0, 0.8]);
        assert!(has_nan(&matrix));
    }

    #[test]
    fn test_nan_positions_never_match() {
        let assoc = FrameAssociator::new(1.0).associate(&[obj(1, f64::NAN, 0.0)], &[obj(2, 0.0, 0.0)]);
        assert!(assoc.is_missing(1));
    }

    // ===== Test Capacity Selection =====

    #[test]
    fn test_select_closest_to_origin() {
        let objects: Vec<_> = [5.0, 2.0, 6.0, 1.0, 4.0, 3.0]
            .iter()
            .enumerate()
            .map(|(i, &d)| obj(i as ObjectId, d, 0.0))
            .collect();
        let kept = select_closest_to_origin(&objects, 4);
        let distances: Vec<f64> = kept.iter().map(|&id| objects[id as usize].center_x).collect();
        assert_eq!(distances, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_select_closest_ties_by_id() {
        let objects = vec![obj(9, 1.0, 0.0), obj(4, 0.0, 1.0), obj(6, 3.0, 0.0)];
        assert_eq!(select_closest_to_origin(&objects, 2), vec![4, 9]);
        assert_eq!(select_closest_to_origin(&objects, 10).len(), 3);
    }
}
