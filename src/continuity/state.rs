//! Per-object continuity state carried between cycles.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::dynamic_object::{DynamicObject, ObjectId, ObjectState, Timestamp};

/// What the checker remembers about one id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContinuityEntry {
    /// Timestamp of the last non-deleted observation.
    pub last_seen: Timestamp,
    pub last_existence_prob: f64,
    pub last_state: ObjectState,
    /// Set once the id has been reported DELETED.
    pub deleted_at: Option<Timestamp>,
}

/// Continuity state owned by the checker and threaded through the replay.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContinuityState {
    entries: BTreeMap<ObjectId, ContinuityEntry>,
    prediction_start: BTreeMap<ObjectId, Timestamp>,
}

impl ContinuityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, object_id: ObjectId) -> Option<&ContinuityEntry> {
        self.entries.get(&object_id)
    }

    pub fn contains(&self, object_id: ObjectId) -> bool {
        self.entries.contains_key(&object_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn prediction_start(&self, object_id: ObjectId) -> Option<Timestamp> {
        self.prediction_start.get(&object_id).copied()
    }

    /// Drop ids whose cool-down since deletion has fully elapsed at `now`.
    pub fn purge_expired(&mut self, now: Timestamp, reuse_time_us: Timestamp) -> Vec<ObjectId> {
        let expired: Vec<ObjectId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.deleted_at.is_some_and(|d| d.saturating_add(reuse_time_us) <= now))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.entries.remove(id);
            self.prediction_start.remove(id);
        }
        expired
    }

    /// Forget what the frame at `now` no longer carries.
    ///
    /// Ids absent from the frame lose their prediction interval at once. Their
    /// entry is dropped when `reuse_time_us` has passed since they were last
    /// seen; deleted ids keep their cool-down until [`purge_expired`](Self::purge_expired).
    pub(crate) fn forget_absent(&mut self, present: &BTreeSet<ObjectId>, now: Timestamp, reuse_time_us: Timestamp) {
        self.prediction_start.retain(|id, _| present.contains(id));
        self.entries.retain(|id, e| {
            present.contains(id) || e.deleted_at.is_some() || e.last_seen.saturating_add(reuse_time_us) > now
        });
    }

    /// Record a non-deleted observation.
    pub(crate) fn observe(&mut self, object: &DynamicObject, timestamp: Timestamp) {
        self.entries.insert(
            object.object_id,
            ContinuityEntry {
                last_seen: timestamp,
                last_existence_prob: object.existence_prob,
                last_state: object.state,
                deleted_at: None,
            },
        );
    }

    /// Start the cool-down of an id. The last observation is kept.
    pub(crate) fn mark_deleted(&mut self, object_id: ObjectId, timestamp: Timestamp) {
        self.prediction_start.remove(&object_id);
        match self.entries.get_mut(&object_id) {
            Some(entry) => {
                entry.deleted_at.get_or_insert(timestamp);
            }
            None => {
                // Deleted without a prior observation: only the cool-down matters.
                self.entries.insert(
                    object_id,
                    ContinuityEntry {
                        last_seen: timestamp,
                        last_existence_prob: 0.0,
                        last_state: ObjectState::Deleted,
                        deleted_at: Some(timestamp),
                    },
                );
            }
        }
    }

    pub(crate) fn start_prediction(&mut self, object_id: ObjectId, timestamp: Timestamp) {
        self.prediction_start.entry(object_id).or_insert(timestamp);
    }

    pub(crate) fn end_prediction(&mut self, object_id: ObjectId) -> Option<Timestamp> {
        self.prediction_start.remove(&object_id)
    }
}
