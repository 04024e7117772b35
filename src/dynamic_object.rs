//! Tracked-object value model: objects and the timeframes that carry them.

use std::collections::HashSet;

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::utils::polygon_distance_to_origin;
use crate::{Error, Result};

/// Object identifier as emitted by the fusion stack.
pub type ObjectId = u32;

/// Timestamp in microseconds.
pub type Timestamp = u64;

/// Convert a microsecond span to seconds.
pub fn micros_to_secs(span: Timestamp) -> f64 {
    span as f64 / 1e6
}

/// Convert seconds to whole microseconds, saturating at zero.
pub fn secs_to_micros(secs: f64) -> Timestamp {
    (secs * 1e6).round().max(0.0) as Timestamp
}

/// Lifecycle state reported for a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectState {
    /// Confirmed by at least one sensor in this cycle.
    Measured,
    /// Extrapolated without a supporting measurement.
    Predicted,
    /// Removed from the output; the id enters its cool-down window.
    Deleted,
}

/// Anything that has an id and a center position in some ego frame.
///
/// Used by [`crate::FrameAssociator`] so tracked objects, raw detections and
/// ground-truth objects go through the same gating logic.
pub trait Positioned {
    /// Identifier of the object within its own set.
    fn id(&self) -> ObjectId;

    /// Center position.
    fn position(&self) -> Point2<f64>;

    /// Minimum distance from the object to the ego origin.
    fn distance_to_origin(&self) -> f64 {
        self.position().coords.norm()
    }
}

/// A tracked (or raw-detected) dynamic object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    pub object_id: ObjectId,
    pub center_x: f64,
    pub center_y: f64,
    #[serde(default)]
    pub velocity_x: f64,
    #[serde(default)]
    pub velocity_y: f64,
    /// Four ordered corners with the reference point at the centroid.
    #[serde(default)]
    pub shape: Option<[Point2<f64>; 4]>,
    pub existence_prob: f64,
    pub state: ObjectState,
    #[serde(default)]
    pub timestamp: Timestamp,
}

impl DynamicObject {
    /// Create a point object without a shape and at rest.
    pub fn new(
        object_id: ObjectId,
        center_x: f64,
        center_y: f64,
        existence_prob: f64,
        state: ObjectState,
    ) -> Self {
        Self {
            object_id,
            center_x,
            center_y,
            velocity_x: 0.0,
            velocity_y: 0.0,
            shape: None,
            existence_prob,
            state,
            timestamp: 0,
        }
    }

    /// Set the velocity.
    pub fn with_velocity(mut self, velocity_x: f64, velocity_y: f64) -> Self {
        self.velocity_x = velocity_x;
        self.velocity_y = velocity_y;
        self
    }

    /// Attach an axis-aligned rectangular shape of the given size around the center.
    pub fn with_box(mut self, length: f64, width: f64) -> Self {
        let (hl, hw) = (length / 2.0, width / 2.0);
        let (cx, cy) = (self.center_x, self.center_y);
        self.shape = Some([
            Point2::new(cx + hl, cy + hw),
            Point2::new(cx - hl, cy + hw),
            Point2::new(cx - hl, cy - hw),
            Point2::new(cx + hl, cy - hw),
        ]);
        self
    }

    /// Center as a point.
    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.center_x, self.center_y)
    }

    /// Velocity as a vector.
    pub fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.velocity_x, self.velocity_y)
    }

    pub fn is_deleted(&self) -> bool {
        self.state == ObjectState::Deleted
    }
}

impl Positioned for DynamicObject {
    fn id(&self) -> ObjectId {
        self.object_id
    }

    fn position(&self) -> Point2<f64> {
        self.center()
    }

    /// Polygon distance when a shape is known, center distance otherwise.
    fn distance_to_origin(&self) -> f64 {
        match &self.shape {
            Some(shape) => polygon_distance_to_origin(shape),
            None => self.center().coords.norm(),
        }
    }
}

/// All objects reported in one fusion cycle.
///
/// Created once at decode time and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeFrame {
    timestamp: Timestamp,
    dynamic_objects: Vec<DynamicObject>,
    num_objects: usize,
}

impl TimeFrame {
    /// Create a timeframe, stamping every object with the frame timestamp.
    ///
    /// Fails if two objects share an id.
    pub fn new(timestamp: Timestamp, mut dynamic_objects: Vec<DynamicObject>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(dynamic_objects.len());
        for obj in &mut dynamic_objects {
            if !seen.insert(obj.object_id) {
                return Err(Error::DuplicateObjectId {
                    timestamp,
                    object_id: obj.object_id,
                });
            }
            obj.timestamp = timestamp;
        }

        let num_objects = dynamic_objects.len();
        Ok(Self {
            timestamp,
            dynamic_objects,
            num_objects,
        })
    }

    /// Create a timeframe from a fixed-capacity slot array where only the first
    /// `num_objects` slots are valid.
    pub fn from_slots(
        timestamp: Timestamp,
        mut slots: Vec<DynamicObject>,
        num_objects: usize,
    ) -> Result<Self> {
        slots.truncate(num_objects);
        Self::new(timestamp, slots)
    }

    /// An empty frame (no objects reported this cycle).
    pub fn empty(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            dynamic_objects: Vec::new(),
            num_objects: 0,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn dynamic_objects(&self) -> &[DynamicObject] {
        &self.dynamic_objects
    }

    pub fn num_objects(&self) -> usize {
        self.num_objects
    }

    pub fn is_empty(&self) -> bool {
        self.dynamic_objects.is_empty()
    }

    /// Find an object by id.
    pub fn object(&self, object_id: ObjectId) -> Option<&DynamicObject> {
        self.dynamic_objects.iter().find(|o| o.object_id == object_id)
    }

    pub fn contains(&self, object_id: ObjectId) -> bool {
        self.object(object_id).is_some()
    }

    /// Objects that are not in the DELETED state.
    pub fn active_objects(&self) -> impl Iterator<Item = &DynamicObject> {
        self.dynamic_objects.iter().filter(|o| !o.is_deleted())
    }

    /// Ids of all objects, in frame order.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.dynamic_objects.iter().map(|o| o.object_id).collect()
    }
}

/// Wire form used when deserializing frames; routed through [`TimeFrame::new`]
/// so id uniqueness is always checked.
#[derive(Deserialize)]
struct TimeFrameRecord {
    timestamp: Timestamp,
    dynamic_objects: Vec<DynamicObject>,
    num_objects: Option<usize>,
}

impl<'de> Deserialize<'de> for TimeFrame {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let record = TimeFrameRecord::deserialize(deserializer)?;
        let num_objects = record.num_objects.unwrap_or(record.dynamic_objects.len());
        TimeFrame::from_slots(record.timestamp, record.dynamic_objects, num_objects)
            .map_err(serde::de::Error::custom)
    }
}
