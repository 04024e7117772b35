//! Time-ordered ego pose buffer.

use nalgebra::{Isometry2, Vector2};
use serde::{Deserialize, Serialize};

use super::transformations::EgoMotion;
use crate::dynamic_object::Timestamp;
use crate::utils::{lerp, lerp_angle};
use crate::{Error, Result};

/// One odometry sample: ego pose in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EgoPose {
    pub timestamp: Timestamp,
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl EgoPose {
    pub fn new(timestamp: Timestamp, x: f64, y: f64, yaw: f64) -> Self {
        Self { timestamp, x, y, yaw }
    }

    /// Ego-to-world isometry.
    pub fn isometry(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.x, self.y), self.yaw)
    }

    /// Pose at `timestamp` on the straight line between two samples.
    fn interpolate(&self, other: &EgoPose, timestamp: Timestamp) -> EgoPose {
        let span = other.timestamp.saturating_sub(self.timestamp);
        if span == 0 {
            return EgoPose { timestamp, ..*self };
        }
        let t = (timestamp - self.timestamp) as f64 / span as f64;
        EgoPose {
            timestamp,
            x: lerp(self.x, other.x, t),
            y: lerp(self.y, other.y, t),
            yaw: lerp_angle(self.yaw, other.yaw, t),
        }
    }
}

/// Buffer of ego poses ordered by timestamp.
///
/// Computes the rigid transform between any two covered timestamps, linearly
/// interpolating between the bracketing samples.
#[derive(Debug, Clone, Default)]
pub struct EgoMotionBuffer {
    poses: Vec<EgoPose>,
}

impl EgoMotionBuffer {
    /// Create a buffer from poses in any order.
    ///
    /// Samples are sorted by timestamp; for duplicate timestamps the first
    /// sample wins.
    pub fn new(mut poses: Vec<EgoPose>) -> Result<Self> {
        if poses.is_empty() {
            return Err(Error::EmptyEgoBuffer);
        }
        poses.sort_by_key(|p| p.timestamp);
        poses.dedup_by_key(|p| p.timestamp);
        Ok(Self { poses })
    }

    /// Create a buffer from `(timestamp, x, y, yaw)` tuples.
    pub fn from_samples(samples: &[(Timestamp, f64, f64, f64)]) -> Result<Self> {
        Self::new(
            samples
                .iter()
                .map(|&(timestamp, x, y, yaw)| EgoPose::new(timestamp, x, y, yaw))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn poses(&self) -> &[EgoPose] {
        &self.poses
    }

    /// Covered time range `(first, last)`.
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        Some((self.poses.first()?.timestamp, self.poses.last()?.timestamp))
    }

    pub fn covers(&self, timestamp: Timestamp) -> bool {
        self.time_range()
            .is_some_and(|(start, end)| start <= timestamp && timestamp <= end)
    }

    /// Ego pose at `timestamp`, interpolated between the bracketing samples.
    pub fn pose_at(&self, timestamp: Timestamp) -> Result<EgoPose> {
        let (start, end) = self.time_range().ok_or(Error::EmptyEgoBuffer)?;
        if timestamp < start || timestamp > end {
            return Err(Error::MotionOutOfRange {
                requested: timestamp,
                start,
                end,
            });
        }

        // First sample with timestamp >= requested
        let idx = self.poses.partition_point(|p| p.timestamp < timestamp);
        let upper = &self.poses[idx];
        if upper.timestamp == timestamp || idx == 0 {
            return Ok(*upper);
        }
        let lower = &self.poses[idx - 1];
        Ok(lower.interpolate(upper, timestamp))
    }

    /// Rigid transform mapping points in the `t_from` ego frame into the `t_to`
    /// ego frame.
    ///
    /// Fails if either timestamp is outside the buffer's covered range.
    pub fn calc_relative_motion(&self, t_to: Timestamp, t_from: Timestamp) -> Result<EgoMotion> {
        if t_to == t_from {
            // Still validate coverage so callers cannot rely on an uncovered timestamp
            self.pose_at(t_to)?;
            return Ok(EgoMotion::identity());
        }
        let to = self.pose_at(t_to)?;
        let from = self.pose_at(t_from)?;
        Ok(EgoMotion::between(&to, &from))
    }
}
