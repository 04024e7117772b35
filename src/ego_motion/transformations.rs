//! Coordinate transformation implementations.

use nalgebra::{Isometry2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use super::buffer::EgoPose;

/// Trait for re-expressing positions from one coordinate frame in another.
///
/// Every object coordinate is interpreted in some reference:
/// - Ego: relative to the ego vehicle at a given timestamp, x forward, y left
/// - World: a fixed frame, as used by simulation ground truth and odometry
///
/// An implementation maps points from its source frame into its target frame.
pub trait CoordinateTransformation: Send + Sync + std::fmt::Debug {
    /// Transform a position from the source frame into the target frame.
    fn transform_point(&self, point: &Point2<f64>) -> Point2<f64>;

    /// Transform a free vector (velocity, heading); rotation only.
    fn transform_vector(&self, vector: &Vector2<f64>) -> Vector2<f64>;
}

/// No-op transformation that returns points unchanged.
///
/// Used when positions are already expressed in the target frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilCoordinateTransformation;

impl CoordinateTransformation for NilCoordinateTransformation {
    fn transform_point(&self, point: &Point2<f64>) -> Point2<f64> {
        *point
    }

    fn transform_vector(&self, vector: &Vector2<f64>) -> Vector2<f64> {
        *vector
    }
}

/// Rigid 2D ego motion between two timestamps.
///
/// Maps a point expressed in the `t_from` ego frame into the `t_to` ego frame:
/// rotate by `dyaw`, then translate by `(dx, dy)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EgoMotion {
    pub dx: f64,
    pub dy: f64,
    pub dyaw: f64,
}

impl EgoMotion {
    pub fn new(dx: f64, dy: f64, dyaw: f64) -> Self {
        Self { dx, dy, dyaw }
    }

    /// The neutral motion (ego did not move).
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Motion from pose `from` to pose `to`, both in world coordinates.
    pub fn between(to: &EgoPose, from: &EgoPose) -> Self {
        let relative = to.isometry().inverse() * from.isometry();
        Self::from_isometry(&relative)
    }

    pub fn from_isometry(iso: &Isometry2<f64>) -> Self {
        Self::new(iso.translation.x, iso.translation.y, iso.rotation.angle())
    }

    pub fn isometry(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.dx, self.dy), self.dyaw)
    }

    /// The motion mapping the `t_to` frame back into the `t_from` frame.
    pub fn inverse(&self) -> Self {
        Self::from_isometry(&self.isometry().inverse())
    }

    pub fn is_identity(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0 && self.dyaw == 0.0
    }
}

impl Default for EgoMotion {
    fn default() -> Self {
        Self::identity()
    }
}

impl CoordinateTransformation for EgoMotion {
    fn transform_point(&self, point: &Point2<f64>) -> Point2<f64> {
        self.isometry().transform_point(point)
    }

    fn transform_vector(&self, vector: &Vector2<f64>) -> Vector2<f64> {
        self.isometry().transform_vector(vector)
    }
}

/// Transformation from world coordinates into the ego frame at a given pose.
#[derive(Debug, Clone, Copy)]
pub struct WorldToEgoTransformation {
    world_to_ego: Isometry2<f64>,
}

impl WorldToEgoTransformation {
    pub fn new(pose: &EgoPose) -> Self {
        Self {
            world_to_ego: pose.isometry().inverse(),
        }
    }
}

impl CoordinateTransformation for WorldToEgoTransformation {
    fn transform_point(&self, point: &Point2<f64>) -> Point2<f64> {
        self.world_to_ego.transform_point(point)
    }

    fn transform_vector(&self, vector: &Vector2<f64>) -> Vector2<f64> {
        self.world_to_ego.transform_vector(vector)
    }
}
