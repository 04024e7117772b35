//! Motion compensation of dynamic objects.

use super::transformations::CoordinateTransformation;
use crate::dynamic_object::DynamicObject;

/// Re-expresses objects from a past ego frame in the current one.
///
/// Stateless; applied before any cross-frame geometric comparison so that
/// objects that are static in the world also compare as static although the
/// ego vehicle moved.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionCompensator;

impl MotionCompensator {
    /// Transform the center and, if present, every shape vertex.
    ///
    /// Velocity is left as reported.
    pub fn transform<T>(object: &DynamicObject, motion: &T) -> DynamicObject
    where
        T: CoordinateTransformation + ?Sized,
    {
        let center = motion.transform_point(&object.center());
        let shape = object
            .shape
            .map(|corners| corners.map(|corner| motion.transform_point(&corner)));

        DynamicObject {
            center_x: center.x,
            center_y: center.y,
            shape,
            ..object.clone()
        }
    }

    /// Transform a whole object set.
    pub fn transform_all<T>(objects: &[DynamicObject], motion: &T) -> Vec<DynamicObject>
    where
        T: CoordinateTransformation + ?Sized,
    {
        objects.iter().map(|o| Self::transform(o, motion)).collect()
    }
}
