//! Sensor capability trait definition.

use nalgebra::Point2;
use serde::Serialize;

use crate::utils::wrap_angle;

/// Sector covered by a sensor, in ego coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldOfView {
    /// Mounting position on the ego vehicle.
    pub mount_x: f64,
    pub mount_y: f64,
    /// Boresight direction in radians (0 = ego forward, counter-clockwise positive).
    pub boresight_yaw: f64,
    /// Half of the horizontal opening angle in radians.
    pub half_angle: f64,
    /// Maximum detection range from the mounting position in meters.
    pub max_range: f64,
}

impl FieldOfView {
    /// Whether an ego-frame point lies inside the sector.
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        let dx = point.x - self.mount_x;
        let dy = point.y - self.mount_y;
        let range = dx.hypot(dy);
        if range > self.max_range {
            return false;
        }
        if range == 0.0 {
            return true;
        }
        wrap_angle(dy.atan2(dx) - self.boresight_yaw).abs() <= self.half_angle
    }
}

/// Capabilities of one raw-detection source feeding the fusion.
///
/// Implemented once per sensor variant; callers resolve the variant once via
/// [`crate::sensors::sensor_by_name`] and never branch on the sensor again.
pub trait SensorCapability: Send + Sync {
    /// Stable configuration name of the source.
    fn name(&self) -> &'static str;

    /// Area the source can observe.
    fn field_of_view(&self) -> FieldOfView;

    /// Whether the source can observe an ego-frame point.
    fn observes(&self, point: &Point2<f64>) -> bool {
        self.field_of_view().contains(point)
    }
}
