//! Surround-view camera sources.
//!
//! Each camera is a fisheye unit with a wide horizontal opening; mounting
//! positions are relative to the rear-axle center.

use std::f64::consts::{FRAC_PI_2, PI};

use super::traits::{FieldOfView, SensorCapability};

/// Half opening angle shared by the fisheye units (95 deg).
const FISHEYE_HALF_ANGLE: f64 = 95.0 * PI / 180.0;

/// Range up to which the cameras report dynamic objects.
const CAMERA_MAX_RANGE: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrontCamera;

impl SensorCapability for FrontCamera {
    fn name(&self) -> &'static str {
        "front"
    }

    fn field_of_view(&self) -> FieldOfView {
        FieldOfView {
            mount_x: 3.7,
            mount_y: 0.0,
            boresight_yaw: 0.0,
            half_angle: FISHEYE_HALF_ANGLE,
            max_range: CAMERA_MAX_RANGE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RearCamera;

impl SensorCapability for RearCamera {
    fn name(&self) -> &'static str {
        "rear"
    }

    fn field_of_view(&self) -> FieldOfView {
        FieldOfView {
            mount_x: -1.0,
            mount_y: 0.0,
            boresight_yaw: PI,
            half_angle: FISHEYE_HALF_ANGLE,
            max_range: CAMERA_MAX_RANGE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeftCamera;

impl SensorCapability for LeftCamera {
    fn name(&self) -> &'static str {
        "left"
    }

    fn field_of_view(&self) -> FieldOfView {
        FieldOfView {
            mount_x: 2.0,
            mount_y: 1.0,
            boresight_yaw: FRAC_PI_2,
            half_angle: FISHEYE_HALF_ANGLE,
            max_range: CAMERA_MAX_RANGE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RightCamera;

impl SensorCapability for RightCamera {
    fn name(&self) -> &'static str {
        "right"
    }

    fn field_of_view(&self) -> FieldOfView {
        FieldOfView {
            mount_x: 2.0,
            mount_y: -1.0,
            boresight_yaw: -FRAC_PI_2,
            half_angle: FISHEYE_HALF_ANGLE,
            max_range: CAMERA_MAX_RANGE,
        }
    }
}
