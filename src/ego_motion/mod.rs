//! Ego motion compensation module.
//!
//! This module provides the coordinate transformations used to compare
//! objects recorded at different timestamps:
//!
//! - `EgoMotionBuffer` - interpolated ego poses and relative motion queries
//! - `EgoMotion` - rigid transform between two ego frames
//! - `WorldToEgoTransformation` - world coordinates into an ego frame
//! - `MotionCompensator` - applies a transformation to dynamic objects

mod buffer;
mod compensator;
mod transformations;

pub use buffer::{EgoMotionBuffer, EgoPose};
pub use compensator::MotionCompensator;
pub use transformations::{
    CoordinateTransformation, EgoMotion, NilCoordinateTransformation, WorldToEgoTransformation,
};
