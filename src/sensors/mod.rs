//! Raw-detection sensor sources.
//!
//! This module provides:
//! - `SensorCapability` trait implemented once per source variant
//! - `FrontCamera`, `RearCamera`, `LeftCamera`, `RightCamera` - surround-view units
//! - `SensorSource` - enum dispatch over all variants, resolved by name
//! - `SensorSuite` - combined field of view of the configured sources
//! - `RawDetectionStream` - time-ordered raw detections of one source

mod cameras;
mod dispatch;
mod stream;
mod traits;

pub use cameras::{FrontCamera, LeftCamera, RearCamera, RightCamera};
pub use dispatch::{sensor_by_name, SensorSource, SensorSuite};
pub use stream::RawDetectionStream;
pub use traits::{FieldOfView, SensorCapability};
