//! Enum-based sensor dispatch for static (non-virtual) capability lookups.
//!
//! `SensorSource` wraps every supported raw-detection source so per-sensor
//! behaviour is chosen once, when the source is resolved by name.

use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::cameras::{FrontCamera, LeftCamera, RearCamera, RightCamera};
use super::traits::{FieldOfView, SensorCapability};
use crate::{Error, Result};

/// Enum-based sensor source for static dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorSource {
    Front(FrontCamera),
    Rear(RearCamera),
    Left(LeftCamera),
    Right(RightCamera),
}

impl SensorSource {
    /// All supported sources, in a fixed order.
    pub fn all() -> [SensorSource; 4] {
        [
            SensorSource::Front(FrontCamera),
            SensorSource::Rear(RearCamera),
            SensorSource::Left(LeftCamera),
            SensorSource::Right(RightCamera),
        ]
    }

    #[inline(always)]
    fn capability(&self) -> &dyn SensorCapability {
        match self {
            SensorSource::Front(s) => s,
            SensorSource::Rear(s) => s,
            SensorSource::Left(s) => s,
            SensorSource::Right(s) => s,
        }
    }
}

impl SensorCapability for SensorSource {
    fn name(&self) -> &'static str {
        self.capability().name()
    }

    fn field_of_view(&self) -> FieldOfView {
        self.capability().field_of_view()
    }
}

impl fmt::Display for SensorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for SensorSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for SensorSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        sensor_by_name(&name).map_err(serde::de::Error::custom)
    }
}

/// Resolve a sensor source by its configuration name.
///
/// Supported names: "front", "rear", "left", "right".
pub fn sensor_by_name(name: &str) -> Result<SensorSource> {
    match name {
        "front" => Ok(SensorSource::Front(FrontCamera)),
        "rear" => Ok(SensorSource::Rear(RearCamera)),
        "left" => Ok(SensorSource::Left(LeftCamera)),
        "right" => Ok(SensorSource::Right(RightCamera)),
        _ => Err(Error::UnknownSensor(name.to_string())),
    }
}

/// The set of sources that together define what the ego vehicle can observe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorSuite {
    sources: Vec<SensorSource>,
}

impl SensorSuite {
    pub fn new(sources: Vec<SensorSource>) -> Self {
        Self { sources }
    }

    /// Resolve every name once; fails on the first unknown name.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let sources = names
            .iter()
            .map(|n| sensor_by_name(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(sources))
    }

    pub fn sources(&self) -> &[SensorSource] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Whether any source observes the point. An empty suite observes everything.
    pub fn in_field_of_view(&self, point: &Point2<f64>) -> bool {
        self.sources.is_empty() || self.sources.iter().any(|s| s.observes(point))
    }
}
