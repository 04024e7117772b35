//! Distance-dependent accuracy bounds.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One step of an accuracy step function: objects up to `max_range` meters
/// from the ego origin must be within `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundStep {
    pub max_range: f64,
    pub threshold: f64,
}

/// Step function mapping object range to the allowed error.
///
/// Tighter thresholds apply at short range. Objects beyond the last step are
/// not evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyBounds {
    steps: Vec<BoundStep>,
}

impl AccuracyBounds {
    /// Create bounds from `(max_range, threshold)` pairs in ascending range order.
    pub fn new(steps: &[(f64, f64)]) -> Result<Self> {
        let bounds = Self {
            steps: steps
                .iter()
                .map(|&(max_range, threshold)| BoundStep { max_range, threshold })
                .collect(),
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Default positional bounds in meters.
    pub fn default_positional() -> Self {
        Self {
            steps: vec![
                BoundStep { max_range: 1.0, threshold: 0.15 },
                BoundStep { max_range: 5.0, threshold: 0.30 },
                BoundStep { max_range: 20.0, threshold: 0.60 },
            ],
        }
    }

    /// Default velocity bounds in m/s.
    pub fn default_velocity() -> Self {
        Self {
            steps: vec![
                BoundStep { max_range: 1.0, threshold: 0.3 },
                BoundStep { max_range: 5.0, threshold: 0.5 },
                BoundStep { max_range: 20.0, threshold: 1.0 },
            ],
        }
    }

    pub fn steps(&self) -> &[BoundStep] {
        &self.steps
    }

    /// Allowed error for an object at `range`, or `None` beyond the last step.
    pub fn threshold_at(&self, range: f64) -> Option<f64> {
        if !range.is_finite() {
            return None;
        }
        self.steps
            .iter()
            .find(|s| range <= s.max_range)
            .map(|s| s.threshold)
    }

    /// Whether `error` is acceptable at `range`; `None` if not evaluated.
    pub fn is_within(&self, range: f64, error: f64) -> Option<bool> {
        self.threshold_at(range).map(|t| error <= t)
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::InvalidConfig("accuracy bounds need at least one step".to_string()));
        }
        for pair in self.steps.windows(2) {
            if pair[1].max_range <= pair[0].max_range {
                return Err(Error::InvalidConfig(format!(
                    "accuracy bound ranges must increase: {} after {}",
                    pair[1].max_range, pair[0].max_range
                )));
            }
        }
        if let Some(step) = self.steps.iter().find(|s| !(s.threshold > 0.0) || !(s.max_range > 0.0)) {
            return Err(Error::InvalidConfig(format!(
                "accuracy bound step ({}, {}) must be positive",
                step.max_range, step.threshold
            )));
        }
        Ok(())
    }
}

/// Distance bands used for velocity-accuracy binning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBand {
    /// Up to 1 m.
    Near,
    /// Above 1 m, up to 5 m.
    Mid,
    /// Above 5 m, up to 20 m.
    Far,
}

impl DistanceBand {
    pub const ALL: [DistanceBand; 3] = [DistanceBand::Near, DistanceBand::Mid, DistanceBand::Far];

    /// Band for an object at `range` meters, `None` beyond 20 m.
    pub fn for_range(range: f64) -> Option<Self> {
        if !range.is_finite() || range < 0.0 {
            None
        } else if range <= 1.0 {
            Some(DistanceBand::Near)
        } else if range <= 5.0 {
            Some(DistanceBand::Mid)
        } else if range <= 20.0 {
            Some(DistanceBand::Far)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_step_function() {
        let bounds = AccuracyBounds::default_positional();
        assert_eq!(bounds.threshold_at(0.5), Some(0.15));
        assert_eq!(bounds.threshold_at(1.0), Some(0.15));
        assert_eq!(bounds.threshold_at(3.0), Some(0.30));
        assert_eq!(bounds.threshold_at(19.9), Some(0.60));
        assert_eq!(bounds.threshold_at(25.0), None);
        assert_eq!(bounds.threshold_at(f64::NAN), None);
    }

    #[test]
    fn test_is_within() {
        let bounds = AccuracyBounds::new(&[(10.0, 0.5)]).unwrap();
        assert_eq!(bounds.is_within(2.0, 0.4), Some(true));
        assert_eq!(bounds.is_within(2.0, 0.6), Some(false));
        assert_eq!(bounds.is_within(12.0, 0.0), None);
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(AccuracyBounds::new(&[]).is_err());
        assert!(AccuracyBounds::new(&[(5.0, 0.3), (1.0, 0.1)]).is_err());
        assert!(AccuracyBounds::new(&[(5.0, 0.0)]).is_err());
        assert!(AccuracyBounds::default_velocity().validate().is_ok());
    }

    #[test]
    fn test_distance_bands() {
        assert_eq!(DistanceBand::for_range(0.0), Some(DistanceBand::Near));
        assert_eq!(DistanceBand::for_range(1.0), Some(DistanceBand::Near));
        assert_eq!(DistanceBand::for_range(1.01), Some(DistanceBand::Mid));
        assert_eq!(DistanceBand::for_range(5.0), Some(DistanceBand::Mid));
        assert_eq!(DistanceBand::for_range(20.0), Some(DistanceBand::Far));
        assert_eq!(DistanceBand::for_range(20.5), None);
    }
}
