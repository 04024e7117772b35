//! Validation configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::continuity::RuleName;
use crate::dynamic_object::Timestamp;
use crate::ground_truth::DEFAULT_MAX_SAMPLE_GAP_US;
use crate::metrics::AccuracyBounds;
use crate::sensors::SensorSuite;
use crate::{Error, Result};

/// Constants and switches of a validation replay.
///
/// Missing fields in a JSON file fall back to [`ValidationConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Cool-down after deletion before an id may be reassigned (s).
    pub reuse_time_s: f64,

    /// Shortest allowed prediction interval (s).
    pub min_tracking_time_s: f64,

    /// Longest allowed prediction interval (s).
    pub max_tracking_time_s: f64,

    /// Capacity of the fused output.
    pub max_num_objects: usize,

    /// Gate for current-vs-previous frame association (m).
    pub association_gate_m: f64,

    /// Gate for tracked-vs-ground-truth association (m).
    pub gt_gate_distance_m: f64,

    /// Gate for raw-detection association (m).
    pub raw_gate_distance_m: f64,

    /// Max distance to the nearest ground-truth sample outside a track's span.
    pub gt_time_tolerance_us: Timestamp,

    /// Ground-truth samples further apart than this are not interpolated.
    pub gt_max_sample_gap_us: Timestamp,

    /// Max distance to the nearest raw-detection frame.
    pub raw_time_tolerance_us: Timestamp,

    pub positional_bounds: AccuracyBounds,
    pub velocity_bounds: AccuracyBounds,

    /// Probability changes smaller than this are ignored.
    pub probability_epsilon: f64,

    pub disabled_rules: Vec<RuleName>,

    /// Sources whose combined field of view counts as observed by the ego.
    pub sensors: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            reuse_time_s: 0.5,
            min_tracking_time_s: 0.2,
            max_tracking_time_s: 2.0,
            max_num_objects: 40,
            association_gate_m: 2.0,
            gt_gate_distance_m: 1.0,
            raw_gate_distance_m: 1.0,
            gt_time_tolerance_us: 50_000,
            gt_max_sample_gap_us: DEFAULT_MAX_SAMPLE_GAP_US,
            raw_time_tolerance_us: 50_000,
            positional_bounds: AccuracyBounds::default_positional(),
            velocity_bounds: AccuracyBounds::default_velocity(),
            probability_epsilon: 1e-6,
            disabled_rules: Vec::new(),
            sensors: ["front", "rear", "left", "right"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ValidationConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("reuse_time_s", self.reuse_time_s),
            ("min_tracking_time_s", self.min_tracking_time_s),
            ("max_tracking_time_s", self.max_tracking_time_s),
            ("probability_epsilon", self.probability_epsilon),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!("{name} must be a non-negative number, got {value}")));
            }
        }

        for (name, value) in [
            ("association_gate_m", self.association_gate_m),
            ("gt_gate_distance_m", self.gt_gate_distance_m),
            ("raw_gate_distance_m", self.raw_gate_distance_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!("{name} must be positive, got {value}")));
            }
        }

        if self.min_tracking_time_s > self.max_tracking_time_s {
            return Err(Error::InvalidConfig(format!(
                "min_tracking_time_s ({}) exceeds max_tracking_time_s ({})",
                self.min_tracking_time_s, self.max_tracking_time_s
            )));
        }

        if self.gt_max_sample_gap_us == 0 {
            return Err(Error::InvalidConfig("gt_max_sample_gap_us must be positive".to_string()));
        }

        if self.max_num_objects == 0 {
            return Err(Error::InvalidConfig("max_num_objects must be at least 1".to_string()));
        }

        self.positional_bounds.validate()?;
        self.velocity_bounds.validate()?;
        self.sensor_suite()?;
        Ok(())
    }

    /// Resolve the configured sensor names.
    pub fn sensor_suite(&self) -> Result<SensorSuite> {
        SensorSuite::from_names(&self.sensors)
    }

    pub fn rule_enabled(&self, rule: RuleName) -> bool {
        !self.disabled_rules.contains(&rule)
    }

    pub fn with_disabled_rule(mut self, rule: RuleName) -> Self {
        if self.rule_enabled(rule) {
            self.disabled_rules.push(rule);
        }
        self
    }
}
