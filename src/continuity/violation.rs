//! Identity-continuity rules and the findings they produce.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dynamic_object::{ObjectId, Timestamp};

/// Continuity rules checked on every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleName {
    /// A predicted object gained confidence shortly after losing its id.
    PrematureReuse,
    /// Time without a raw detection outside the allowed window.
    PredictionDuration,
    /// Capacity-limited output dropped a closer object than one it kept.
    CapacityRetention,
    /// A measured object lost confidence despite an equally confident detection.
    MeasuredConfidenceDrop,
    /// An object reappeared under a different id.
    IdSwitch,
}

impl RuleName {
    pub const ALL: [RuleName; 5] = [
        RuleName::PrematureReuse,
        RuleName::PredictionDuration,
        RuleName::CapacityRetention,
        RuleName::MeasuredConfidenceDrop,
        RuleName::IdSwitch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleName::PrematureReuse => "premature_reuse",
            RuleName::PredictionDuration => "prediction_duration",
            RuleName::CapacityRetention => "capacity_retention",
            RuleName::MeasuredConfidenceDrop => "measured_confidence_drop",
            RuleName::IdSwitch => "id_switch",
        }
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A breached continuity bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub timestamp: Timestamp,
    pub object_id: ObjectId,
    pub rule: RuleName,
    pub observed_value: f64,
    pub expected_bound: f64,
}

impl Violation {
    pub fn new(
        timestamp: Timestamp,
        object_id: ObjectId,
        rule: RuleName,
        observed_value: f64,
        expected_bound: f64,
    ) -> Self {
        Self {
            timestamp,
            object_id,
            rule,
            observed_value,
            expected_bound,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] object {} at {}: observed {} vs bound {}",
            self.rule, self.object_id, self.timestamp, self.observed_value, self.expected_bound
        )
    }
}
