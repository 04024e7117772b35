//! # TPF Validation - Tracked-Object Association & Identity-Continuity Checks
//!
//! Offline validation engine for the fused tracked-object ("TPF") output of an
//! automotive perception stack. A recorded log is replayed as an ordered
//! sequence of [`TimeFrame`]s and checked against identity-continuity rules and
//! ground-truth accuracy metrics.
//!
//! ## Features
//!
//! - Ego-motion buffer with interpolated relative transforms
//! - Motion compensation of object centers and shapes
//! - Gated nearest-candidate association with an ambiguity skip rule
//! - Ground-truth association with forward and inverse views
//! - Identity-continuity rules (ID reuse, prediction duration, capacity retention)
//! - Precision/recall and distance-binned accuracy metrics
//!
//! ## Example
//!
//! ```rust,ignore
//! use tpf_validation_rs::{EgoMotionBuffer, ValidationConfig, ValidationEngine};
//!
//! let config = ValidationConfig::default();
//! let ego = EgoMotionBuffer::from_samples(&[(0, 0.0, 0.0, 0.0), (1_000_000, 10.0, 0.0, 0.0)])?;
//! let engine = ValidationEngine::new(config, ego)?;
//! let report = engine.run(&frames)?;
//! assert!(report.passed());
//! ```

// Public modules
pub mod config;
pub mod continuity;
pub mod dynamic_object;
pub mod ego_motion;
pub mod engine;
pub mod ground_truth;
pub mod matching;
pub mod metrics;
pub mod report;
pub mod sensors;
pub mod utils;

// Re-exports for convenience
pub use config::ValidationConfig;
pub use continuity::{ContinuityState, IdentityContinuityChecker, RuleName, Violation};
pub use dynamic_object::{DynamicObject, ObjectId, ObjectState, Positioned, TimeFrame, Timestamp};
pub use ego_motion::{CoordinateTransformation, EgoMotion, EgoMotionBuffer, EgoPose, MotionCompensator};
pub use engine::ValidationEngine;
pub use ground_truth::{GroundTruthAssociator, GroundTruthObject, GroundTruthTable};
pub use matching::{Association, AssociationOutcome, FrameAssociator};
pub use metrics::{CycleMetrics, MetricsAggregator};
pub use report::{Diagnostic, ValidationReport};
pub use sensors::{sensor_by_name, SensorCapability, SensorSource};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    use crate::dynamic_object::{ObjectId, Timestamp};

    /// Errors that can occur while preparing or running a validation replay
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Duplicate object id {object_id} in timeframe {timestamp}")]
        DuplicateObjectId { timestamp: Timestamp, object_id: ObjectId },

        #[error("Ego motion buffer is empty")]
        EmptyEgoBuffer,

        #[error("Timestamp {requested} outside ego motion buffer range [{start}, {end}]")]
        MotionOutOfRange {
            requested: Timestamp,
            start: Timestamp,
            end: Timestamp,
        },

        #[error("Timeframe timestamps decrease: {current} follows {previous}")]
        NonMonotonicTimestamps { previous: Timestamp, current: Timestamp },

        #[error("Unknown sensor source: {0}")]
        UnknownSensor(String),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),

        #[error("JSON error: {0}")]
        JsonError(#[from] serde_json::Error),
    }

    /// Result type for validation operations
    pub type Result<T> = std::result::Result<T, Error>;
}
