//! Replay driver tying the validators together.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::ValidationConfig;
use crate::continuity::{CycleInput, IdentityContinuityChecker};
use crate::dynamic_object::{TimeFrame, Timestamp};
use crate::ego_motion::EgoMotionBuffer;
use crate::ground_truth::{GroundTruthAssociator, GroundTruthTable};
use crate::metrics::{CycleInputs, MetricsAggregator};
use crate::report::{Diagnostic, FrameRecord, MissingInput, ValidationReport};
use crate::sensors::{RawDetectionStream, SensorSource};
use crate::utils::warn_once;
use crate::{Error, Result};

/// Batch validator over a recorded, ordered frame sequence.
///
/// Every replay starts from an empty continuity state, so one engine can
/// validate several sequences.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    config: ValidationConfig,
    ego: EgoMotionBuffer,
    ground_truth: Option<GroundTruthTable>,
    raw_streams: Vec<RawDetectionStream>,
}

impl ValidationEngine {
    pub fn new(config: ValidationConfig, ego: EgoMotionBuffer) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ego,
            ground_truth: None,
            raw_streams: Vec::new(),
        })
    }

    pub fn with_ground_truth(mut self, table: GroundTruthTable) -> Self {
        self.ground_truth = Some(table);
        self
    }

    /// Add the raw detections of one camera, replacing any earlier stream of
    /// the same source.
    pub fn with_raw_stream(mut self, stream: RawDetectionStream) -> Self {
        self.raw_streams.retain(|s| s.source() != stream.source());
        self.raw_streams.push(stream);
        self.raw_streams.sort_by_key(|s| s.source());
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn ego_motion(&self) -> &EgoMotionBuffer {
        &self.ego
    }

    /// Replay `frames` in order and collect all findings.
    ///
    /// Fails only if the frame timestamps decrease. Missing or ambiguous data
    /// is reported as diagnostics.
    pub fn run(&self, frames: &[TimeFrame]) -> Result<ValidationReport> {
        for pair in frames.windows(2) {
            if pair[1].timestamp() < pair[0].timestamp() {
                return Err(Error::NonMonotonicTimestamps {
                    previous: pair[0].timestamp(),
                    current: pair[1].timestamp(),
                });
            }
        }

        if self.raw_streams.is_empty() {
            warn_once("no raw detection streams configured; raw-detection checks are skipped");
        }

        let mut checker = IdentityContinuityChecker::new(&self.config)?;
        let mut aggregator = MetricsAggregator::from_config(&self.config);
        let gt_associator = self.ground_truth.as_ref().map(|table| {
            GroundTruthAssociator::new(
                table,
                &self.ego,
                self.config.gt_gate_distance_m,
                self.config.gt_time_tolerance_us,
            )
            .with_max_sample_gap(self.config.gt_max_sample_gap_us)
        });

        let mut records = Vec::with_capacity(frames.len());
        let mut violations = Vec::new();
        let mut diagnostics = Vec::new();
        let mut previous: Option<&TimeFrame> = None;
        let mut previous_raw: Vec<(SensorSource, &TimeFrame)> = Vec::new();

        for frame in frames {
            let timestamp = frame.timestamp();
            debug!(timestamp, num_objects = frame.num_objects(), "validating frame");

            if frame.active_objects().next().is_none() {
                diagnostics.push(Diagnostic::InputMissing {
                    timestamp,
                    input: MissingInput::FusedObjects,
                });
            }

            let (raw_frames, missing_sources) = self.raw_frames_at(timestamp);
            diagnostics.extend(missing_sources.iter().map(|source| Diagnostic::InputMissing {
                timestamp,
                input: MissingInput::RawDetections { source: *source },
            }));

            let motion = match previous {
                Some(prev) => match self.ego.calc_relative_motion(timestamp, prev.timestamp()) {
                    Ok(motion) => Some(motion),
                    Err(err) => {
                        warn!(timestamp, error = %err, "ego motion not available, skipping motion checks");
                        diagnostics.push(Diagnostic::DataNotAvailable {
                            timestamp,
                            reason: err.to_string(),
                        });
                        None
                    }
                },
                None => None,
            };

            let outcome = checker.step(&CycleInput {
                frame,
                previous,
                motion: motion.as_ref(),
                raw_frames: &raw_frames,
                missing_sources: &missing_sources,
                previous_raw_frames: &previous_raw,
            });
            diagnostics.extend(outcome.ambiguities.into_iter().map(|a| Diagnostic::AmbiguousAssociation {
                timestamp,
                object_id: a.object_id,
                rule: Some(a.rule),
                candidate_ids: a.candidate_ids,
            }));

            let mut record = FrameRecord {
                timestamp,
                num_objects: frame.num_objects(),
                num_violations: outcome.violations.len(),
                ..FrameRecord::default()
            };

            if let Some(associator) = &gt_associator {
                match associator.associate(frame) {
                    Ok(gt) if !gt.has_ground_truth() => {
                        diagnostics.push(Diagnostic::InputMissing {
                            timestamp,
                            input: MissingInput::GroundTruth,
                        });
                    }
                    Ok(gt) => {
                        diagnostics.extend(gt.association.ambiguous().map(|(object_id, candidates)| {
                            Diagnostic::AmbiguousAssociation {
                                timestamp,
                                object_id,
                                rule: None,
                                candidate_ids: candidates.to_vec(),
                            }
                        }));
                        let metrics = aggregator.calc(&CycleInputs {
                            frame,
                            ground_truth: &gt,
                            raw_frames: &raw_frames,
                        });
                        record.associated_objects = gt.forward();
                        record.metrics = Some(metrics);
                    }
                    Err(err) => {
                        warn!(timestamp, error = %err, "ground truth not available");
                        diagnostics.push(Diagnostic::DataNotAvailable {
                            timestamp,
                            reason: err.to_string(),
                        });
                    }
                }
            }

            if !outcome.violations.is_empty() {
                debug!(timestamp, count = outcome.violations.len(), "continuity violations");
            }
            violations.extend(outcome.violations);
            records.push(record);
            previous = Some(frame);
            previous_raw = raw_frames;
        }

        let report = ValidationReport::new(records, aggregator.summary(), violations, diagnostics);
        info!(
            frames = frames.len(),
            violations = report.violations().len(),
            diagnostics = report.diagnostics().len(),
            passed = report.passed(),
            "validation finished"
        );
        Ok(report)
    }

    /// Raw frames available at `timestamp`, plus the streams without one.
    fn raw_frames_at(&self, timestamp: Timestamp) -> (Vec<(SensorSource, &TimeFrame)>, Vec<SensorSource>) {
        let mut raw_frames = Vec::with_capacity(self.raw_streams.len());
        let mut missing = Vec::new();
        for stream in &self.raw_streams {
            match stream.frame_at(timestamp, self.config.raw_time_tolerance_us) {
                Some(raw) => raw_frames.push((stream.source(), raw)),
                None => missing.push(stream.source()),
            }
        }
        (raw_frames, missing)
    }

    /// Raw frames of every stream at `timestamp`, keyed by source.
    pub fn raw_frames(&self, timestamp: Timestamp) -> BTreeMap<SensorSource, &TimeFrame> {
        self.raw_streams
            .iter()
            .filter_map(|s| {
                s.frame_at(timestamp, self.config.raw_time_tolerance_us)
                    .map(|f| (s.source(), f))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic_object::{DynamicObject, ObjectState};
    use crate::sensors::{FrontCamera, RearCamera};

    fn ego() -> EgoMotionBuffer {
        EgoMotionBuffer::from_samples(&[(0, 0.0, 0.0, 0.0), (1_000_000, 0.0, 0.0, 0.0)]).unwrap()
    }

    fn frame(timestamp: Timestamp) -> TimeFrame {
        TimeFrame::new(
            timestamp,
            vec![DynamicObject::new(1, 5.0, 0.0, 0.9, ObjectState::Measured)],
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ValidationConfig {
            max_num_objects: 0,
            ..ValidationConfig::default()
        };
        assert!(ValidationEngine::new(config, ego()).is_err());
    }

    #[test]
    fn test_decreasing_timestamps_rejected() {
        let engine = ValidationEngine::new(ValidationConfig::default(), ego()).unwrap();
        let result = engine.run(&[frame(200_000), frame(100_000)]);
        assert!(matches!(
            result,
            Err(Error::NonMonotonicTimestamps { previous: 200_000, current: 100_000 })
        ));
    }

    #[test]
    fn test_duplicate_timestamps_tolerated() {
        let engine = ValidationEngine::new(ValidationConfig::default(), ego()).unwrap();
        let report = engine.run(&[frame(100_000), frame(100_000)]).unwrap();
        assert!(report.passed());
        assert_eq!(report.frames().len(), 2);
    }

    #[test]
    fn test_raw_stream_replaced_per_source() {
        let front = SensorSource::Front(FrontCamera);
        let engine = ValidationEngine::new(ValidationConfig::default(), ego())
            .unwrap()
            .with_raw_stream(RawDetectionStream::new(front, vec![frame(0)]))
            .with_raw_stream(RawDetectionStream::new(SensorSource::Rear(RearCamera), vec![frame(0)]))
            .with_raw_stream(RawDetectionStream::new(front, vec![frame(500_000)]));

        let at_start = engine.raw_frames(0);
        assert_eq!(at_start.len(), 1);
        assert!(at_start.contains_key(&SensorSource::Rear(RearCamera)));
        assert_eq!(engine.raw_frames(500_000).len(), 1);
    }

    #[test]
    fn test_dropped_camera_frame_skips_prediction_check() {
        let object_at = |timestamp| {
            TimeFrame::new(
                timestamp,
                vec![DynamicObject::new(1, 8.0, 0.0, 0.9, ObjectState::Measured)],
            )
            .unwrap()
        };
        let front_raw = |timestamp| {
            TimeFrame::new(
                timestamp,
                vec![DynamicObject::new(50, 8.1, 0.0, 0.9, ObjectState::Measured)],
            )
            .unwrap()
        };
        let engine = ValidationEngine::new(ValidationConfig::default(), ego())
            .unwrap()
            .with_raw_stream(RawDetectionStream::new(
                SensorSource::Front(FrontCamera),
                vec![front_raw(0), front_raw(200_000)],
            ))
            .with_raw_stream(RawDetectionStream::new(
                SensorSource::Rear(RearCamera),
                vec![TimeFrame::empty(0), TimeFrame::empty(100_000), TimeFrame::empty(200_000)],
            ));

        let report = engine
            .run(&[object_at(0), object_at(100_000), object_at(200_000)])
            .unwrap();
        assert!(report.passed(), "{:?}", report.violations());
        assert!(report.diagnostics().iter().any(|d| matches!(
            d,
            Diagnostic::InputMissing {
                timestamp: 100_000,
                input: MissingInput::RawDetections { source: SensorSource::Front(_) },
            }
        )));
    }

    #[test]
    fn test_missing_motion_is_a_diagnostic() {
        let engine = ValidationEngine::new(ValidationConfig::default(), ego()).unwrap();
        let report = engine.run(&[frame(900_000), frame(1_500_000)]).unwrap();
        assert!(report.passed());
        assert!(report
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::DataNotAvailable { timestamp: 1_500_000, .. })));
    }
}
