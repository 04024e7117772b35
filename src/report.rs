//! Replay findings: violations, diagnostics and metrics.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::continuity::{RuleName, Violation};
use crate::dynamic_object::{ObjectId, Timestamp};
use crate::metrics::{CycleMetrics, MetricsSummary};
use crate::sensors::SensorSource;
use crate::Result;

/// Input that was absent for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum MissingInput {
    /// The frame carries no active objects.
    FusedObjects,
    GroundTruth,
    RawDetections { source: SensorSource },
}

/// A check that could not be evaluated. Never counts as a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The frame's checks depending on `input` were skipped.
    InputMissing { timestamp: Timestamp, input: MissingInput },
    /// More than one candidate fell within the gate.
    ///
    /// `rule` is `None` for the ground-truth association.
    AmbiguousAssociation {
        timestamp: Timestamp,
        object_id: ObjectId,
        rule: Option<RuleName>,
        candidate_ids: Vec<ObjectId>,
    },
    /// Ego motion did not cover the frame; motion-dependent checks were skipped.
    DataNotAvailable { timestamp: Timestamp, reason: String },
}

impl Diagnostic {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Diagnostic::InputMissing { timestamp, .. }
            | Diagnostic::AmbiguousAssociation { timestamp, .. }
            | Diagnostic::DataNotAvailable { timestamp, .. } => *timestamp,
        }
    }
}

/// Per-frame results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameRecord {
    pub timestamp: Timestamp,
    pub num_objects: usize,
    /// Fused id -> gt id.
    pub associated_objects: BTreeMap<ObjectId, ObjectId>,
    pub metrics: Option<CycleMetrics>,
    pub num_violations: usize,
}

/// Outcome of a whole replay.
///
/// Only violations fail the run; diagnostics are informational.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    passed: bool,
    frames: Vec<FrameRecord>,
    metrics: MetricsSummary,
    violations: Vec<Violation>,
    diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn new(
        frames: Vec<FrameRecord>,
        metrics: MetricsSummary,
        violations: Vec<Violation>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            passed: violations.is_empty(),
            frames,
            metrics,
            violations,
            diagnostics,
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn metrics(&self) -> &MetricsSummary {
        &self.metrics
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn violations_of(&self, rule: RuleName) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.rule == rule)
    }

    /// Number of violations per rule; rules without findings are omitted.
    pub fn violation_counts(&self) -> BTreeMap<RuleName, usize> {
        let mut counts = BTreeMap::new();
        for v in &self.violations {
            *counts.entry(v.rule).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}
