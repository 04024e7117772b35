//! End-to-end fixture tests for the validation engine.
//!
//! Each fixture under `testdata/fixtures` holds a recorded scenario (config,
//! ego motion, optional ground truth and raw detections, fused frames) plus
//! the expected findings.
//!
//! Run with: cargo test fixture

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use tpf_validation_rs::ground_truth::{GroundTruthFrame, GroundTruthSample};
use tpf_validation_rs::sensors::RawDetectionStream;
use tpf_validation_rs::{
    sensor_by_name, EgoMotionBuffer, GroundTruthTable, TimeFrame, Timestamp, ValidationConfig, ValidationEngine,
    ValidationReport, Violation,
};

// ============================================================================
// Fixture JSON Schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct Fixture {
    #[allow(dead_code)]
    description: String,
    config: ValidationConfig,
    ego: Vec<(Timestamp, f64, f64, f64)>,
    #[serde(default)]
    ground_truth: Option<GroundTruthJson>,
    #[serde(default)]
    raw: BTreeMap<String, Vec<TimeFrame>>,
    frames: Vec<TimeFrame>,
    expected: Expected,
}

#[derive(Debug, Deserialize)]
struct GroundTruthJson {
    frame: GroundTruthFrame,
    samples: Vec<GroundTruthSample>,
}

#[derive(Debug, Deserialize)]
struct Expected {
    passed: bool,
    violations: Vec<Violation>,
    diagnostic_kinds: Vec<String>,
    #[serde(default)]
    cycles_with_metrics: Option<usize>,
    #[serde(default)]
    mean_precision_rate: Option<f64>,
    #[serde(default)]
    mean_recall_rate: Option<f64>,
    #[serde(default)]
    num_objects: Option<Vec<usize>>,
}

// ============================================================================
// Test Helpers
// ============================================================================

fn find_testdata_dir() -> PathBuf {
    // Try various locations relative to where tests run
    let candidates = [
        PathBuf::from("testdata/fixtures"),
        PathBuf::from("../testdata/fixtures"),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/fixtures"),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return candidate.clone();
        }
    }
    panic!("Could not find testdata/fixtures directory");
}

fn load_fixture(scenario: &str) -> Fixture {
    let path = find_testdata_dir().join(format!("fixture_{}.json", scenario));

    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture file {:?}: {}", path, e));

    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture file {:?}: {}", path, e))
}

fn replay(fixture: &Fixture) -> ValidationReport {
    let ego = EgoMotionBuffer::from_samples(&fixture.ego).expect("Failed to build ego buffer");
    let mut engine =
        ValidationEngine::new(fixture.config.clone(), ego).expect("Failed to create engine");

    if let Some(gt) = &fixture.ground_truth {
        engine = engine.with_ground_truth(GroundTruthTable::new(gt.samples.clone(), gt.frame));
    }
    for (name, frames) in &fixture.raw {
        let source = sensor_by_name(name).expect("Unknown sensor in fixture");
        engine = engine.with_raw_stream(RawDetectionStream::new(source, frames.clone()));
    }

    engine.run(&fixture.frames).expect("Replay failed")
}

fn compare_violations(expected: &[Violation], actual: &[Violation], tolerance: f64) -> Result<(), String> {
    if expected.len() != actual.len() {
        return Err(format!(
            "Expected {} violations, got {}:\n  expected: {:?}\n  actual: {:?}",
            expected.len(),
            actual.len(),
            expected,
            actual
        ));
    }

    for (i, (exp, act)) in expected.iter().zip(actual.iter()).enumerate() {
        if exp.rule != act.rule || exp.object_id != act.object_id || exp.timestamp != act.timestamp {
            return Err(format!("Violation {} mismatch: expected {}, got {}", i, exp, act));
        }
        if (exp.observed_value - act.observed_value).abs() > tolerance
            || (exp.expected_bound - act.expected_bound).abs() > tolerance
        {
            return Err(format!("Violation {} values differ: expected {}, got {}", i, exp, act));
        }
    }
    Ok(())
}

fn diagnostic_kinds(report: &ValidationReport) -> BTreeSet<String> {
    report
        .diagnostics()
        .iter()
        .map(|d| {
            serde_json::to_value(d).expect("diagnostic serializes")["kind"]
                .as_str()
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

fn run_fixture(scenario: &str) -> (Fixture, ValidationReport) {
    let fixture = load_fixture(scenario);
    let report = replay(&fixture);

    assert_eq!(report.passed(), fixture.expected.passed, "{}: verdict mismatch", scenario);
    if let Err(msg) = compare_violations(&fixture.expected.violations, report.violations(), 1e-9) {
        panic!("{}: {}", scenario, msg);
    }
    let expected_kinds: BTreeSet<String> = fixture.expected.diagnostic_kinds.iter().cloned().collect();
    assert_eq!(diagnostic_kinds(&report), expected_kinds, "{}: diagnostics mismatch", scenario);

    (fixture, report)
}

// ============================================================================
// Fixture Tests
// ============================================================================

#[test]
fn test_fixture_premature_reuse() {
    run_fixture("premature_reuse");
}

#[test]
fn test_fixture_prediction_duration() {
    run_fixture("prediction_duration");
}

#[test]
fn test_fixture_ground_truth_drive() {
    let (fixture, report) = run_fixture("ground_truth_drive");
    let expected = &fixture.expected;

    let with_metrics = report.frames().iter().filter(|r| r.metrics.is_some()).count();
    assert_eq!(Some(with_metrics), expected.cycles_with_metrics);
    assert_eq!(Some(report.metrics().cycles), expected.cycles_with_metrics);

    let tolerance = 1e-9;
    match (report.metrics().mean_precision_rate, expected.mean_precision_rate) {
        (Some(a), Some(e)) => assert!((a - e).abs() < tolerance, "precision {} != {}", a, e),
        (a, e) => assert_eq!(a, e),
    }
    match (report.metrics().mean_recall_rate, expected.mean_recall_rate) {
        (Some(a), Some(e)) => assert!((a - e).abs() < tolerance, "recall {} != {}", a, e),
        (a, e) => assert_eq!(a, e),
    }
}

#[test]
fn test_fixture_slot_array() {
    let (fixture, report) = run_fixture("slot_array");
    let num_objects: Vec<usize> = report.frames().iter().map(|r| r.num_objects).collect();
    assert_eq!(Some(num_objects), fixture.expected.num_objects);
}

#[test]
fn test_fixture_report_json_round_trip() {
    let fixture = load_fixture("prediction_duration");
    let report = replay(&fixture);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    report.write_json(&path).unwrap();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let violations: Vec<Violation> = serde_json::from_value(value["violations"].clone()).unwrap();
    assert_eq!(violations, report.violations());
    assert_eq!(value["frames"].as_array().map(|f| f.len()), Some(fixture.frames.len()));
}
