use std::collections::HashSet;
use std::process::Command;
use std::time::Duration;
use rand::RngCore;

use sweepmon::core::config::SweepConfig;
use sweepmon::core::measurement::{Measurement, MeasurementSource, Stimulus};
use sweepmon::core::model::{NamedValue, StepType};
use sweepmon::core::runner::{SweepRunner, SweepSummary, GROUP_STEP_NAME, MEASUREMENT_STEP_NAME};
use sweepmon::core::status::Status;
use sweepmon::reporters::csv::CsvReporter;
use sweepmon::reporters::json::JsonReporter;
use sweepmon::reporters::silent::SilentReporter;
use sweepmon::sources::power::PowerSupplySimulator;
use sweepmon::store::memory::{InMemoryStore, StoreEvent};

/// Fixed power readings, one per voltage index.
struct FixedReadings(Vec<f64>);

impl MeasurementSource for FixedReadings {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn measure(&self, stimulus: &Stimulus, _rng: &mut dyn RngCore) -> Measurement {
        let value = self.0[stimulus.voltage as usize];
        Measurement {
            value,
            inputs: vec![
                NamedValue::new("current", stimulus.current),
                NamedValue::new("voltage", stimulus.voltage),
            ],
            outputs: vec![NamedValue::new("power", value)],
        }
    }
}

fn sweep_config(currents: usize, voltages: usize) -> SweepConfig {
    let mut config = SweepConfig::default();
    config.currents = (0..currents as u32).map(f64::from).collect();
    config.voltages = (0..voltages as u32).map(f64::from).collect();
    config.seed = Some(1234);
    config.serial_number = Some("SN-0001".to_string());
    config
}

fn run_sweep(
    store: &InMemoryStore,
    source: Box<dyn MeasurementSource + Send + Sync>,
    config: SweepConfig,
) -> SweepSummary {
    SweepRunner::new(Box::new(store.clone()), source, Box::new(SilentReporter), config)
        .execute()
        .expect("sweep should complete")
}

#[test]
fn test_single_group_single_passing_child() {
    let store = InMemoryStore::new();
    let summary = run_sweep(&store, Box::new(FixedReadings(vec![35.0])), sweep_config(1, 1));

    let group = &summary.groups[0];
    assert_eq!(group.parent.status, Status::Passed);
    assert_eq!(group.children.len(), 1);
    assert_eq!(group.children[0].status, Status::Passed);
    assert_eq!(summary.status(), Status::Passed);

    let result_id = summary.result.id.clone().unwrap();
    assert_eq!(store.result(&result_id).unwrap().status, Status::Passed);
    assert_eq!(store.result(&result_id).unwrap().serial_number, "SN-0001");
}

#[test]
fn test_one_failing_child_fails_parent_immediately() {
    let mut readings = vec![10.0; 10];
    readings[6] = 70.5;

    let store = InMemoryStore::new();
    let summary = run_sweep(&store, Box::new(FixedReadings(readings)), sweep_config(1, 10));

    let parent_id = summary.groups[0].parent.step_id.clone().unwrap();
    let history = store.status_history(&parent_id);
    assert_eq!(history, vec![Status::Running, Status::Failed]);
    assert!(!history.contains(&Status::Passed));

    // The parent flips after the seventh child is created and before the eighth.
    let events = store.events();
    let children_created_before_flip = events.iter()
        .take_while(|e| !matches!(e, StoreEvent::StepUpdated { id, .. } if *id == parent_id))
        .filter(|e| matches!(e, StoreEvent::StepCreated { parent_id: Some(p), .. } if *p == parent_id))
        .count();
    assert_eq!(children_created_before_flip, 7);

    assert_eq!(summary.failed_measurements(), 1);
    assert_eq!(summary.status(), Status::Failed);
}

#[test]
fn test_result_finalized_after_last_parent() {
    let store = InMemoryStore::new();
    let summary = run_sweep(&store, Box::new(PowerSupplySimulator::ideal()), sweep_config(10, 7));

    assert_eq!(summary.groups.len(), 10);
    assert!(summary.groups.iter().all(|g| g.parent.status == Status::Passed));
    assert_eq!(summary.status(), Status::Passed);

    let events = store.events();
    let result_updates: Vec<usize> = events.iter().enumerate()
        .filter(|(_, e)| matches!(e, StoreEvent::ResultUpdated { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(result_updates, vec![events.len() - 1]);

    let last_parent_close = events.iter()
        .rposition(|e| matches!(e, StoreEvent::StepUpdated { status: Status::Passed, .. }))
        .unwrap();
    assert!(last_parent_close < result_updates[0]);
}

/// Fails at voltage 3 for odd currents, passes everywhere else.
struct OddCurrentFailures;

impl MeasurementSource for OddCurrentFailures {
    fn name(&self) -> &'static str {
        "odd_current_failures"
    }

    fn measure(&self, stimulus: &Stimulus, _rng: &mut dyn RngCore) -> Measurement {
        let odd = stimulus.current as u32 % 2 == 1;
        let value = if odd && stimulus.voltage == 3.0 { 90.0 } else { 10.0 };
        Measurement {
            value,
            inputs: vec![
                NamedValue::new("current", stimulus.current),
                NamedValue::new("voltage", stimulus.voltage),
            ],
            outputs: vec![NamedValue::new("power", value)],
        }
    }
}

#[test]
fn test_parallel_groups_join_before_result_update() {
    let store = InMemoryStore::new();
    let mut config = sweep_config(8, 6);
    config.parallel = true;
    config.threads = 4;
    let summary = run_sweep(&store, Box::new(OddCurrentFailures), config);

    assert_eq!(summary.groups.len(), 8);
    assert_eq!(summary.status(), Status::Failed);

    let events = store.events();
    let result_updates: Vec<usize> = events.iter().enumerate()
        .filter(|(_, e)| matches!(e, StoreEvent::ResultUpdated { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(result_updates, vec![events.len() - 1]);

    for (index, group) in summary.groups.iter().enumerate() {
        assert_eq!(group.index, index);
        assert_eq!(group.current, index as f64);

        let parent_id = group.parent.step_id.clone().unwrap();
        let history = store.status_history(&parent_id);
        if index % 2 == 1 {
            assert_eq!(history, vec![Status::Running, Status::Failed]);

            // The flip lands after the fourth child of this group and before the fifth.
            let children_before_flip = events.iter()
                .take_while(|e| !matches!(e, StoreEvent::StepUpdated { id, .. } if *id == parent_id))
                .filter(|e| matches!(e, StoreEvent::StepCreated { parent_id: Some(p), .. } if *p == parent_id))
                .count();
            assert_eq!(children_before_flip, 4);
        } else {
            assert_eq!(history, vec![Status::Running, Status::Passed]);
        }
    }
}

#[test]
fn test_every_step_references_result_and_existing_parent() {
    let store = InMemoryStore::new();
    let mut config = sweep_config(4, 5);
    config.parallel = true;
    config.threads = 2;
    let summary = run_sweep(&store, Box::new(PowerSupplySimulator::new()), config);
    let result_id = summary.result.id.clone().unwrap();

    let mut created = HashSet::new();
    for event in store.events() {
        if let StoreEvent::StepCreated { id, result_id: owner, parent_id, .. } = event {
            assert_eq!(owner, result_id);
            if let Some(parent) = parent_id {
                assert!(created.contains(&parent), "parent {} created after child {}", parent, id);
            }
            created.insert(id);
        }
    }
    assert_eq!(created.len(), 4 + 4 * 5);

    for step in store.steps_for(&result_id) {
        match step.step_type {
            StepType::SequenceCall => {
                assert_eq!(step.name, GROUP_STEP_NAME);
                assert!(step.parent_id.is_none());
                assert!(step.data.is_none());
            }
            StepType::NumericLimit => {
                assert_eq!(step.name, MEASUREMENT_STEP_NAME);
                assert!(step.parent_id.is_some());
                assert!(step.parameter().is_some());
            }
        }
    }
}

#[test]
fn test_terminal_statuses_never_change() {
    let store = InMemoryStore::new();
    let summary = run_sweep(&store, Box::new(PowerSupplySimulator::new()), sweep_config(10, 10));

    for group in &summary.groups {
        let parent_id = group.parent.step_id.clone().unwrap();
        let history = store.status_history(&parent_id);
        assert_eq!(history[0], Status::Running);
        assert!(history.len() <= 2);
        assert_eq!(*history.last().unwrap(), group.parent.status);
    }

    let failed_groups = summary.groups.iter().filter(|g| g.parent.status == Status::Failed).count();
    let expected = if failed_groups > 0 { Status::Failed } else { Status::Passed };
    assert_eq!(summary.status(), expected);
}

#[test]
fn test_json_document_contains_hierarchy() {
    let store = InMemoryStore::new();
    let summary = run_sweep(&store, Box::new(FixedReadings(vec![5.0, 80.0])), sweep_config(2, 2));

    let document = JsonReporter::summary_document(&summary);
    assert_eq!(document["summary"]["status"], "FAILED");
    assert_eq!(document["summary"]["measurements"], 4);
    assert_eq!(document["result"]["status"]["statusType"], "FAILED");
    assert_eq!(document["groups"].as_array().unwrap().len(), 2);
    assert_eq!(document["groups"][0]["children"][1]["data"]["parameters"][0]["comparisonType"], "GELE");
    assert_eq!(document["groups"][0]["children"][1]["data"]["parameters"][0]["status"], "FAILED");
}

#[test]
fn test_csv_lists_every_measurement() {
    let store = InMemoryStore::new();
    let summary = run_sweep(&store, Box::new(FixedReadings(vec![5.0, 6.0, 7.0])), sweep_config(2, 3));

    let mut writer = csv::Writer::from_writer(Vec::new());
    CsvReporter::write_summary(&mut writer, &summary).unwrap();
    let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();

    let lines: Vec<&str> = output.lines().collect();
    assert!(lines[0].starts_with("Group,Parent Step,Step"));
    assert_eq!(lines.iter().filter(|l| l.ends_with(",PASSED")).count(), 7);
    assert!(lines.last().unwrap().starts_with("Summary,"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("power sweep test runner"));
    assert!(stdout.contains("Commands:"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("simulate"));
    assert!(stdout.contains("check"));
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sweepmon"));
    assert!(stdout.contains("0.1.0"));
}

#[test]
fn test_cli_simulate_passing_sweep() {
    let output = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .args(["simulate", "--currents", "0..3", "--voltages", "0..3", "--seed", "7"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("POWER SWEEP STARTING"));
    assert!(stdout.contains("OVERALL RESULT"));
    assert!(stdout.contains("PASS"));
}

#[test]
fn test_cli_simulate_failing_sweep_exits_one() {
    let output = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .args(["--format", "json", "simulate", "--currents", "5", "--voltages", "5", "--high-limit", "1"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(document["summary"]["status"], "FAILED");
}

#[test]
fn test_cli_check() {
    let pass = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .args(["check", "70", "--low", "0", "--high", "70"])
        .output()
        .expect("Failed to execute command");
    assert!(pass.status.success());
    assert!(String::from_utf8_lossy(&pass.stdout).contains("PASSED"));

    let fail = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .args(["check", "-1"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(fail.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&fail.stdout).contains("FAILED"));
}

#[test]
fn test_cli_run_without_url_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .args(["run", "--currents", "0..1", "--voltages", "0..1"])
        .env_remove("SWEEPMON_URL")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("No store URL"));
}

#[test]
fn test_cli_setup_errors_exit_two() {
    let bad_url = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .args(["run", "--url", "ftp://store.invalid", "--currents", "1", "--voltages", "1"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(bad_url.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&bad_url.stderr).contains("http(s)"));

    let bad_limits = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .args(["simulate", "--low-limit", "10", "--high-limit", "1"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(bad_limits.status.code(), Some(2));

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let missing_config = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .arg("--config")
        .arg(&missing)
        .arg("simulate")
        .output()
        .expect("Failed to execute command");
    assert_eq!(missing_config.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&missing_config.stderr).contains("Config file not found"));
}

#[test]
fn test_cli_lossless_simulation_is_exact() {
    let output = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .args(["--format", "json", "simulate", "--currents", "3", "--voltages", "4", "--max-loss", "0"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(document["groups"][0]["children"][0]["data"]["parameters"][0]["measurement"], "12");
}

#[test]
fn test_invalid_range_rejected() {
    let output = Command::new(env!("CARGO_BIN_EXE_sweepmon"))
        .args(["simulate", "--currents", "5..2"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Empty range"));
}

#[test]
fn test_config_file_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sweep.toml");
    std::fs::write(&path, "currents = [1.0]\nvoltages = [2.0, 3.0]\nseed = 5\nrequest_timeout = \"2s\"\n").unwrap();

    let config = SweepConfig::from_file(path.to_str().unwrap()).unwrap();
    assert_eq!(config.currents, vec![1.0]);
    assert_eq!(config.voltages, vec![2.0, 3.0]);
    assert_eq!(config.seed, Some(5));
    assert_eq!(config.high_limit, 70.0);
    assert_eq!(config.request_timeout, Duration::from_secs(2));

    assert!(SweepConfig::from_file(dir.path().join("missing.toml").to_str().unwrap()).is_err());
}
