use std::io::{self, Write};
use std::fs::File;
use std::path::PathBuf;
use serde_json::{json, Value};

use crate::core::config::SweepConfig;
use crate::core::model::Step;
use crate::core::runner::{GroupOutcome, SweepSummary};
use crate::reporters::Reporter;

/// JSON reporter for machine-readable output
pub struct JsonReporter {
    output_file: Option<PathBuf>,
    verbose: bool,
}

impl JsonReporter {
    /// Create a new JSON reporter
    pub fn new(output_file: Option<PathBuf>, verbose: bool) -> Self {
        Self { output_file, verbose }
    }

    /// The full result hierarchy as one document.
    pub fn summary_document(summary: &SweepSummary) -> Value {
        let groups: Vec<Value> = summary.groups.iter()
            .map(|group| {
                json!({
                    "index": group.index,
                    "current": group.current,
                    "step": group.parent,
                    "children": group.children,
                })
            })
            .collect();

        json!({
            "summary": {
                "status": summary.status().status_type(),
                "measurements": summary.measurement_count(),
                "failed_measurements": summary.failed_measurements(),
                "seed": summary.seed,
                "started_at": summary.start_time.to_rfc3339(),
                "finished_at": summary.end_time.to_rfc3339(),
                "duration_seconds": summary.duration.as_secs_f64(),
            },
            "result": summary.result,
            "groups": groups,
        })
    }

    /// Write JSON to file or stdout
    fn write_json(&self, json_value: Value) -> io::Result<()> {
        let json_string = serde_json::to_string_pretty(&json_value)?;

        match &self.output_file {
            Some(path) => {
                let mut file = File::create(path)?;
                file.write_all(json_string.as_bytes())?;
            }
            None => {
                println!("{}", json_string);
            }
        }

        Ok(())
    }

    /// Progress events only go to stdout, never into the output file
    fn emit_event(&self, event: Value) {
        if self.verbose && self.output_file.is_none() {
            let _ = self.write_json(event);
        }
    }
}

impl Reporter for JsonReporter {
    fn report_start(&self, config: &SweepConfig) {
        self.emit_event(json!({
            "event": "sweep_start",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "config": {
                "program_name": config.program_name,
                "currents": config.currents,
                "voltages": config.voltages,
                "low_limit": config.low_limit,
                "high_limit": config.high_limit,
                "parallel": config.parallel,
            }
        }));
    }

    fn report_group_start(&self, index: usize, current: f64) {
        self.emit_event(json!({
            "event": "group_start",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "index": index,
            "current": current,
        }));
    }

    fn report_step_result(&self, step: &Step) {
        self.emit_event(json!({
            "event": "step_created",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "step": step,
        }));
    }

    fn report_group_result(&self, group: &GroupOutcome) {
        self.emit_event(json!({
            "event": "group_closed",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "index": group.index,
            "step_id": group.parent.step_id,
            "status": group.parent.status.status_type(),
        }));
    }

    fn report_summary(&self, summary: &SweepSummary) {
        if let Err(e) = self.write_json(Self::summary_document(summary)) {
            eprintln!("Error writing JSON output: {}", e);
        }
    }

    fn report_warning(&self, message: &str) {
        self.emit_event(json!({
            "event": "warning",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "message": message,
        }));
    }

    fn report_info(&self, message: &str) {
        self.emit_event(json!({
            "event": "info",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "message": message,
        }));
    }
}
