use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use csv::Writer;

use crate::core::config::SweepConfig;
use crate::core::model::Step;
use crate::core::runner::{GroupOutcome, SweepSummary};
use crate::reporters::Reporter;

const HEADER: [&str; 9] = [
    "Group", "Parent Step", "Step", "Current (A)", "Voltage (V)", "Power (W)",
    "Low Limit", "High Limit", "Status",
];

/// CSV reporter for spreadsheet-compatible output
pub struct CsvReporter {
    output_file: Option<PathBuf>,
}

impl CsvReporter {
    /// Create a new CSV reporter
    pub fn new(output_file: Option<PathBuf>) -> Self {
        Self { output_file }
    }

    /// Create a CSV writer
    fn create_writer(&self) -> io::Result<Writer<Box<dyn Write>>> {
        match &self.output_file {
            Some(path) => {
                let file = File::create(path)?;
                Ok(csv::Writer::from_writer(Box::new(file) as Box<dyn Write>))
            }
            None => {
                Ok(csv::Writer::from_writer(Box::new(io::stdout()) as Box<dyn Write>))
            }
        }
    }

    /// Write every measurement followed by a summary row.
    pub fn write_summary<W: Write>(writer: &mut Writer<W>, summary: &SweepSummary) -> csv::Result<()> {
        writer.write_record(HEADER)?;

        for group in &summary.groups {
            let parent_id = group.parent.step_id.as_deref().unwrap_or_default();
            for step in &group.children {
                let (power, low, high) = step.parameter()
                    .map(|p| (p.measurement.to_string(), p.low_limit.to_string(), p.high_limit.to_string()))
                    .unwrap_or_default();

                writer.write_record(&[
                    group.index.to_string(),
                    parent_id.to_string(),
                    step.step_id.clone().unwrap_or_default(),
                    step.input("current").map(|v| v.to_string()).unwrap_or_default(),
                    step.input("voltage").map(|v| v.to_string()).unwrap_or_default(),
                    power,
                    low,
                    high,
                    step.status.status_type().to_string(),
                ])?;
            }
        }

        writer.write_record([""; 9])?;
        writer.write_record(&[
            "Summary".to_string(),
            summary.result.id.clone().unwrap_or_default(),
            summary.result.serial_number.clone(),
            summary.measurement_count().to_string(),
            summary.failed_measurements().to_string(),
            format!("{:.3}", summary.duration.as_secs_f64()),
            String::new(),
            String::new(),
            summary.status().status_type().to_string(),
        ])?;

        writer.flush()?;
        Ok(())
    }
}

impl Reporter for CsvReporter {
    fn report_start(&self, _config: &SweepConfig) {
        // CSV reporter doesn't output anything at start
    }

    fn report_group_start(&self, _index: usize, _current: f64) {}

    fn report_step_result(&self, _step: &Step) {
        // Measurements are only reported in the final output
    }

    fn report_group_result(&self, _group: &GroupOutcome) {}

    fn report_summary(&self, summary: &SweepSummary) {
        let mut writer = match self.create_writer() {
            Ok(w) => w,
            Err(e) => {
                eprintln!("Error creating CSV writer: {}", e);
                return;
            }
        };

        if let Err(e) = Self::write_summary(&mut writer, summary) {
            eprintln!("Error writing CSV output: {}", e);
        }
    }

    fn report_warning(&self, message: &str) {
        eprintln!("Warning: {}", message);
    }

    fn report_info(&self, _message: &str) {}
}
