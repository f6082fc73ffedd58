use std::io::{self, Write};
use colored::*;
use chrono::Local;

use crate::core::config::SweepConfig;
use crate::core::model::Step;
use crate::core::runner::{GroupOutcome, SweepSummary};
use crate::core::status::Status;
use crate::reporters::Reporter;

/// Text reporter for console output
pub struct TextReporter {
    verbose: bool,
    quiet: bool,
}

impl TextReporter {
    /// Create a new text reporter
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Format a duration in a human-readable format
    fn format_duration(&self, duration: std::time::Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }

    /// Format a status with color
    fn format_status(&self, status: Status) -> ColoredString {
        match status {
            Status::Passed => "✓ PASS".green().bold(),
            Status::Failed => "✗ FAIL".red().bold(),
            Status::Running => "⟳ RUNNING".cyan().bold(),
        }
    }
}

impl Reporter for TextReporter {
    fn report_start(&self, config: &SweepConfig) {
        if self.quiet {
            return;
        }

        println!("{}", "POWER SWEEP STARTING".bold());
        println!("====================");

        let now = Local::now();
        println!("Started: {}", now.format("%Y-%m-%d %H:%M:%S %Z"));

        if self.verbose {
            println!("\nSweep Configuration:");
            println!("  Program: {}", config.program_name);
            println!("  Operator: {}", config.operator);
            println!("  Part Number: {}", config.part_number);
            println!("  Currents: {:?}", config.currents);
            println!("  Voltages: {:?}", config.voltages);
            println!("  Limits: [{}, {}] W", config.low_limit, config.high_limit);
            println!("  Mode: {}", if config.parallel { "parallel".yellow() } else { "sequential".normal() });
        }

        println!("\nRunning sweep...\n");
        let _ = io::stdout().flush();
    }

    fn report_group_start(&self, index: usize, current: f64) {
        if self.quiet || !self.verbose {
            return;
        }

        println!("Opening group {} at {} A", index, current.to_string().cyan());
        let _ = io::stdout().flush();
    }

    fn report_step_result(&self, step: &Step) {
        if self.quiet || !self.verbose {
            return;
        }

        let current = step.input("current").unwrap_or_default();
        let voltage = step.input("voltage").unwrap_or_default();
        let power = step.parameter().map(|p| p.measurement).unwrap_or_default();
        println!("  {} A x {} V -> {:.3} W  {}", current, voltage, power, self.format_status(step.status));
        let _ = io::stdout().flush();
    }

    fn report_group_result(&self, group: &GroupOutcome) {
        if self.quiet {
            return;
        }

        println!("{} @ {} A: {} ({} measurements, {} failed)",
            group.parent.name.cyan(),
            group.current,
            self.format_status(group.parent.status),
            group.children.len(),
            group.failed_measurements());
        let _ = io::stdout().flush();
    }

    fn report_summary(&self, summary: &SweepSummary) {
        if self.quiet {
            println!("{} {}/{}",
                self.format_status(summary.status()),
                summary.measurement_count() - summary.failed_measurements(),
                summary.measurement_count());
            return;
        }

        let result = &summary.result;
        println!("\n{}", "POWER SWEEP RESULTS".bold());
        println!("===================");
        println!("Result: {}", result.id.as_deref().unwrap_or("unknown"));
        println!("Serial Number: {}", result.serial_number);
        println!("Host: {}", result.host_name.as_deref().unwrap_or("Unknown"));
        println!("Started: {}", summary.start_time.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("Duration: {}", self.format_duration(summary.duration));
        println!("Seed: {}", summary.seed);
        println!();

        for group in &summary.groups {
            println!("{:>8} A: {}  ({}/{} within limits)",
                group.current,
                self.format_status(group.parent.status),
                group.children.len() - group.failed_measurements(),
                group.children.len());
        }

        println!("\n{}: {} ({} of {} measurements failed)",
            "OVERALL RESULT".bold(),
            self.format_status(summary.status()),
            summary.failed_measurements(),
            summary.measurement_count());
    }

    fn report_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        eprintln!("{}: {}", "WARNING".yellow().bold(), message);
    }

    fn report_info(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.verbose {
            println!("{}: {}", "INFO".blue().bold(), message);
        }
    }
}
