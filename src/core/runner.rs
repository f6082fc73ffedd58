use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use sysinfo::System;
use uuid::Uuid;

use crate::core::aggregate::evaluate_leaf;
use crate::core::config::SweepConfig;
use crate::core::error::{Result, SweepError};
use crate::core::factory::{build_power_measurement_params, build_step};
use crate::core::ledger::StepLedger;
use crate::core::measurement::{group_rng, MeasurementSource, Stimulus};
use crate::core::model::{Limits, Step, StepType, TestResult};
use crate::core::status::Status;
use crate::reporters::Reporter;
use crate::store::ResultStore;

/// Name of the container step opened for each current.
pub const GROUP_STEP_NAME: &str = "Voltage Sweep";

/// Name of each power measurement step.
pub const MEASUREMENT_STEP_NAME: &str = "Measure Power Output";

/// Result property recording the master seed.
pub const SEED_PROPERTY: &str = "sweepSeed";

/// Final state of one stimulus group.
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    pub index: usize,
    pub current: f64,
    pub parent: Step,
    pub children: Vec<Step>,
}

impl GroupOutcome {
    pub fn failed_measurements(&self) -> usize {
        self.children.iter().filter(|c| c.status.is_failure()).count()
    }
}

/// Everything a completed sweep submitted, in group order.
#[derive(Debug, Clone)]
pub struct SweepSummary {
    pub result: TestResult,
    pub groups: Vec<GroupOutcome>,
    pub seed: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
}

impl SweepSummary {
    pub fn status(&self) -> Status {
        self.result.status
    }

    pub fn measurement_count(&self) -> usize {
        self.groups.iter().map(|g| g.children.len()).sum()
    }

    pub fn failed_measurements(&self) -> usize {
        self.groups.iter().map(GroupOutcome::failed_measurements).sum()
    }
}

struct SweepContext {
    result_id: String,
    limits: Limits,
    seed: u64,
}

/// Drives a power sweep and mirrors its result/step tree into a store.
pub struct SweepRunner {
    store: Box<dyn ResultStore + Send + Sync>,
    source: Box<dyn MeasurementSource + Send + Sync>,
    reporter: Box<dyn Reporter + Send + Sync>,
    config: SweepConfig,
    interrupted: Arc<AtomicBool>,
}

impl SweepRunner {
    pub fn new(
        store: Box<dyn ResultStore + Send + Sync>,
        source: Box<dyn MeasurementSource + Send + Sync>,
        reporter: Box<dyn Reporter + Send + Sync>,
        config: SweepConfig,
    ) -> Self {
        Self {
            store,
            source,
            reporter,
            config,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the sweep from issuing further requests once raised.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Raise the interrupt flag on Ctrl-C.
    pub fn setup_interrupt_handler(&self) -> Result<()> {
        let interrupted = self.interrupted.clone();

        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
            warn!("Received interrupt signal, no further requests will be issued");
        })
        .map_err(|e| SweepError::Io(io::Error::new(io::ErrorKind::Other, e)))?;

        Ok(())
    }

    /// Run the sweep using the strategy selected in the configuration.
    pub fn execute(&self) -> Result<SweepSummary> {
        self.reporter.report_info(&format!("Starting sweep with source '{}'", self.source.name()));

        let outcome = if self.config.parallel {
            self.execute_parallel()
        } else {
            self.execute_sequential()
        };

        match &outcome {
            Ok(summary) => {
                self.reporter.report_info(&format!("Sweep completed with status: {}", summary.status()));
            }
            Err(e) => {
                self.reporter.report_warning(&format!("Sweep aborted: {}", e));
            }
        }

        outcome
    }

    /// Process groups one after another.
    pub fn execute_sequential(&self) -> Result<SweepSummary> {
        let (ctx, result, started_at, started) = self.open_result()?;
        let abort = AtomicBool::new(false);

        let mut ledger = StepLedger::new();
        let mut groups = Vec::with_capacity(self.config.currents.len());
        for (index, &current) in self.config.currents.iter().enumerate() {
            let (group, fragment) = self.run_group(&ctx, index, current, &abort)?;
            ledger.merge(fragment);
            groups.push(group);
        }

        self.close_result(ctx, result, ledger, groups, started_at, started)
    }

    /// Process groups concurrently; the result is finalized after all groups join.
    pub fn execute_parallel(&self) -> Result<SweepSummary> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_threads())
            .build()
            .map_err(|e| SweepError::Config(format!("Failed to build thread pool: {}", e)))?;

        let (ctx, result, started_at, started) = self.open_result()?;
        let abort = AtomicBool::new(false);

        let outcomes: Vec<Result<(GroupOutcome, StepLedger)>> = pool.install(|| {
            self.config.currents
                .par_iter()
                .enumerate()
                .map(|(index, &current)| {
                    let outcome = self.run_group(&ctx, index, current, &abort);
                    if outcome.is_err() {
                        abort.store(true, Ordering::SeqCst);
                    }
                    outcome
                })
                .collect()
        });

        let mut ledger = StepLedger::new();
        let mut groups = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok((group, fragment)) => {
                    ledger.merge(fragment);
                    groups.push(group);
                }
                Err(e) => errors.push(e),
            }
        }
        if let Some(e) = first_cause(errors) {
            return Err(e);
        }

        self.close_result(ctx, result, ledger, groups, started_at, started)
    }

    fn check_interrupted(&self) -> Result<()> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Err(SweepError::Interrupted);
        }
        Ok(())
    }

    // `abort` is raised by a sibling group that failed.
    fn check_halted(&self, abort: &AtomicBool) -> Result<()> {
        self.check_interrupted()?;
        if abort.load(Ordering::SeqCst) {
            return Err(SweepError::Interrupted);
        }
        Ok(())
    }

    // A halt here leaves the parent at its last submitted status while its children are stored.
    fn halt_before_update(&self, abort: &AtomicBool, parent_id: &str, next: Status) -> Result<()> {
        self.check_halted(abort).map_err(|e| {
            warn!("Sweep halted before step {} could be updated to {}; it stays {} in the store",
                parent_id, next, Status::Running);
            e
        })
    }

    fn open_result(&self) -> Result<(SweepContext, TestResult, DateTime<Utc>, Instant)> {
        self.config.validate()?;
        let limits = self.config.limits()?;
        let seed = self.config.seed.unwrap_or_else(rand::random);
        info!("Sweeping {} current(s) x {} voltage(s), seed {}",
            self.config.currents.len(), self.config.voltages.len(), seed);

        self.check_interrupted()?;
        self.reporter.report_start(&self.config);

        let serial_number = self.config.serial_number.clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut result = TestResult::new(
            self.config.program_name.as_str(),
            self.config.operator.as_str(),
            self.config.part_number.as_str(),
            serial_number,
        );
        result.host_name = System::host_name();
        result.properties.insert(SEED_PROPERTY.to_string(), seed.to_string());

        let started_at = result.started_at;
        let result = self.store.create_results(vec![result])?.into_single()?;
        let result_id = result.require_id()?.to_string();
        info!("Created result {}", result_id);

        let ctx = SweepContext { result_id, limits, seed };
        Ok((ctx, result, started_at, Instant::now()))
    }

    fn run_group(
        &self,
        ctx: &SweepContext,
        index: usize,
        current: f64,
        abort: &AtomicBool,
    ) -> Result<(GroupOutcome, StepLedger)> {
        let mut ledger = StepLedger::new();
        let mut rng = group_rng(ctx.seed, index);
        let opened = Instant::now();

        self.check_halted(abort)?;
        self.reporter.report_group_start(index, current);

        let mut parent = build_step(GROUP_STEP_NAME, StepType::SequenceCall, None, None, None, None)?;
        parent.result_id = Some(ctx.result_id.clone());
        let mut parent = self.store.create_steps(vec![parent])?.into_single()?;
        let parent_id = parent.require_id()?.to_string();
        ledger.open_parent(&parent_id);
        debug!("Opened group {} ({} A) as step {}", index, current, parent_id);

        let mut children = Vec::with_capacity(self.config.voltages.len());
        for &voltage in &self.config.voltages {
            self.check_halted(abort)?;

            let measured = Instant::now();
            let measurement = self.source.measure(&Stimulus { current, voltage }, &mut rng);
            let status = evaluate_leaf(measurement.value, ctx.limits.low(), ctx.limits.high());
            let parameters = build_power_measurement_params(measurement.value, &ctx.limits, status);

            let mut leaf = build_step(
                MEASUREMENT_STEP_NAME,
                StepType::NumericLimit,
                Some(measurement.inputs),
                Some(measurement.outputs),
                Some(parameters),
                Some(status),
            )?;
            leaf.parent_id = Some(parent_id.clone());
            leaf.result_id = Some(ctx.result_id.clone());
            leaf.total_time_in_seconds = measured.elapsed().as_secs_f64();

            let leaf = self.store.create_steps(vec![leaf])?.into_single()?;
            let leaf_id = leaf.require_id()?.to_string();
            self.reporter.report_step_result(&leaf);

            if let Some(next) = ledger.record_child(&parent_id, &leaf_id, status)? {
                warn!("{} W at {} A, {} V is out of limits; step {} is now {}",
                    measurement.value, current, voltage, parent_id, next);
                parent.status = next;
                parent.total_time_in_seconds = opened.elapsed().as_secs_f64();
                self.halt_before_update(abort, &parent_id, next)?;
                parent = self.store.update_steps(vec![parent])?.into_single()?;
            }

            children.push(leaf);
        }

        if let Some(next) = ledger.close_parent(&parent_id)? {
            parent.status = next;
            parent.total_time_in_seconds = opened.elapsed().as_secs_f64();
            self.halt_before_update(abort, &parent_id, next)?;
            parent = self.store.update_steps(vec![parent])?.into_single()?;
        }
        debug!("Closed group {} as {} after {} measurement(s)",
            index, parent.status, ledger.children(&parent_id).len());

        let outcome = GroupOutcome { index, current, parent, children };
        self.reporter.report_group_result(&outcome);
        Ok((outcome, ledger))
    }

    fn close_result(
        &self,
        ctx: SweepContext,
        mut result: TestResult,
        ledger: StepLedger,
        groups: Vec<GroupOutcome>,
        start_time: DateTime<Utc>,
        started: Instant,
    ) -> Result<SweepSummary> {
        self.check_interrupted()?;

        result.status = ledger.result_status();
        result.total_time_in_seconds = started.elapsed().as_secs_f64();
        let result = self.store.update_results(vec![result])?.into_single()?;
        info!("Result {} finalized as {}", ctx.result_id, result.status);

        let summary = SweepSummary {
            result,
            groups,
            seed: ctx.seed,
            start_time,
            end_time: Utc::now(),
            duration: started.elapsed(),
        };
        self.reporter.report_summary(&summary);

        Ok(summary)
    }
}

/// Picks the error that caused an abort over the interruptions it triggered.
fn first_cause(errors: Vec<SweepError>) -> Option<SweepError> {
    let mut interrupted = None;
    for e in errors {
        match e {
            SweepError::Interrupted => interrupted = Some(e),
            cause => return Some(cause),
        }
    }
    interrupted
}
