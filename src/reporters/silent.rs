use crate::core::config::SweepConfig;
use crate::core::model::Step;
use crate::core::runner::{GroupOutcome, SweepSummary};
use crate::reporters::Reporter;

/// Reporter that discards everything, for embedding and benchmarks.
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn report_start(&self, _config: &SweepConfig) {}

    fn report_group_start(&self, _index: usize, _current: f64) {}

    fn report_step_result(&self, _step: &Step) {}

    fn report_group_result(&self, _group: &GroupOutcome) {}

    fn report_summary(&self, _summary: &SweepSummary) {}

    fn report_warning(&self, _message: &str) {}

    fn report_info(&self, _message: &str) {}
}
