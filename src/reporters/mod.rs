pub mod text;
pub mod json;
pub mod csv;
pub mod silent;

use crate::core::config::SweepConfig;
use crate::core::model::Step;
use crate::core::runner::{GroupOutcome, SweepSummary};

/// Reporter trait for sweep progress and results.
///
/// Groups may be reported from several threads at once when the sweep runs in parallel.
pub trait Reporter {
    /// Report the start of a sweep
    fn report_start(&self, config: &SweepConfig);

    /// Report that a stimulus group was opened
    fn report_group_start(&self, index: usize, current: f64);

    /// Report a created measurement step
    fn report_step_result(&self, step: &Step);

    /// Report a closed stimulus group
    fn report_group_result(&self, group: &GroupOutcome);

    /// Report the finalized result
    fn report_summary(&self, summary: &SweepSummary);

    /// Report a warning message
    fn report_warning(&self, message: &str);

    /// Report an informational message
    fn report_info(&self, message: &str);
}
