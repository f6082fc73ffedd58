//! Status aggregation.
//!
//! Failure propagates immediately through [`fold_parent`]; success is only declared by
//! [`finalize`] once every child of a scope has been observed.

use crate::core::status::Status;

/// Evaluates a measurement against inclusive limits.
///
/// Both bounds pass. A NaN measurement fails.
pub fn evaluate_leaf(measured: f64, low: f64, high: f64) -> Status {
    if low <= measured && measured <= high {
        Status::Passed
    } else {
        Status::Failed
    }
}

/// Folds one child's status into its parent's current status.
pub fn fold_parent(current: Status, child: Status) -> Status {
    match child {
        Status::Failed => Status::Failed,
        Status::Passed | Status::Running => current,
    }
}

/// Closes a scope: a scope still running after all children is passed.
pub fn finalize(status: Status) -> Status {
    match status {
        Status::Running => Status::Passed,
        terminal => terminal,
    }
}

/// Folds a complete, ordered set of child statuses and finalizes the scope.
pub fn fold_all<I>(children: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    finalize(children.into_iter().fold(Status::Running, fold_parent))
}
