//! In-memory view of a result's step tree.
//!
//! The ledger maps each step id to its current status and each parent id to its children in the
//! order they were processed. Records themselves stay with the runner; the ledger only tracks
//! identities and statuses.

use std::collections::HashMap;

use crate::core::aggregate::{finalize, fold_all, fold_parent};
use crate::core::error::{Result, SweepError};
use crate::core::status::Status;

#[derive(Debug, Default, Clone)]
pub struct StepLedger {
    statuses: HashMap<String, Status>,
    children: HashMap<String, Vec<String>>,
    parents: Vec<String>,
}

impl StepLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly created container step.
    pub fn open_parent(&mut self, parent_id: &str) {
        self.statuses.insert(parent_id.to_string(), Status::Running);
        self.children.insert(parent_id.to_string(), Vec::new());
        self.parents.push(parent_id.to_string());
    }

    /// Records a child outcome and folds it into the parent.
    ///
    /// Returns the parent's new status when the fold changed it.
    pub fn record_child(&mut self, parent_id: &str, child_id: &str, child: Status) -> Result<Option<Status>> {
        let current = self.parent_status(parent_id)?;
        let folded = fold_parent(current, child);

        self.statuses.insert(child_id.to_string(), child);
        if let Some(children) = self.children.get_mut(parent_id) {
            children.push(child_id.to_string());
        }

        Ok(self.transition(parent_id, current, folded))
    }

    /// Finalizes a parent once all its children were recorded.
    ///
    /// Returns the parent's new status when finalizing changed it.
    pub fn close_parent(&mut self, parent_id: &str) -> Result<Option<Status>> {
        let current = self.parent_status(parent_id)?;
        Ok(self.transition(parent_id, current, finalize(current)))
    }

    /// Current status of any recorded step.
    pub fn status(&self, step_id: &str) -> Option<Status> {
        self.statuses.get(step_id).copied()
    }

    /// Children of a parent in processing order.
    pub fn children(&self, parent_id: &str) -> &[String] {
        self.children.get(parent_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parents in the order they were opened.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Appends another ledger's steps. Parents keep `other`'s order after this ledger's.
    pub fn merge(&mut self, other: StepLedger) {
        self.statuses.extend(other.statuses);
        self.children.extend(other.children);
        self.parents.extend(other.parents);
    }

    /// Result-scope status: every parent folded in order, then finalized.
    pub fn result_status(&self) -> Status {
        fold_all(self.parents.iter().filter_map(|id| self.status(id)))
    }

    fn parent_status(&self, parent_id: &str) -> Result<Status> {
        if !self.children.contains_key(parent_id) {
            return Err(SweepError::Validation(format!("step {} was never opened as a parent", parent_id)));
        }
        self.status(parent_id)
            .ok_or_else(|| SweepError::Validation(format!("step {} has no recorded status", parent_id)))
    }

    fn transition(&mut self, step_id: &str, from: Status, to: Status) -> Option<Status> {
        if from == to {
            return None;
        }
        self.statuses.insert(step_id.to_string(), to);
        Some(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passing_children_defer_until_close() {
        let mut ledger = StepLedger::new();
        ledger.open_parent("p");
        assert_eq!(ledger.record_child("p", "c1", Status::Passed).unwrap(), None);
        assert_eq!(ledger.record_child("p", "c2", Status::Passed).unwrap(), None);
        assert_eq!(ledger.status("p"), Some(Status::Running));

        assert_eq!(ledger.close_parent("p").unwrap(), Some(Status::Passed));
        assert_eq!(ledger.close_parent("p").unwrap(), None);
        assert_eq!(ledger.children("p"), ["c1".to_string(), "c2".to_string()]);
    }

    #[test]
    fn test_failure_changes_parent_once() {
        let mut ledger = StepLedger::new();
        ledger.open_parent("p");
        assert_eq!(ledger.record_child("p", "c1", Status::Failed).unwrap(), Some(Status::Failed));
        assert_eq!(ledger.record_child("p", "c2", Status::Failed).unwrap(), None);
        assert_eq!(ledger.record_child("p", "c3", Status::Passed).unwrap(), None);
        assert_eq!(ledger.close_parent("p").unwrap(), None);
        assert_eq!(ledger.status("p"), Some(Status::Failed));
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let mut ledger = StepLedger::new();
        assert!(ledger.record_child("missing", "c", Status::Passed).is_err());
        assert!(ledger.close_parent("missing").is_err());
    }

    #[test]
    fn test_merge_and_result_status() {
        let mut first = StepLedger::new();
        first.open_parent("a");
        first.close_parent("a").unwrap();

        let mut second = StepLedger::new();
        second.open_parent("b");
        second.record_child("b", "b1", Status::Failed).unwrap();
        second.close_parent("b").unwrap();

        assert_eq!(first.result_status(), Status::Passed);
        first.merge(second);
        assert_eq!(first.parents(), ["a".to_string(), "b".to_string()]);
        assert_eq!(first.result_status(), Status::Failed);
        assert_eq!(first.status("b1"), Some(Status::Failed));
    }

    #[test]
    fn test_empty_ledger_passes() {
        assert_eq!(StepLedger::new().result_status(), Status::Passed);
    }
}
