use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use log::debug;

use crate::core::error::{Result, SweepError};
use crate::core::model::{Step, TestResult};
use crate::core::status::Status;
use crate::store::{ResultStore, ResultsResponse, StepsResponse};

/// A mutation accepted by the store, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    ResultCreated { id: String, status: Status },
    ResultUpdated { id: String, status: Status },
    StepCreated { id: String, result_id: String, parent_id: Option<String>, status: Status },
    StepUpdated { id: String, status: Status },
}

#[derive(Debug, Default)]
struct StoreState {
    next_id: u64,
    requests: usize,
    fail_after: Option<usize>,
    results: BTreeMap<String, TestResult>,
    steps: BTreeMap<String, Step>,
    // step ids per result, in creation order
    step_order: BTreeMap<String, Vec<String>>,
    events: Vec<StoreEvent>,
}

impl StoreState {
    fn assign_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn admit_request(&mut self) -> Result<()> {
        if let Some(limit) = self.fail_after {
            if self.requests >= limit {
                return Err(SweepError::Transport(format!(
                    "store unreachable after {} request(s)", limit
                )));
            }
        }
        self.requests += 1;
        Ok(())
    }
}

/// Thread-safe in-process store mirroring the remote contract.
///
/// Clones share state, so a caller can keep a handle for inspection after handing one to a
/// runner.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that fails every request after the first `requests` succeed.
    pub fn failing_after(requests: usize) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.fail_after = Some(requests);
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state.lock()
            .map_err(|_| SweepError::Transport("store state poisoned".to_string()))
    }

    /// Every accepted mutation in order.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.lock().map(|s| s.events.clone()).unwrap_or_default()
    }

    /// Current stored copy of a result.
    pub fn result(&self, id: &str) -> Option<TestResult> {
        self.lock().ok().and_then(|s| s.results.get(id).cloned())
    }

    /// Steps of a result in creation order.
    pub fn steps_for(&self, result_id: &str) -> Vec<Step> {
        self.lock()
            .map(|s| {
                s.step_order.get(result_id)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| s.steps.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every status a step was stored with, starting with its creation status.
    pub fn status_history(&self, step_id: &str) -> Vec<Status> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                StoreEvent::StepCreated { id, status, .. } | StoreEvent::StepUpdated { id, status }
                    if id == step_id => Some(status),
                _ => None,
            })
            .collect()
    }

    /// Number of requests served.
    pub fn request_count(&self) -> usize {
        self.lock().map(|s| s.requests).unwrap_or(0)
    }
}

fn check_transition(kind: &str, id: &str, stored: Status, next: Status) -> Result<()> {
    if stored.is_terminal() && stored != next {
        return Err(SweepError::Validation(format!(
            "{} {} is already {} and cannot become {}", kind, id, stored, next
        )));
    }
    Ok(())
}

impl ResultStore for InMemoryStore {
    fn create_results(&self, results: Vec<TestResult>) -> Result<ResultsResponse> {
        let mut state = self.lock()?;
        state.admit_request()?;

        if let Some(bad) = results.iter().find(|r| r.status != Status::Running) {
            return Err(SweepError::Validation(format!(
                "result '{}' must be created RUNNING, got {}", bad.program_name, bad.status.status_type()
            )));
        }

        let mut created = Vec::with_capacity(results.len());
        for mut result in results {
            let id = state.assign_id("result");
            result.id = Some(id.clone());
            debug!("Created result {}", id);
            state.events.push(StoreEvent::ResultCreated { id: id.clone(), status: result.status });
            state.step_order.insert(id.clone(), Vec::new());
            state.results.insert(id, result.clone());
            created.push(result);
        }

        Ok(ResultsResponse::new(created))
    }

    fn update_results(&self, results: Vec<TestResult>) -> Result<ResultsResponse> {
        let mut state = self.lock()?;
        state.admit_request()?;

        for result in &results {
            let id = result.require_id()?;
            let stored = state.results.get(id)
                .ok_or_else(|| SweepError::Validation(format!("unknown result id {}", id)))?;
            check_transition("result", id, stored.status, result.status)?;
        }

        let mut updated = Vec::with_capacity(results.len());
        for result in results {
            let id = result.require_id()?.to_string();
            debug!("Updated result {} to {}", id, result.status);
            state.events.push(StoreEvent::ResultUpdated { id: id.clone(), status: result.status });
            state.results.insert(id, result.clone());
            updated.push(result);
        }

        Ok(ResultsResponse::new(updated))
    }

    fn create_steps(&self, steps: Vec<Step>) -> Result<StepsResponse> {
        let mut state = self.lock()?;
        state.admit_request()?;

        for step in &steps {
            let result_id = step.result_id.as_deref()
                .ok_or_else(|| SweepError::Validation(format!("step '{}' has no resultId", step.name)))?;
            if !state.results.contains_key(result_id) {
                return Err(SweepError::Validation(format!("unknown result id {}", result_id)));
            }
            if let Some(parent_id) = step.parent_id.as_deref() {
                let parent = state.steps.get(parent_id)
                    .ok_or_else(|| SweepError::Validation(format!("unknown parent step id {}", parent_id)))?;
                if parent.result_id.as_deref() != Some(result_id) {
                    return Err(SweepError::Validation(format!(
                        "parent step {} belongs to a different result", parent_id
                    )));
                }
            }
        }

        let mut created = Vec::with_capacity(steps.len());
        for mut step in steps {
            let id = state.assign_id("step");
            let result_id = step.result_id.clone().unwrap_or_default();
            step.step_id = Some(id.clone());
            debug!("Created step {} '{}' ({})", id, step.name, step.status);
            state.events.push(StoreEvent::StepCreated {
                id: id.clone(),
                result_id: result_id.clone(),
                parent_id: step.parent_id.clone(),
                status: step.status,
            });
            state.step_order.entry(result_id).or_default().push(id.clone());
            state.steps.insert(id, step.clone());
            created.push(step);
        }

        Ok(StepsResponse::new(created))
    }

    fn update_steps(&self, steps: Vec<Step>) -> Result<StepsResponse> {
        let mut state = self.lock()?;
        state.admit_request()?;

        for step in &steps {
            let id = step.require_id()?;
            let stored = state.steps.get(id)
                .ok_or_else(|| SweepError::Validation(format!("unknown step id {}", id)))?;
            check_transition("step", id, stored.status, step.status)?;
            if stored.result_id != step.result_id || stored.parent_id != step.parent_id {
                return Err(SweepError::Validation(format!("step {} cannot be moved", id)));
            }
        }

        let mut updated = Vec::with_capacity(steps.len());
        for step in steps {
            let id = step.require_id()?.to_string();
            debug!("Updated step {} to {}", id, step.status);
            state.events.push(StoreEvent::StepUpdated { id: id.clone(), status: step.status });
            state.steps.insert(id, step.clone());
            updated.push(step);
        }

        Ok(StepsResponse::new(updated))
    }
}
