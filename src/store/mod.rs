pub mod http;
pub mod memory;

use serde::{Serialize, Deserialize};

use crate::core::error::{Result, SweepError};
use crate::core::model::{Step, TestResult};

/// Error object returned by the store alongside a partial response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of a result create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsResponse {
    #[serde(default)]
    pub results: Vec<TestResult>,
    #[serde(default)]
    pub failed: Vec<TestResult>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// Response of a step create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepsResponse {
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub failed: Vec<Step>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

impl ResultsResponse {
    pub fn new(results: Vec<TestResult>) -> Self {
        Self { results, failed: Vec::new(), error: None }
    }

    /// Extracts the only result, rejecting partial failures.
    pub fn into_single(self) -> Result<TestResult> {
        reject_failures(self.failed.len(), self.error.as_ref())?;
        single(self.results, "result")
    }
}

impl StepsResponse {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps, failed: Vec::new(), error: None }
    }

    /// Extracts the only step, rejecting partial failures.
    pub fn into_single(self) -> Result<Step> {
        reject_failures(self.failed.len(), self.error.as_ref())?;
        single(self.steps, "step")
    }
}

fn reject_failures(failed: usize, error: Option<&ApiError>) -> Result<()> {
    if failed == 0 && error.is_none() {
        return Ok(());
    }
    let message = error
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| "no error message".to_string());
    Err(SweepError::Validation(format!("store rejected {} record(s): {}", failed, message)))
}

fn single<T>(mut records: Vec<T>, kind: &str) -> Result<T> {
    match records.len() {
        1 => Ok(records.remove(0)),
        n => Err(SweepError::Validation(format!("expected 1 {} in store response, got {}", kind, n))),
    }
}

/// Narrow interface to the remote test-data store.
pub trait ResultStore {
    /// Creates results; the store assigns their ids.
    fn create_results(&self, results: Vec<TestResult>) -> Result<ResultsResponse>;

    /// Updates results identified by `id`.
    fn update_results(&self, results: Vec<TestResult>) -> Result<ResultsResponse>;

    /// Creates steps; the store assigns their ids.
    fn create_steps(&self, steps: Vec<Step>) -> Result<StepsResponse>;

    /// Updates steps identified by `stepId`.
    fn update_steps(&self, steps: Vec<Step>) -> Result<StepsResponse>;
}
