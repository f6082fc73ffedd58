use std::collections::BTreeMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::error::{Result, SweepError};
use crate::core::status::{self, Status};

/// Data model tag attached to every step.
pub const DATA_MODEL: &str = "TestStand";

/// A top-level test record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(default)]
    pub id: Option<String>,
    pub program_name: String,
    pub status: Status,
    #[serde(default)]
    pub system_id: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: BTreeMap<String, String>,
    pub serial_number: String,
    pub operator: String,
    pub part_number: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub file_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub total_time_in_seconds: f64,
}

impl TestResult {
    /// Creates a running result with no identity.
    pub fn new(
        program_name: impl Into<String>,
        operator: impl Into<String>,
        part_number: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            program_name: program_name.into(),
            status: Status::Running,
            system_id: None,
            host_name: None,
            properties: BTreeMap::new(),
            serial_number: serial_number.into(),
            operator: operator.into(),
            part_number: part_number.into(),
            file_ids: Vec::new(),
            started_at: Utc::now(),
            total_time_in_seconds: 0.0,
        }
    }

    /// The store-assigned identity.
    pub fn require_id(&self) -> Result<&str> {
        self.id.as_deref()
            .ok_or_else(|| SweepError::Validation(format!("result '{}' has no id", self.program_name)))
    }
}

/// Categorical step type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepType {
    /// Container grouping child steps.
    SequenceCall,
    /// Leaf carrying one numeric-limit measurement.
    NumericLimit,
}

impl StepType {
    pub fn is_container(&self) -> bool {
        matches!(self, StepType::SequenceCall)
    }
}

/// A named input or output value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
}

impl NamedValue {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value }
    }
}

/// Kind of limit comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonType {
    /// `low <= measured <= high`
    #[serde(rename = "GELE")]
    Gele,
}

/// Inclusive measurement limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    low: f64,
    high: f64,
}

impl Limits {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        if !low.is_finite() || !high.is_finite() {
            return Err(SweepError::Config(format!("Limits must be finite, got [{}, {}]", low, high)));
        }
        if low > high {
            return Err(SweepError::Config(format!("Low limit {} exceeds high limit {}", low, high)));
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

/// One numeric-limit check recorded on a leaf step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonParameter {
    pub name: String,
    #[serde(with = "status::status_type")]
    pub status: Status,
    #[serde(with = "decimal_string")]
    pub measurement: f64,
    pub units: String,
    #[serde(default)]
    pub nominal_value: Option<f64>,
    #[serde(with = "decimal_string")]
    pub low_limit: f64,
    #[serde(with = "decimal_string")]
    pub high_limit: f64,
    pub comparison_type: ComparisonType,
}

/// Measurement payload of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub parameters: Vec<ComparisonParameter>,
}

/// A node of a result's step tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub result_id: Option<String>,
    pub name: String,
    pub step_type: StepType,
    pub status: Status,
    #[serde(default)]
    pub data: Option<StepData>,
    #[serde(default = "default_data_model")]
    pub data_model: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_time_in_seconds: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub inputs: Vec<NamedValue>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub outputs: Vec<NamedValue>,
}

fn default_data_model() -> String {
    DATA_MODEL.to_string()
}

// The store echoes absent collections as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Step {
    /// The store-assigned identity.
    pub fn require_id(&self) -> Result<&str> {
        self.step_id.as_deref()
            .ok_or_else(|| SweepError::Validation(format!("step '{}' has no stepId", self.name)))
    }

    /// The first comparison parameter, if the step is a leaf.
    pub fn parameter(&self) -> Option<&ComparisonParameter> {
        self.data.as_ref().and_then(|data| data.parameters.first())
    }

    /// Looks up a named input.
    pub fn input(&self, name: &str) -> Option<f64> {
        self.inputs.iter().find(|v| v.name == name).map(|v| v.value)
    }
}

/// Numbers travelling as decimal strings.
mod decimal_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse::<f64>().map_err(serde::de::Error::custom)
    }
}
