use chrono::Utc;

use crate::core::error::{Result, SweepError};
use crate::core::model::{
    ComparisonParameter, ComparisonType, Limits, NamedValue, Step, StepData, StepType, DATA_MODEL,
};
use crate::core::status::Status;

/// Name of the comparison recorded on power measurement steps.
pub const POWER_PARAMETER_NAME: &str = "Power Test";

/// Units of the power measurement.
pub const POWER_UNITS: &str = "Watts";

/// Builds a step record with no identity.
///
/// The status defaults to [`Status::Running`]. Containers must not carry measurement
/// parameters and leaves must carry at least one.
pub fn build_step(
    name: &str,
    step_type: StepType,
    inputs: Option<Vec<NamedValue>>,
    outputs: Option<Vec<NamedValue>>,
    parameters: Option<StepData>,
    status: Option<Status>,
) -> Result<Step> {
    let has_parameters = parameters.as_ref().map_or(false, |data| !data.parameters.is_empty());

    if step_type.is_container() && parameters.is_some() {
        return Err(SweepError::Validation(format!(
            "container step '{}' cannot carry measurement parameters", name
        )));
    }
    if !step_type.is_container() && !has_parameters {
        return Err(SweepError::Validation(format!(
            "measurement step '{}' requires measurement parameters", name
        )));
    }

    Ok(Step {
        step_id: None,
        parent_id: None,
        result_id: None,
        name: name.to_string(),
        step_type,
        status: status.unwrap_or(Status::Running),
        data: parameters,
        data_model: DATA_MODEL.to_string(),
        started_at: Some(Utc::now()),
        total_time_in_seconds: 0.0,
        inputs: inputs.unwrap_or_default(),
        outputs: outputs.unwrap_or_default(),
    })
}

/// Builds the single inclusive-bounds comparison for a power measurement.
pub fn build_power_measurement_params(power: f64, limits: &Limits, status: Status) -> StepData {
    StepData {
        text: String::new(),
        parameters: vec![ComparisonParameter {
            name: POWER_PARAMETER_NAME.to_string(),
            status,
            measurement: power,
            units: POWER_UNITS.to_string(),
            nominal_value: None,
            low_limit: limits.low(),
            high_limit: limits.high(),
            comparison_type: ComparisonType::Gele,
        }],
    }
}
