use std::fmt;
use serde::{Serialize, Deserialize};

/// The status of a result or step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "StatusObject", try_from = "StatusObject")]
pub enum Status {
    Running,
    Passed,
    Failed,
}

impl Status {
    /// Returns `true` once the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Running)
    }

    /// Returns `true` if the status is a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Status::Failed)
    }

    /// The `statusType` literal used on the wire.
    pub fn status_type(&self) -> &'static str {
        match self {
            Status::Running => "RUNNING",
            Status::Passed => "PASSED",
            Status::Failed => "FAILED",
        }
    }

    /// The human-readable `statusName`.
    pub fn status_name(&self) -> &'static str {
        match self {
            Status::Running => "Running",
            Status::Passed => "Passed",
            Status::Failed => "Failed",
        }
    }

    /// Parses a `statusType` literal.
    pub fn from_status_type(value: &str) -> Option<Self> {
        match value {
            "RUNNING" => Some(Status::Running),
            "PASSED" => Some(Status::Passed),
            "FAILED" => Some(Status::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_name())
    }
}

/// Wire form of [`Status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusObject {
    pub status_type: String,
    #[serde(default)]
    pub status_name: String,
}

impl From<Status> for StatusObject {
    fn from(status: Status) -> Self {
        Self {
            status_type: status.status_type().to_string(),
            status_name: status.status_name().to_string(),
        }
    }
}

impl TryFrom<StatusObject> for Status {
    type Error = String;

    fn try_from(object: StatusObject) -> Result<Self, Self::Error> {
        Status::from_status_type(&object.status_type)
            .ok_or_else(|| format!("unknown statusType: {}", object.status_type))
    }
}

/// Serializes a [`Status`] as its bare `statusType` string, as comparison parameters carry it.
pub mod status_type {
    use serde::{Deserialize, Deserializer, Serializer};
    use super::Status;

    pub fn serialize<S: Serializer>(status: &Status, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(status.status_type())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Status, D::Error> {
        let value = String::deserialize(deserializer)?;
        Status::from_status_type(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown statusType: {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_terminal() {
        assert!(!Status::Running.is_terminal());
        assert!(Status::Passed.is_terminal());
        assert!(Status::Failed.is_terminal());
    }

    #[test]
    fn test_status_wire_form() {
        let json = serde_json::to_value(Status::Failed).unwrap();
        assert_eq!(json, serde_json::json!({"statusType": "FAILED", "statusName": "Failed"}));
    }

    #[test]
    fn test_status_parses_without_name() {
        let status: Status = serde_json::from_str(r#"{"statusType": "PASSED"}"#).unwrap();
        assert_eq!(status, Status::Passed);
    }

    #[test]
    fn test_unknown_status_type_rejected() {
        let parsed = serde_json::from_str::<Status>(r#"{"statusType": "SKIPPED", "statusName": "Skipped"}"#);
        assert!(parsed.is_err());
    }
}
