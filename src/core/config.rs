use serde::{Serialize, Deserialize};
use std::time::Duration;
use std::path::PathBuf;

use crate::core::model::Limits;
use crate::core::error::{Result, SweepError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub program_name: String,
    pub operator: String,
    pub part_number: String,
    pub serial_number: Option<String>,

    pub currents: Vec<f64>,
    pub voltages: Vec<f64>,
    pub low_limit: f64,
    pub high_limit: f64,
    pub seed: Option<u64>,
    pub max_loss: f64,

    pub parallel: bool,
    pub threads: u32,

    pub store_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    pub output_format: OutputFormat,
    pub output_file: Option<PathBuf>,
    pub verbose: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            program_name: "Power Test".to_string(),
            operator: "John Smith".to_string(),
            part_number: "NI-ABC-123-PWR1".to_string(),
            serial_number: None,

            currents: (0..10).map(f64::from).collect(),
            voltages: (0..10).map(f64::from).collect(),
            low_limit: 0.0,
            high_limit: 70.0,
            seed: None,
            max_loss: 0.25,

            parallel: false,
            threads: 0,

            store_url: None,
            api_key: None,
            request_timeout: Duration::from_secs(30),

            output_format: OutputFormat::Text,
            output_file: None,
            verbose: false,
            quiet: false,
        }
    }
}

impl SweepConfig {
    /// Validated measurement limits.
    pub fn limits(&self) -> Result<Limits> {
        Limits::new(self.low_limit, self.high_limit)
    }

    /// Worker threads for parallel sweeps; 0 means one per logical CPU.
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads as usize
        }
    }

    /// Checks the settings a sweep depends on.
    pub fn validate(&self) -> Result<()> {
        self.limits()?;
        if self.currents.is_empty() {
            return Err(SweepError::Config("At least one current is required".to_string()));
        }
        if self.voltages.is_empty() {
            return Err(SweepError::Config("At least one voltage is required".to_string()));
        }
        if let Some(bad) = self.currents.iter().chain(&self.voltages).find(|v| !v.is_finite()) {
            return Err(SweepError::Config(format!("Stimulus values must be finite, got {}", bad)));
        }
        if !(0.0..=1.0).contains(&self.max_loss) {
            return Err(SweepError::Config(format!("Maximum loss must be within [0, 1], got {}", self.max_loss)));
        }
        if self.request_timeout.is_zero() {
            return Err(SweepError::Config("Request timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn parse_timeout(timeout_str: &str) -> std::result::Result<Duration, String> {
        let timeout = humantime::parse_duration(timeout_str)
            .map_err(|e| format!("Invalid duration format: {}", e))?;

        if timeout < Duration::from_secs(1) {
            return Err("Timeout must be at least 1 second".to_string());
        }
        if timeout > Duration::from_secs(10 * 60) {
            return Err("Timeout cannot exceed 10 minutes".to_string());
        }

        Ok(timeout)
    }

    /// Parses a stimulus list: `start..end` (integer steps, end exclusive) or `a,b,c`.
    pub fn parse_range(range_str: &str) -> std::result::Result<Vec<f64>, String> {
        let range_str = range_str.trim();

        if let Some((start, end)) = range_str.split_once("..") {
            let start = start.trim().parse::<i64>()
                .map_err(|_| format!("Invalid range start: {}", start))?;
            let end = end.trim().parse::<i64>()
                .map_err(|_| format!("Invalid range end: {}", end))?;
            if end <= start {
                return Err(format!("Empty range: {}", range_str));
            }
            return Ok((start..end).map(|v| v as f64).collect());
        }

        let values = range_str
            .split(',')
            .map(|part| {
                let part = part.trim();
                part.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| format!("Invalid value: {}", part))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(values)
    }

    pub fn from_file(path: &str) -> std::result::Result<Self, String> {
        use std::fs;
        use std::path::Path;

        let path = Path::new(path);
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config = if path.extension().and_then(|ext| ext.to_str()) == Some("toml") {
            toml::from_str::<Self>(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?
        } else {
            serde_json::from_str::<Self>(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?
        };

        Ok(config)
    }
}

// Durations in config files are written the way `--timeout` takes them, e.g. "30s".
mod humantime_duration {
    use std::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
