use std::time::Duration;
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::error::{Result, SweepError};
use crate::core::model::{Step, TestResult};
use crate::store::{ResultStore, ResultsResponse, StepsResponse};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-ni-api-key";

const CREATE_RESULTS_PATH: &str = "/nitestmonitor/v2/results";
const UPDATE_RESULTS_PATH: &str = "/nitestmonitor/v2/update-results";
const CREATE_STEPS_PATH: &str = "/nitestmonitor/v2/steps";
const UPDATE_STEPS_PATH: &str = "/nitestmonitor/v2/update-steps";

#[derive(Serialize)]
struct ResultsRequest<'a> {
    results: &'a [TestResult],
}

#[derive(Serialize)]
struct StepsRequest<'a> {
    steps: &'a [Step],
}

/// Store client for a remote test monitor REST service.
pub struct HttpStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpStore {
    /// Create a new client for `base_url`.
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SweepError::Config(format!("Store URL must be http(s), got '{}'", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SweepError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    /// Full URL of an endpoint.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = self.endpoint(path);
        debug!("POST {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<R>()?);
        }

        let body = response.text().unwrap_or_default();
        warn!("POST {} failed with {}", url, status);
        Err(classify_failure(status, &body))
    }
}

/// Maps a non-success HTTP status to the error taxonomy.
pub fn classify_failure(status: StatusCode, body: &str) -> SweepError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SweepError::Unauthorized(detail),
        StatusCode::BAD_REQUEST
        | StatusCode::NOT_FOUND
        | StatusCode::CONFLICT
        | StatusCode::UNPROCESSABLE_ENTITY => SweepError::Validation(detail),
        _ => SweepError::Transport(detail),
    }
}

impl ResultStore for HttpStore {
    fn create_results(&self, results: Vec<TestResult>) -> Result<ResultsResponse> {
        self.post(CREATE_RESULTS_PATH, &ResultsRequest { results: &results })
    }

    fn update_results(&self, results: Vec<TestResult>) -> Result<ResultsResponse> {
        self.post(UPDATE_RESULTS_PATH, &ResultsRequest { results: &results })
    }

    fn create_steps(&self, steps: Vec<Step>) -> Result<StepsResponse> {
        self.post(CREATE_STEPS_PATH, &StepsRequest { steps: &steps })
    }

    fn update_steps(&self, steps: Vec<Step>) -> Result<StepsResponse> {
        self.post(UPDATE_STEPS_PATH, &StepsRequest { steps: &steps })
    }
}
