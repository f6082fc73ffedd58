use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Sweep interrupted")]
    Interrupted,
}

impl SweepError {
    /// Operator-facing advice for the failure.
    pub fn guidance(&self) -> &'static str {
        match self {
            SweepError::Transport(_) | SweepError::Unauthorized(_) => {
                "The given URL or API key might be invalid or the server might be down. \
                 Verify the server is up and the URL and API key are valid."
            }
            SweepError::Validation(_) => {
                "The store rejected a payload built by the sweep. This is a defect; please report it."
            }
            SweepError::Config(_) => "Check the configuration file and command-line arguments.",
            SweepError::Io(_) => "Check that the output path is writable.",
            SweepError::Interrupted => "The sweep was stopped before completion.",
        }
    }
}

impl From<reqwest::Error> for SweepError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SweepError::Validation(format!("Malformed store response: {}", err))
        } else {
            SweepError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(err: serde_json::Error) -> Self {
        SweepError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
