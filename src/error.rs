use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum ShotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HAR archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid base64 body: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Navigation error for {url}: {message}")]
    Navigation {
        url: String,
        message: String,
        status: Option<u16>,
    },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShotError {
    pub fn config(message: impl Into<String>) -> Self {
        ShotError::Config(message.into())
    }

    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        ShotError::Navigation {
            url: url.into(),
            message: message.into(),
            status: None,
        }
    }

    /// An HTTP error status that the run was told to treat as fatal.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        ShotError::Navigation {
            message: format!("{status} error for {url}"),
            url,
            status: Some(status),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, ShotError::Config(_))
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            ShotError::Io(e) => ErrorPayload::new(
                ErrorCategory::Io,
                e.to_string(),
                "Check file paths/permissions.",
            ),
            ShotError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify the URL (e.g., https://example.com or a local file path).",
            ),
            ShotError::Yaml(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check the YAML syntax; the file must contain a list of shots.",
            ),
            ShotError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Data,
                e.to_string(),
                "Re-run with -v to see the helper traffic.",
            ),
            ShotError::Archive(e) => ErrorPayload::new(
                ErrorCategory::Data,
                e.to_string(),
                "Verify the .har.zip file was fully written.",
            ),
            ShotError::Decode(e) => ErrorPayload::new(
                ErrorCategory::Data,
                e.to_string(),
                "The HAR file contains a corrupt response body.",
            ),
            ShotError::Navigation {
                message, status, ..
            } => {
                let remediation = if status.is_some() {
                    "Use --skip to ignore HTTP error responses, or check the URL."
                } else {
                    "Try increasing --timeout or ensure the page finishes loading."
                };
                ErrorPayload::new(ErrorCategory::Navigation, message.clone(), remediation)
            }
            ShotError::Browser(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("executable doesn't exist") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Run `shot-scraper install` (or `npx playwright install chromium`) to download the browser.",
                    )
                } else if lower.contains("timeout") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Try increasing --timeout or ensure the page loads without blocking.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Re-run with -v; file an issue if persistent.",
                    )
                }
            }
            ShotError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("playwright npm package is missing") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Install Playwright (e.g., `npm install playwright` and `shot-scraper install`).",
                    )
                } else if lower.contains("not found on path") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Install Node.js and ensure the node binary is on PATH (or set node_command in the config file).",
                    )
                } else if lower.contains("must contain a list") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Start each shot with '- url: ...' in the YAML file.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags, paths and the shot configuration.",
                    )
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ShotError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Navigation,
    Browser,
    Io,
    Data,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
