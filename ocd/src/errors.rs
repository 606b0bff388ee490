//! Error types for the OCD GUI server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ocd_api_models::models::ErrorResponse;
use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum OcdError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid folder path: {0}")]
    ValidationError(String),

    #[error("Failed to start deployment: {0}")]
    SpawnError(String),

    #[error("Git error: {0}")]
    GitError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Ci(#[from] CiError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for OcdError {
    fn from(err: anyhow::Error) -> Self {
        OcdError::Internal(err.to_string())
    }
}

impl OcdError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OcdError::ValidationError(_) | OcdError::JsonError(_) => StatusCode::BAD_REQUEST,
            OcdError::NotFound(_) => StatusCode::NOT_FOUND,
            OcdError::Ci(err) => err.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OcdError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            success: false,
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Category of a Jenkins / Bitbucket failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiErrorKind {
    Authentication,
    NotFound,
    InvalidParameters,
    Timeout,
    Parsing,
    Configuration,
    InvalidUrl,
    Network,
}

impl CiErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            CiErrorKind::Authentication => "CI_AUTH_001",
            CiErrorKind::NotFound => "CI_NOT_FOUND_002",
            CiErrorKind::InvalidParameters => "CI_PARAM_003",
            CiErrorKind::Timeout => "CI_TIMEOUT_004",
            CiErrorKind::Parsing => "CI_PARSE_005",
            CiErrorKind::Configuration => "CI_CONFIG_006",
            CiErrorKind::Network => "CI_NETWORK_007",
            CiErrorKind::InvalidUrl => "CI_URL_008",
        }
    }
}

/// Error returned by the Jenkins and Bitbucket clients
#[derive(Error, Debug)]
#[error("[{}] {}", .kind.code(), .message)]
pub struct CiError {
    pub kind: CiErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl CiError {
    pub fn new(kind: CiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(status: u16, url: &str, body: &str) -> Self {
        let (kind, message) = match status {
            401 | 403 => (
                CiErrorKind::Authentication,
                format!("authentication failed (status: {})", status),
            ),
            404 => (
                CiErrorKind::NotFound,
                format!("resource not found: {} (status: {})", url, status),
            ),
            408 | 504 => (
                CiErrorKind::Timeout,
                format!("request timeout (status: {})", status),
            ),
            422 => (
                CiErrorKind::InvalidParameters,
                format!("invalid parameters (status: {}): {}", status, body),
            ),
            500..=599 => (
                CiErrorKind::Network,
                format!("server error (status: {}): {}", status, body),
            ),
            _ => (
                CiErrorKind::Network,
                format!("HTTP error (status: {}): {}", status, body),
            ),
        };

        Self {
            kind,
            message,
            status: Some(status),
        }
    }

    pub fn kind(&self) -> CiErrorKind {
        self.kind
    }

    /// Timeouts and 5xx responses are retried; everything else fails fast
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            CiErrorKind::Timeout => true,
            CiErrorKind::Network => match self.status {
                Some(code) => (500..600).contains(&code),
                None => true,
            },
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            CiErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            CiErrorKind::NotFound => StatusCode::NOT_FOUND,
            CiErrorKind::InvalidParameters => StatusCode::UNPROCESSABLE_ENTITY,
            CiErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            CiErrorKind::Configuration => StatusCode::SERVICE_UNAVAILABLE,
            CiErrorKind::InvalidUrl => StatusCode::BAD_REQUEST,
            CiErrorKind::Parsing | CiErrorKind::Network => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<reqwest::Error> for CiError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            CiErrorKind::Timeout
        } else if err.is_decode() {
            CiErrorKind::Parsing
        } else if err.is_builder() {
            CiErrorKind::InvalidUrl
        } else {
            CiErrorKind::Network
        };
        Self {
            kind,
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
        }
    }
}
