//! WebServer-specific error types

use analysis::AnalysisError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use report::ReportError;
use serde_json::json;
use shared::{PatientId, ProcessId, SharedError, process_error};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum WebServerError {
    #[error("HTTP server startup failed: {0}")]
    ServerStartup(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,

    #[error("Patient not found: {0}")]
    PatientNotFound(PatientId),

    #[error("A patient with document id {0} already exists")]
    DuplicateDocument(String),

    #[error("Analysis not found: {0}")]
    AnalysisNotFound(Uuid),

    #[error("Batch not found: {0}")]
    BatchNotFound(Uuid),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Report generation failed: {0}")]
    Report(#[from] ReportError),

    #[error("Mail delivery failed: {0}")]
    MailDelivery(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("{0}")]
    Domain(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl WebServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WebServerError::InvalidRequest(_) | WebServerError::Domain(_) => StatusCode::BAD_REQUEST,
            WebServerError::Analysis(inner) => match inner {
                AnalysisError::EmptyImage { .. }
                | AnalysisError::UnsupportedFormat { .. }
                | AnalysisError::DecodeFailed { .. }
                | AnalysisError::EmptyBatch
                | AnalysisError::ShapeMismatch { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            WebServerError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            WebServerError::PatientNotFound(_)
            | WebServerError::AnalysisNotFound(_)
            | WebServerError::BatchNotFound(_)
            | WebServerError::FileNotFound(_) => StatusCode::NOT_FOUND,
            WebServerError::DuplicateDocument(_) => StatusCode::CONFLICT,
            WebServerError::AccessDenied(_) => StatusCode::FORBIDDEN,
            WebServerError::MailDelivery(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            process_error!(ProcessId::current(), "❌ Request failed: {}", self);
        }
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type WebServerResult<T> = Result<T, WebServerError>;
