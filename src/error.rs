//! Request-level errors and their HTTP rendering.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::engine::ClassifierError;
use crate::table::TableError;
use crate::types::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("No file uploaded")]
    NoFile,
    #[error("Invalid file type. Please upload a CSV file")]
    InvalidFileType,
    #[error("Error reading file: {0}")]
    ReadFile(String),
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("{0}")]
    InvalidValue(String),
    #[error("File too large: {0}")]
    PayloadTooLarge(String),
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NoFile
            | ServiceError::InvalidFileType
            | ServiceError::ReadFile(_)
            | ServiceError::MissingColumns(_)
            | ServiceError::InvalidValue(_) => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ServiceError::Internal(e) => tracing::error!(error = ?e, "Prediction failed"),
            other => tracing::info!(error = %other, "Rejected prediction request"),
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<TableError> for ServiceError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::MissingColumns(columns) => ServiceError::MissingColumns(columns),
            other => ServiceError::ReadFile(other.to_string()),
        }
    }
}

impl From<ClassifierError> for ServiceError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::InvalidValue { .. } => ServiceError::InvalidValue(err.to_string()),
            other => ServiceError::Internal(other.into()),
        }
    }
}
