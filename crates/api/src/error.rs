//! API error type and its JSON response shape.
//!
//! Every failure leaves the API as `{"error": "<CODE>", "message": "..."}`
//! with the status code the domain error reports.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use coffer_core::journal::JournalError;
use coffer_core::period::PeriodError;
use coffer_core::wallet::WalletError;
use coffer_db::RepositoryError;
use coffer_shared::AppError;
use serde_json::json;
use tracing::{error, warn};

/// Errors returned by handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Ledger or storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Request-level failure (missing tenant, malformed body).
    #[error(transparent)]
    App(#[from] AppError),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        let code = match self {
            Self::Repository(e) => e.http_status_code(),
            Self::App(e) => e.status_code(),
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Stable error code for the response body.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Repository(e) => e.error_code(),
            Self::App(e) => e.error_code(),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        Self::Repository(err.into())
    }
}

impl From<JournalError> for ApiError {
    fn from(err: JournalError) -> Self {
        Self::Repository(err.into())
    }
}

impl From<PeriodError> for ApiError {
    fn from(err: PeriodError) -> Self {
        Self::Repository(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::App(AppError::Validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::App(AppError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::App(AppError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.error_code();

        let message = if status.is_server_error() {
            error!(error = %self, code, "Request failed");
            "An internal error occurred".to_string()
        } else {
            warn!(error = %self, code, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
