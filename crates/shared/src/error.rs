//! Request-level error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Errors raised outside the ledger rules themselves.
///
/// Domain crates carry their own error enums; these cover the request and
/// process boundary (headers, bodies, configuration).
#[derive(Debug, Error)]
pub enum AppError {
    /// Tenant context missing or malformed.
    #[error("Missing tenant context: {0}")]
    MissingTenant(String),

    /// Malformed request input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingTenant(_) | Self::Validation(_) => 400,
            Self::Config(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingTenant(_) => "TENANT_REQUIRED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
