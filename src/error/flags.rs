use axum::{Json, http::StatusCode, response::IntoResponse};
use gmsflags_schema::{ApiErrorBody, ApiErrorObject, UserOverrideResult};
use thiserror::Error as ThisError;

use super::IsRetryable;

#[derive(Debug, ThisError)]
pub enum FlagsError {
    #[error("Root access denied: {0}")]
    RootDenied(String),

    #[error("Privileged connection lost")]
    ConnectionLost,

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(
        "Override of {name} in {package} failed for {} of {} users",
        .failed.len(),
        .failed.len() + .succeeded.len()
    )]
    PartialOverrideFailure {
        package: String,
        name: String,
        succeeded: Vec<String>,
        failed: Vec<UserOverrideResult>,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl FlagsError {
    /// Maps an error response of the privileged service back onto the taxonomy.
    pub fn from_api(status: StatusCode, body: Option<ApiErrorBody>) -> Self {
        let message = body
            .map(|b| b.inner.message)
            .unwrap_or_else(|| status.to_string());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FlagsError::ConnectionLost,
            StatusCode::BAD_REQUEST => FlagsError::InvalidValue(message),
            _ => FlagsError::QueryFailed(message),
        }
    }

    /// Transport failures mean the service is gone; everything else is a caller problem.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_request() || err.is_body() {
            FlagsError::ConnectionLost
        } else {
            FlagsError::ReqwestError(err)
        }
    }
}

impl IntoResponse for FlagsError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            FlagsError::QueryFailed(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorObject {
                    code: "QUERY_FAILED".to_string(),
                    message,
                },
            ),

            FlagsError::DatabaseError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorObject {
                    code: "QUERY_FAILED".to_string(),
                    message: e.to_string(),
                },
            ),

            FlagsError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ApiErrorObject {
                    code: "NOT_FOUND".to_string(),
                    message,
                },
            ),

            FlagsError::InvalidValue(message) => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject {
                    code: "INVALID_REQUEST".to_string(),
                    message,
                },
            ),

            FlagsError::RootDenied(_)
            | FlagsError::ConnectionLost
            | FlagsError::PartialOverrideFailure { .. }
            | FlagsError::ReqwestError(_)
            | FlagsError::JsonError(_)
            | FlagsError::IoError(_)
            | FlagsError::UrlError(_)
            | FlagsError::RactorError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorObject {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal service error occurred.".to_string(),
                },
            ),
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

/// SQLite primary result codes for SQLITE_BUSY and SQLITE_LOCKED, plus the
/// extended busy codes sqlx reports verbatim.
const BUSY_CODES: [&str; 4] = ["5", "6", "261", "517"];

impl IsRetryable for FlagsError {
    fn is_retryable(&self) -> bool {
        match self {
            FlagsError::DatabaseError(sqlx::Error::Database(db_err)) => {
                db_err
                    .code()
                    .is_some_and(|code| BUSY_CODES.iter().any(|busy| code == *busy))
                    || db_err.message().contains("database is locked")
            }
            FlagsError::DatabaseError(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}
