use std::fmt::Display;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lance_db::DbError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Every failure answers `{"error": "<message>"}` with the matching status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("Acesso negado".into())
    }

    /// Log and answer 500 with `context: cause`.
    pub fn internal(context: &str, cause: impl Display) -> Self {
        error!("{}: {}", context, cause);
        Self::Internal(format!("{context}: {cause}"))
    }

    /// Turn a write failure into a 400 with `context: cause`, keeping
    /// duplicates as 409.
    pub fn rejected(context: &str, cause: DbError) -> Self {
        match cause {
            DbError::UniqueViolation(_) => Self::Conflict(format!("{context}: {cause}")),
            DbError::Transient(_) | DbError::Internal(_) | DbError::Io(_) | DbError::Sqlite(_) => {
                Self::internal(context, cause)
            }
            other => Self::BadRequest(format!("{context}: {other}")),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UniqueViolation(msg) => Self::Conflict(msg),
            DbError::Rejected(msg) => Self::BadRequest(msg),
            DbError::Auth(msg) => Self::Unauthorized(msg),
            other => Self::internal("Erro no banco de dados", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
