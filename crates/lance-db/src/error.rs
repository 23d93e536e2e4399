use thiserror::Error;

/// Failures coming back from the data platform, whichever backend serves it.
#[derive(Debug, Error)]
pub enum DbError {
    /// A UNIQUE constraint rejected the write (Postgres SQLSTATE 23505).
    #[error("duplicate key value violates unique constraint: {0}")]
    UniqueViolation(String),

    /// Any other constraint or type check rejected the statement.
    #[error("constraint violation: {0}")]
    Rejected(String),

    /// Network-level failure reaching the platform; safe to retry.
    #[error("network error: {0}")]
    Transient(String),

    /// The platform answered with an error status.
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// Credentials or tokens refused by the auth provider.
    #[error("{0}")]
    Auth(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ffi;

        if let rusqlite::Error::SqliteFailure(err, ref msg) = e {
            let message = msg.clone().unwrap_or_else(|| err.to_string());
            match err.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return Self::UniqueViolation(message);
                }
                ffi::SQLITE_CONSTRAINT_CHECK
                | ffi::SQLITE_CONSTRAINT_FOREIGNKEY
                | ffi::SQLITE_CONSTRAINT_NOTNULL => return Self::Rejected(message),
                _ => {}
            }
        }
        Self::Sqlite(e)
    }
}

impl From<reqwest::Error> for DbError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            Self::Transient(e.to_string())
        } else if e.is_decode() {
            Self::Internal(format!("undecodable response: {e}"))
        } else {
            Self::Backend {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

impl From<tokio::task::JoinError> for DbError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("spawn_blocking join error: {e}"))
    }
}

/// Classify an error payload returned by PostgREST / GoTrue / Storage.
///
/// PostgREST answers `{"code": "23505", "message": ..., "details": ...}`;
/// the other services use `msg`, `error_description` or `error`.
pub(crate) fn classify_backend_error(status: u16, body: &str) -> DbError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_owned)
    };

    let code = field("code");
    let message = field("message")
        .or_else(|| field("msg"))
        .or_else(|| field("error_description"))
        .or_else(|| field("error"))
        .unwrap_or_else(|| body.to_string());

    match code.as_deref() {
        Some("23505") => DbError::UniqueViolation(message),
        Some("23502") | Some("23503") | Some("23514") | Some("22P02") => {
            DbError::Rejected(message)
        }
        _ if status == 409 => DbError::UniqueViolation(message),
        _ => DbError::Backend { status, message },
    }
}
