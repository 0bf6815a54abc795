//! Mapping of sqlx errors onto [`AppError`] kinds.

use notifyhub_core::error::{AppError, ErrorKind};

/// Serialization failure.
const SERIALIZATION_FAILURE: &str = "40001";
/// Deadlock detected.
const DEADLOCK_DETECTED: &str = "40P01";
/// Unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Classify a sqlx error.
///
/// Lock contention and unique-key races become [`ErrorKind::Conflict`] so
/// callers can retry them. Connection-level failures become
/// [`ErrorKind::ServiceUnavailable`].
pub fn classify(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::RowNotFound => ErrorKind::NotFound,
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => ErrorKind::ServiceUnavailable,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | UNIQUE_VIOLATION) => {
                ErrorKind::Conflict
            }
            _ => ErrorKind::Database,
        },
        _ => ErrorKind::Database,
    }
}

/// Wrap a sqlx error with context.
pub fn db_error(context: &str, err: sqlx::Error) -> AppError {
    let kind = classify(&err);
    AppError::with_source(kind, format!("{context}: {err}"), err)
}
