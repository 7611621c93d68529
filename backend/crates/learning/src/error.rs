//! Store Error Types
//!
//! Persistence failures raised by the write and read stores. They fold into
//! the unified `kernel::error::AppError` once they leave a handler.

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint violated
    #[error("Duplicate value: {0}")]
    Duplicate(String),

    /// Restrict-on-delete or missing parent row
    #[error("Record is still referenced: {0}")]
    StillReferenced(String),

    /// Stored row could not be mapped back to the domain
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Duplicate(_) | StoreError::StillReferenced(_) => ErrorKind::Conflict,
            StoreError::Corrupt(_) | StoreError::Database(_) => ErrorKind::InternalServerError,
        }
    }

    #[inline]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate(_))
    }

    #[inline]
    pub fn is_still_referenced(&self) -> bool {
        matches!(self, StoreError::StillReferenced(_))
    }

    pub fn to_app_error(&self) -> AppError {
        match self {
            // Never leak SQL text to clients
            StoreError::Database(_) | StoreError::Corrupt(_) => {
                AppError::new(self.kind(), "Database error")
            }
            _ => AppError::new(self.kind(), self.to_string()),
        }
    }

    fn log(&self) {
        match self {
            StoreError::Database(e) => tracing::error!(error = %e, "Store database error"),
            StoreError::Corrupt(msg) => tracing::error!(message = %msg, "Corrupt store record"),
            _ => tracing::debug!(error = %self, "Store constraint violation"),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some("23505") => return StoreError::Duplicate(constraint),
                Some("23503") | Some("23001") => return StoreError::StillReferenced(constraint),
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        err.log();
        let app = err.to_app_error();
        app.with_source(err)
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_errors_are_conflicts() {
        assert_eq!(StoreError::Duplicate("users_email_key".into()).kind(), ErrorKind::Conflict);
        assert_eq!(StoreError::StillReferenced("fk".into()).kind(), ErrorKind::Conflict);
        assert!(StoreError::Duplicate(String::new()).is_duplicate());
        assert!(!StoreError::Duplicate(String::new()).is_still_referenced());
    }

    #[test]
    fn test_database_error_hides_details() {
        let err: AppError = StoreError::Database(sqlx::Error::RowNotFound).into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.message(), "Database error");
    }
}
