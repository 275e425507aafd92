//! Storage-specific error type wrapping sqlx errors.

use areaflow_domain::error::AreaFlowError;

/// Errors originating from the `SQLite` storage layer.
///
/// Messages never include bound values, so stored tokens cannot leak
/// through them.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize or deserialize a stored JSON value.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StorageError {
    /// Whether the database rejected a write because of a `UNIQUE` constraint.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Database(sqlx::Error::Database(err)) if err.is_unique_violation())
    }
}

impl From<StorageError> for AreaFlowError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
