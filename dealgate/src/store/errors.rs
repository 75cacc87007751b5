use thiserror::Error;

/// Unified error type for storage operations that application code can handle.
///
/// "Not found" is not an error at this layer: lookups return `Ok(None)` and
/// existence checks return `Ok(false)`. Only constraint violations and
/// infrastructure failures surface here.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        message: String,
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using sqlx error categorization
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::UniqueViolation {
                constraint: db_err.constraint().map(|s| s.to_string()),
                message: db_err.message().to_string(),
            },
            // All other errors are non-recoverable - convert to anyhow
            _ => StoreError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Type alias for storage operation results
pub type Result<T> = std::result::Result<T, StoreError>;
