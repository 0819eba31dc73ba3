//! Service error types.

use habits_core::validation::ValidationError;
use habits_storage::StorageError;

/// Errors returned by [`RecordService`](crate::RecordService) operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The habit does not exist, is inactive, or belongs to another user.
    #[error("habit not found: {habit_id}")]
    NotFound {
        /// The habit that was looked up.
        habit_id: String,
    },

    /// The request was rejected before anything was written.
    #[error("bad request: {0}")]
    BadRequest(#[from] ValidationError),

    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Convenience alias used throughout the service crate.
pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    pub(crate) fn not_found(habit_id: impl Into<String>) -> Self {
        Self::NotFound {
            habit_id: habit_id.into(),
        }
    }

    /// Returns `true` if this is a [`ServiceError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a [`ServiceError::BadRequest`].
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }
}
