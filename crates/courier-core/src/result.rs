//! Convenience result type alias for Courier.

use crate::error::AppError;

/// A specialized `Result` type for Courier operations.
pub type AppResult<T> = Result<T, AppError>;
