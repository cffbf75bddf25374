//! Error types for queue construction.

use thiserror::Error;

/// Errors that can occur when creating a [`BoundedQueue`](crate::BoundedQueue).
///
/// Insert and extract rejections are not errors in this sense: a rejected
/// insert hands the item back and a rejected extract yields `None`, leaving
/// the queue untouched in both cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// A queue was requested with zero slots.
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,
}

/// A specialized `Result` type for queue operations.
pub type QueueResult<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            QueueError::ZeroCapacity.to_string(),
            "queue capacity must be at least 1"
        );
    }
}
