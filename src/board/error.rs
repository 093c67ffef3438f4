// Error kinds surfaced by the message store

use std::path::PathBuf;
use thiserror::Error;

/// Rejected input. These are caller mistakes, reported as 4xx at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Message cannot be empty")]
    Empty,

    #[error("Message must be ≤{max} characters. Yours: {length}")]
    TooLong { length: usize, max: usize },

    #[error("limit must be non-negative, got {0}")]
    NegativeLimit(i64),

    #[error("offset must be non-negative, got {0}")]
    NegativeOffset(i64),

    #[error("sort must be 'asc' or 'desc', got '{0}'")]
    UnknownSort(String),
}

/// Failure to read or write the durable snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode message table: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Corrupt message table in {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Every way a store operation can fail.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Message not found: {0}")]
    NotFound(String),

    #[error("Invalid admin key")]
    Forbidden,

    #[error("No unused message id after {attempts} attempts")]
    IdsExhausted { attempts: usize },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl StoreError {
    /// True for conditions caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            StoreError::Persistence(_) | StoreError::IdsExhausted { .. }
        )
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_long_message_carries_length() {
        let err = ValidationError::TooLong { length: 141, max: 140 };
        assert_eq!(err.to_string(), "Message must be ≤140 characters. Yours: 141");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(StoreError::Forbidden.is_client_error());
        assert!(StoreError::NotFound("abc".to_string()).is_client_error());
        assert!(StoreError::from(ValidationError::Empty).is_client_error());

        let io = PersistenceError::Io {
            path: PathBuf::from("/nowhere"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(!StoreError::from(io).is_client_error());
        assert!(!StoreError::IdsExhausted { attempts: 16 }.is_client_error());
    }
}
