use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or failed mid-request; retrying may help.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What was being attempted.
        message: String,
        /// Backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A conditional write lost against a concurrent writer.
    #[error("game `{code}` was modified concurrently")]
    Conflict {
        /// Game code.
        code: String,
    },
    /// No document is stored under the code.
    #[error("game `{code}` does not exist")]
    NotFound {
        /// Game code.
        code: String,
    },
    /// A document already uses the code.
    #[error("game `{code}` already exists")]
    AlreadyExists {
        /// Game code.
        code: String,
    },
    /// The stored document does not decode into a game.
    #[error("game `{code}` is corrupt: {message}")]
    Corrupt {
        /// Game code.
        code: String,
        /// Decoder message.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a corruption error for `code`.
    pub fn corrupt(code: impl Into<String>, message: impl ToString) -> Self {
        StorageError::Corrupt {
            code: code.into(),
            message: message.to_string(),
        }
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable { .. } | StorageError::Conflict { .. }
        )
    }
}
