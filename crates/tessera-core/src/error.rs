//! Unified error type for directory operations
//!
//! A single error enum covers the whole engine. Fan-out branches inside the
//! resolvers return `DirectoryResult` so a backing-store failure stays
//! distinguishable from a token that legitimately does not exist; the
//! resolution entry points log and drop failed branches rather than
//! propagating them.

use serde::{Deserialize, Serialize};

/// Unified error type for all directory operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum DirectoryError {
    /// Backing document store I/O failed
    #[error("Store error: {message}")]
    Store {
        /// Description of the store failure
        message: String,
    },

    /// A required record was not found
    #[error("Not found: {message}")]
    NotFound {
        /// Description of what was not found
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Description of the invalid input
        message: String,
    },
}

impl DirectoryError {
    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Whether this error is the not-found variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;
