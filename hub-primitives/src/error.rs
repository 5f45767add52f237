//! Shared error definitions for toolhub primitives.

use thiserror::Error;

/// Result alias used throughout the primitives crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// Identifier failed validation.
    #[error("invalid identifier `{id}`: {reason}")]
    InvalidIdentifier {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Tool definition failed validation.
    #[error("invalid tool definition: {reason}")]
    InvalidTool {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Package manifest failed validation.
    #[error("invalid package manifest: {reason}")]
    InvalidManifest {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
