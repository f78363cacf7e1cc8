//! # Error Types
//!
//! Errors raised while constructing core primitives. Higher crates wrap
//! these in their own `thiserror` enums; the API layer maps every one of
//! them to a 4xx response.

use thiserror::Error;

/// Errors raised by `signsecure-core` constructors and parsers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A reference string was not a valid UUID.
    #[error("invalid {kind} reference {value:?}: {reason}")]
    InvalidReference {
        /// Which reference namespace was being parsed (e.g. "document").
        kind: &'static str,
        /// The rejected input.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// An email address failed validation.
    #[error("invalid email address {value:?}: {reason}")]
    InvalidEmail {
        /// The rejected input.
        value: String,
        /// Which rule was violated.
        reason: &'static str,
    },

    /// A timestamp could not be parsed or is out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
