//! Error types for client configuration.
//!
//! All configuration constructors return `Result<T, ConfigError>` so invalid
//! values are rejected before any request is made.
//!
//! # Example
//!
//! ```rust
//! use parcel_api::{ApiRoot, ConfigError};
//!
//! let result = ApiRoot::new("");
//! assert!(matches!(result, Err(ConfigError::InvalidApiRoot { .. })));
//! ```

use thiserror::Error;

/// Errors that can occur while building a [`ClientConfig`](crate::ClientConfig)
/// or one of its validated values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The API root is not an absolute http(s) URL.
    #[error("Invalid API root '{url}'. Expected an absolute URL such as 'https://example.com/api'.")]
    InvalidApiRoot {
        /// The invalid URL that was provided.
        url: String,
    },

    /// A token value was empty.
    #[error("{kind} cannot be empty.")]
    EmptyToken {
        /// Which token was empty ("Access token" or "Refresh token").
        kind: &'static str,
    },

    /// The refresh path does not start with '/'.
    #[error("Invalid refresh path '{path}'. The path must start with '/'.")]
    InvalidRefreshPath {
        /// The invalid path that was provided.
        path: String,
    },

    /// The refresh timeout is zero.
    #[error("Refresh timeout must be greater than zero.")]
    ZeroRefreshTimeout,

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },
}
