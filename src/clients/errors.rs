//! HTTP-specific error types.
//!
//! - [`HttpResponseError`]: the API answered with status >= 400
//! - [`InvalidHttpRequestError`]: a request failed validation before sending
//! - [`HttpError`]: unified error type returned by the client
//!
//! # Example
//!
//! ```rust,ignore
//! use parcel_api::{HttpError, RefreshError};
//!
//! match client.request(request).await {
//!     Ok(response) => println!("Parcels: {}", response.body),
//!     Err(HttpError::Response(e)) => println!("API error {}: {}", e.code, e.message),
//!     Err(HttpError::Refresh(e)) => println!("Signed out: {e}"),
//!     Err(e) => println!("Request failed: {e}"),
//! }
//! ```

use thiserror::Error;

use crate::auth::RefreshError;

/// Error returned when the API answers with a status code of 400 or above.
///
/// `message` is taken from the `msg`, `message` or `error` field of the JSON
/// body when one is present. The full body is kept for callers that need the
/// rest of it.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("HTTP {code}: {message}")]
pub struct HttpResponseError {
    /// The HTTP status code of the response.
    pub code: u16,
    /// Human-readable error message.
    pub message: String,
    /// The parsed response body.
    pub body: serde_json::Value,
}

impl HttpResponseError {
    /// Returns `true` for 401 responses.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.code == 401
    }
}

/// Error returned when an HTTP request fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidHttpRequestError {
    /// The caller tried to set a header the client manages itself.
    #[error("The {name} header is managed by the client and cannot be set per request.")]
    ReservedHeader {
        /// The header that was provided.
        name: String,
    },

    /// A header name or value is not valid HTTP.
    #[error("Invalid header '{name}'.")]
    InvalidHeader {
        /// The header that was provided.
        name: String,
    },
}

/// Unified error type for all HTTP-related errors.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The API answered with status >= 400.
    #[error(transparent)]
    Response(#[from] HttpResponseError),

    /// Request validation failed.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidHttpRequestError),

    /// The access token expired and could not be refreshed. The session has
    /// been cleared unless the refresh was cancelled.
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// The response body did not have the expected shape.
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Network or connection error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl HttpError {
    /// Returns the HTTP status code, if the API answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Response(e) => Some(e.code),
            _ => None,
        }
    }

    /// Returns `true` if the user has to sign in again.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Refresh(e) if e.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_response_error_message() {
        let error = HttpResponseError {
            code: 404,
            message: "Parcel not found".to_string(),
            body: json!({"success": false, "msg": "Parcel not found"}),
        };
        assert_eq!(error.to_string(), "HTTP 404: Parcel not found");
        assert!(!error.is_unauthorized());
    }

    #[test]
    fn test_invalid_request_error_messages() {
        let error = InvalidHttpRequestError::ReservedHeader {
            name: "Authorization".to_string(),
        };
        assert!(error.to_string().contains("managed by the client"));

        let error = InvalidHttpRequestError::InvalidHeader {
            name: "bad header".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid header 'bad header'.");
    }

    #[test]
    fn test_status_and_sign_in_helpers() {
        let response = HttpError::Response(HttpResponseError {
            code: 401,
            message: "Token has expired".to_string(),
            body: json!({}),
        });
        assert_eq!(response.status(), Some(401));
        assert!(!response.requires_sign_in());

        let refresh = HttpError::Refresh(RefreshError::Unavailable);
        assert_eq!(refresh.status(), None);
        assert!(refresh.requires_sign_in());

        assert!(!HttpError::Refresh(RefreshError::Cancelled).requires_sign_in());
    }

    #[test]
    fn test_refresh_error_is_transparent() {
        let error: HttpError = RefreshError::Unavailable.into();
        assert_eq!(error.to_string(), RefreshError::Unavailable.to_string());
    }
}
