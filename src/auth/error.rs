//! Refresh failure types.

use std::time::Duration;

use thiserror::Error;

/// Why a refresh episode failed.
///
/// The same value is delivered to the caller that ran the episode and to
/// every caller queued behind it, so the type is `Clone`.
///
/// # Example
///
/// ```rust
/// use parcel_api::RefreshError;
///
/// let error = RefreshError::Failed {
///     status: 401,
///     message: "Token has expired".to_string(),
/// };
/// assert!(error.is_terminal());
/// assert_eq!(error.to_string(), "Token refresh failed with status 401: Token has expired");
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token was stored when the episode started.
    #[error("No refresh token available; the user must sign in again")]
    Unavailable,

    /// The refresh call failed. Network failures use status 0.
    #[error("Token refresh failed with status {status}: {message}")]
    Failed {
        /// The HTTP status code, or 0 if no response was received.
        status: u16,
        /// The error message from the response or transport.
        message: String,
    },

    /// The refresh call did not settle within the configured timeout.
    #[error("Token refresh timed out after {after:?}")]
    TimedOut {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The task running the refresh was dropped before it settled, or the
    /// session it started from was cleared or replaced in the meantime.
    #[error("Token refresh was cancelled before it completed")]
    Cancelled,
}

impl RefreshError {
    /// Returns `true` if the failure ended the session.
    ///
    /// Only [`Cancelled`](Self::Cancelled) leaves the stored session in place.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}
