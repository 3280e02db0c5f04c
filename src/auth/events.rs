//! Session lifecycle notifications.
//!
//! The client never navigates. UI layers subscribe with
//! [`AuthenticatedClient::subscribe`](crate::AuthenticatedClient::subscribe)
//! and react, typically by sending the user to the sign-in page on
//! [`SessionEvent::Invalidated`].

use tokio::sync::broadcast;

use crate::auth::{RefreshError, Role};

/// Number of events buffered per subscriber before the oldest are dropped.
pub const EVENT_CAPACITY: usize = 16;

/// A change to the stored session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login stored a new session.
    LoggedIn {
        /// The role returned by the backend.
        role: Option<Role>,
    },
    /// A refresh episode stored a new access token.
    Refreshed {
        /// The role stored with the new token, if any.
        role: Option<Role>,
    },
    /// A refresh episode failed and the session was cleared.
    Invalidated {
        /// Why the refresh failed.
        reason: RefreshError,
    },
    /// The session was cleared by an explicit logout.
    LoggedOut,
}

impl SessionEvent {
    /// Returns `true` if the user has to sign in again after this event.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Invalidated { .. } | Self::LoggedOut)
    }
}

/// Creates the broadcast channel that carries session events.
#[must_use]
pub fn channel() -> broadcast::Sender<SessionEvent> {
    broadcast::channel(EVENT_CAPACITY).0
}

/// Sends `event`, ignoring the absence of subscribers.
pub(crate) fn emit(sender: &broadcast::Sender<SessionEvent>, event: SessionEvent) {
    if sender.send(event).is_err() {
        tracing::trace!("No session event subscribers");
    }
}
