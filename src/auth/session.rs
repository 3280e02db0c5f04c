//! The authenticated session and the backend payloads that create or update it.

use chrono::Utc;
use serde::Deserialize;

use crate::auth::{AccessToken, RefreshToken, Role};

/// The credentials currently held for the signed-in user.
///
/// Every field is optional: a default `Session` is a signed-out session.
/// Sessions are owned by the [`TokenStore`](crate::TokenStore); other
/// components only ever see snapshots.
///
/// # Example
///
/// ```rust
/// use parcel_api::{AccessToken, Session};
///
/// let session = Session {
///     access_token: Some(AccessToken::new("T1").unwrap()),
///     ..Session::default()
/// };
///
/// assert!(session.is_authenticated());
/// assert!(!session.can_refresh());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    /// The current access token.
    pub access_token: Option<AccessToken>,
    /// The refresh token used to obtain new access tokens.
    pub refresh_token: Option<RefreshToken>,
    /// The user's role.
    pub role: Option<Role>,
    /// The user profile returned at login.
    pub user: Option<serde_json::Value>,
}

impl Session {
    /// Returns `true` if an access token is present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Returns `true` if a refresh token is present.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Returns `true` if the access token carries an `exp` claim in the past.
    ///
    /// Opaque tokens and tokens without an expiry are never considered
    /// expired; the backend's 401 remains the authoritative signal.
    #[must_use]
    pub fn access_token_expired(&self) -> bool {
        self.access_token
            .as_ref()
            .and_then(AccessToken::claims)
            .and_then(|claims| claims.expires_at())
            .is_some_and(|expires_at| Utc::now() > expires_at)
    }
}

/// A partial update applied by [`TokenStore::set`](crate::TokenStore::set).
///
/// `None` fields leave the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    /// Replacement access token.
    pub access_token: Option<AccessToken>,
    /// Replacement refresh token.
    pub refresh_token: Option<RefreshToken>,
    /// Replacement role.
    pub role: Option<Role>,
    /// Replacement user profile.
    pub user: Option<serde_json::Value>,
}

impl SessionUpdate {
    /// An update that only replaces the access token.
    #[must_use]
    pub const fn access_token(token: AccessToken) -> Self {
        Self {
            access_token: Some(token),
            refresh_token: None,
            role: None,
            user: None,
        }
    }

    /// Returns `true` if the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.role.is_none()
            && self.user.is_none()
    }
}

/// Body returned by the refresh endpoint.
///
/// Only `access_token` is guaranteed. Backends that rotate refresh tokens also
/// send `refresh_token`; it replaces the stored one when present.
#[derive(Clone, Debug, Deserialize)]
pub struct RefreshResponse {
    /// The new access token.
    pub access_token: AccessToken,
    /// A rotated refresh token, if the backend issues one.
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,
    /// The user's role, if the backend includes it.
    #[serde(default)]
    pub role: Option<Role>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl RefreshResponse {
    /// Converts the response into a store update.
    ///
    /// When the body has no `role`, the role claim of the new access token is
    /// used instead.
    #[must_use]
    pub fn into_update(self) -> SessionUpdate {
        let role = self.role.or_else(|| {
            self.access_token
                .claims()
                .and_then(|claims| claims.role())
        });

        SessionUpdate {
            access_token: Some(self.access_token),
            refresh_token: self.refresh_token,
            role,
            user: None,
        }
    }
}

/// Body returned by the login endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    /// The issued access token.
    pub access_token: AccessToken,
    /// The issued refresh token.
    pub refresh_token: RefreshToken,
    /// The user's role.
    #[serde(default)]
    pub role: Option<Role>,
    /// The user profile, passed through untouched.
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

impl LoginResponse {
    /// Converts the response into the update that replaces the session.
    #[must_use]
    pub fn to_update(&self) -> SessionUpdate {
        SessionUpdate {
            access_token: Some(self.access_token.clone()),
            refresh_token: Some(self.refresh_token.clone()),
            role: self.role,
            user: self.user.clone(),
        }
    }
}

// Verify Session is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
};
