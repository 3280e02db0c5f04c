//! Session state and token refresh.
//!
//! # Overview
//!
//! - [`Session`]: access token, refresh token and role of the signed-in user
//! - [`TokenStore`]: the single owner of the session, backed by [`SessionStorage`]
//! - [`RefreshCoordinator`]: single-flight refresh of expired access tokens
//! - [`SessionEvent`]: notifications for the UI layer (login, refresh, invalidation)
//!
//! # Example
//!
//! ```rust
//! use parcel_api::{MemoryStorage, Role, TokenStore};
//!
//! let storage = MemoryStorage::with_entries([
//!     ("token", "T1"),
//!     ("refreshToken", "R1"),
//!     ("role", "ADMIN"),
//! ]);
//! let store = TokenStore::new(storage);
//!
//! let session = store.get();
//! assert!(session.can_refresh());
//! assert_eq!(session.role, Some(Role::Admin));
//! ```

mod error;
pub mod events;
pub mod refresh;
mod role;
pub mod session;
pub mod storage;
mod token_store;
mod tokens;

pub use error::RefreshError;
pub use events::SessionEvent;
pub use refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};
pub use role::{Role, UnknownRoleError};
pub use session::{LoginResponse, RefreshResponse, Session, SessionUpdate};
pub use storage::{JsonFileStorage, MemoryStorage, SessionStorage};
pub use token_store::TokenStore;
pub use tokens::{AccessToken, RefreshToken, TokenClaims};
