//! # Parcel API Client
//!
//! An authenticated HTTP client for the parcel delivery API, with
//! transparent, single-flight refresh of expired access tokens.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`ClientConfig`] and [`ClientConfigBuilder`]
//! - A [`TokenStore`] that owns the session (access token, refresh token, role)
//!   and persists it through a pluggable [`SessionStorage`]
//! - An [`AuthenticatedClient`] that attaches the bearer token to every
//!   request and recovers from a 401 by refreshing once and retrying once
//! - A [`RefreshCoordinator`] that guarantees one refresh call however many
//!   requests fail at the same time
//! - [`SessionEvent`] notifications so the UI layer can redirect to sign-in
//!
//! ## Quick Start
//!
//! ```rust
//! use parcel_api::{ApiRoot, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .api_root(ApiRoot::new("https://deliveroo.example.com/api").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.refresh_url(), "https://deliveroo.example.com/api/auth/refresh");
//! ```
//!
//! ## Making Requests
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use parcel_api::{AuthenticatedClient, HttpMethod, JsonFileStorage, SessionEvent, TokenStore};
//! use serde_json::json;
//!
//! let store = Arc::new(TokenStore::new(JsonFileStorage::open("session.json")));
//! let client = AuthenticatedClient::new(&config, store)?;
//!
//! let mut events = client.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if event.requires_sign_in() {
//!             // show the sign-in page
//!         }
//!     }
//! });
//!
//! let created = client
//!     .send(HttpMethod::Post, "parcels", Some(json!({"destination": "Kisumu"})), None)
//!     .await?;
//! ```
//!
//! ## Signing In
//!
//! ```rust,ignore
//! use parcel_api::LoginRequest;
//!
//! let login = client.login(&LoginRequest::new("jane@example.com", "hunter2")).await?;
//! println!("Signed in as {:?}", login.role);
//!
//! client.logout();
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: every client owns its store, coordinator and events
//! - **Fail-fast validation**: all newtypes validate on construction
//! - **Thread-safe**: all public types are `Send + Sync`
//! - **Async-first**: designed for the Tokio runtime
//! - **No navigation**: session loss is reported, never acted upon

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;

// Re-export public types at crate root for convenience
pub use auth::{
    AccessToken, HttpTokenRefresher, JsonFileStorage, LoginResponse, MemoryStorage,
    RefreshCoordinator, RefreshError, RefreshResponse, RefreshToken, Role, Session, SessionEvent,
    SessionStorage, SessionUpdate, TokenClaims, TokenRefresher, TokenStore, UnknownRoleError,
};
pub use config::{ApiRoot, ClientConfig, ClientConfigBuilder};
pub use error::ConfigError;

// Re-export HTTP client types
pub use clients::{
    AuthenticatedClient, HttpError, HttpMethod, HttpRequest, HttpRequestBuilder, HttpResponse,
    HttpResponseError, InvalidHttpRequestError, LoginRequest, RequestDispatcher, SignupRequest,
    CLIENT_VERSION,
};
