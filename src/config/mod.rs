//! Configuration for the parcel API client.
//!
//! - [`ClientConfig`]: all settings needed to talk to the API
//! - [`ClientConfigBuilder`]: builder for [`ClientConfig`]
//! - [`ApiRoot`]: the validated base URL every request path is joined onto
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use parcel_api::{ApiRoot, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .api_root(ApiRoot::new("https://deliveroo.example.com/api").unwrap())
//!     .refresh_timeout(Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.refresh_path(), "/auth/refresh");
//! ```

mod newtypes;

pub use newtypes::ApiRoot;

use std::time::Duration;

use crate::error::ConfigError;

/// Default path of the token refresh endpoint, relative to the API root.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Default upper bound on a single refresh call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the parcel API client.
///
/// `ClientConfig` is `Clone`, `Send`, and `Sync`.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    api_root: ApiRoot,
    refresh_path: String,
    refresh_timeout: Duration,
    user_agent_prefix: Option<String>,
}

impl ClientConfig {
    /// Creates a new builder for constructing a `ClientConfig`.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the API root.
    #[must_use]
    pub const fn api_root(&self) -> &ApiRoot {
        &self.api_root
    }

    /// Returns the refresh endpoint path.
    #[must_use]
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    /// Returns the full refresh endpoint URL.
    #[must_use]
    pub fn refresh_url(&self) -> String {
        self.api_root.join(&self.refresh_path)
    }

    /// Returns the upper bound on a single refresh call.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }
}

// Verify ClientConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ClientConfig>();
};

/// Builder for constructing [`ClientConfig`] instances.
///
/// Only `api_root` is required.
///
/// # Defaults
///
/// - `refresh_path`: [`DEFAULT_REFRESH_PATH`]
/// - `refresh_timeout`: [`DEFAULT_REFRESH_TIMEOUT`]
/// - `user_agent_prefix`: `None`
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    api_root: Option<ApiRoot>,
    refresh_path: Option<String>,
    refresh_timeout: Option<Duration>,
    user_agent_prefix: Option<String>,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API root (required).
    #[must_use]
    pub fn api_root(mut self, root: ApiRoot) -> Self {
        self.api_root = Some(root);
        self
    }

    /// Sets the refresh endpoint path, e.g. `/refresh` for backends that
    /// mount it outside `/auth`.
    #[must_use]
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Sets the upper bound on a single refresh call.
    #[must_use]
    pub const fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Sets the user agent prefix for HTTP requests.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Builds the [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingRequiredField`] if `api_root` is not set
    /// - [`ConfigError::InvalidRefreshPath`] if the refresh path does not start with '/'
    /// - [`ConfigError::ZeroRefreshTimeout`] if the refresh timeout is zero
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let api_root = self
            .api_root
            .ok_or(ConfigError::MissingRequiredField { field: "api_root" })?;

        let refresh_path = self
            .refresh_path
            .unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string());
        if !refresh_path.starts_with('/') {
            return Err(ConfigError::InvalidRefreshPath { path: refresh_path });
        }

        let refresh_timeout = self.refresh_timeout.unwrap_or(DEFAULT_REFRESH_TIMEOUT);
        if refresh_timeout.is_zero() {
            return Err(ConfigError::ZeroRefreshTimeout);
        }

        Ok(ClientConfig {
            api_root,
            refresh_path,
            refresh_timeout,
            user_agent_prefix: self.user_agent_prefix,
        })
    }
}
