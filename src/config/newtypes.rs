//! Validated newtype wrappers for configuration values.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer};
use std::fmt;

/// The validated root URL of the parcel API.
///
/// Every request path is joined onto this root, so trailing slashes are
/// stripped on construction. Only `http` and `https` schemes are accepted.
///
/// # Example
///
/// ```rust
/// use parcel_api::ApiRoot;
///
/// let root = ApiRoot::new("https://deliveroo.example.com/api/").unwrap();
/// assert_eq!(root.as_ref(), "https://deliveroo.example.com/api");
/// assert_eq!(root.join("/auth/refresh"), "https://deliveroo.example.com/api/auth/refresh");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRoot {
    url: String,
}

impl ApiRoot {
    /// Creates a new validated API root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidApiRoot`] if the URL has no http(s)
    /// scheme, no host, or carries a query or fragment.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let url = url.trim().trim_end_matches('/').to_string();
        let invalid = || ConfigError::InvalidApiRoot { url: url.clone() };

        let scheme_end = url.find("://").ok_or_else(invalid)?;
        let scheme = &url[..scheme_end];
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(invalid());
        }

        if url.contains(['?', '#']) {
            return Err(invalid());
        }

        let host_start = scheme_end + 3;
        let remainder = &url[host_start..];
        let host_end = remainder
            .find([':', '/'])
            .map_or(url.len(), |i| host_start + i);

        if host_start == host_end {
            return Err(invalid());
        }

        Ok(Self { url })
    }

    /// Joins a request path onto the root.
    ///
    /// Leading slashes on `path` are ignored so `"parcels"` and `"/parcels"`
    /// produce the same URL.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.url.clone()
        } else {
            format!("{}/{path}", self.url)
        }
    }
}

impl AsRef<str> for ApiRoot {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ApiRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl<'de> Deserialize<'de> for ApiRoot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_root_strips_trailing_slashes() {
        let root = ApiRoot::new("https://deliveroo.example.com/api//").unwrap();
        assert_eq!(root.as_ref(), "https://deliveroo.example.com/api");
    }

    #[test]
    fn test_api_root_accepts_host_with_port() {
        let root = ApiRoot::new("http://localhost:5000/api").unwrap();
        assert_eq!(root.join("parcels"), "http://localhost:5000/api/parcels");

        let root = ApiRoot::new("HTTPS://deliveroo.example.com").unwrap();
        assert_eq!(root.to_string(), "HTTPS://deliveroo.example.com");
    }

    #[test]
    fn test_api_root_rejects_invalid() {
        assert!(ApiRoot::new("").is_err());
        assert!(ApiRoot::new("deliveroo.example.com").is_err());
        assert!(ApiRoot::new("ftp://deliveroo.example.com").is_err());
        assert!(ApiRoot::new("https://").is_err());
        assert!(ApiRoot::new("https://:8080/api").is_err());
        assert!(ApiRoot::new("https://example.com/api?x=1").is_err());
    }

    #[test]
    fn test_join_normalizes_leading_slash() {
        let root = ApiRoot::new("https://example.com/api").unwrap();
        assert_eq!(root.join("parcels"), "https://example.com/api/parcels");
        assert_eq!(root.join("/parcels/7"), "https://example.com/api/parcels/7");
        assert_eq!(root.join(""), "https://example.com/api");
    }

    #[test]
    fn test_api_root_deserialization_validates() {
        let root: ApiRoot = serde_json::from_str(r#""https://example.com/api/""#).unwrap();
        assert_eq!(root.as_ref(), "https://example.com/api");

        let result: Result<ApiRoot, _> = serde_json::from_str(r#""not a url""#);
        assert!(result.is_err());
    }
}
