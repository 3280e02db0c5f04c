//! HTTP response types.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::clients::errors::HttpError;

/// An HTTP response from the parcel API.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub code: u16,
    /// Response headers, keyed by lower-case name (headers may repeat).
    pub headers: HashMap<String, Vec<String>>,
    /// The parsed response body; `{}` when the body is empty.
    pub body: serde_json::Value,
}

impl HttpResponse {
    /// Creates a new `HttpResponse`.
    #[must_use]
    pub const fn new(
        code: u16,
        headers: HashMap<String, Vec<String>>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            code,
            headers,
            body,
        }
    }

    /// Returns `true` if the status code is below 400.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code < 400
    }

    /// Returns the first value of the header `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Deserializes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Decode`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Extracts a human-readable error message from the body.
    ///
    /// The backend reports errors as `{"success": false, "msg": "..."}`;
    /// `message` and `error` fields are accepted as well.
    #[must_use]
    pub fn error_message(&self) -> String {
        ["msg", "message", "error"]
            .iter()
            .find_map(|key| self.body.get(key).and_then(serde_json::Value::as_str))
            .map_or_else(
                || match &self.body {
                    serde_json::Value::Object(map) if map.is_empty() => {
                        format!("Request failed with status {}", self.code)
                    }
                    other => other.to_string(),
                },
                String::from,
            )
    }
}
