//! Single-attempt request dispatch.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};

use crate::auth::AccessToken;
use crate::clients::errors::{HttpError, HttpResponseError};
use crate::clients::http_request::HttpRequest;
use crate::clients::http_response::HttpResponse;
use crate::config::{ApiRoot, ClientConfig};

/// Client version from Cargo.toml.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sends one request with an optional bearer token. Never retries.
///
/// Responses with status >= 400 are returned as [`HttpError::Response`].
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    client: reqwest::Client,
    api_root: ApiRoot,
}

// Verify RequestDispatcher is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RequestDispatcher>();
};

impl RequestDispatcher {
    /// Creates a dispatcher for the configured API root.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Network`] if the underlying HTTP client cannot be
    /// built (e.g., TLS initialization failure).
    pub fn new(config: &ClientConfig) -> Result<Self, HttpError> {
        let user_agent = Self::user_agent(config);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .user_agent(user_agent)
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            client,
            api_root: config.api_root().clone(),
        })
    }

    /// Returns the API root.
    #[must_use]
    pub const fn api_root(&self) -> &ApiRoot {
        &self.api_root
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub const fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Builds the `User-Agent` header value.
    #[must_use]
    pub fn user_agent(config: &ClientConfig) -> String {
        let prefix = config
            .user_agent_prefix()
            .map_or(String::new(), |prefix| format!("{prefix} | "));
        format!("{prefix}Parcel API Client v{CLIENT_VERSION}")
    }

    /// Sends `request`, attaching `Authorization: Bearer <token>` when a
    /// token is given.
    ///
    /// # Errors
    ///
    /// - [`HttpError::InvalidRequest`] if the request fails validation
    /// - [`HttpError::Network`] if no response is received
    /// - [`HttpError::Response`] if the status is 400 or above
    pub async fn send(
        &self,
        request: &HttpRequest,
        token: Option<&AccessToken>,
    ) -> Result<HttpResponse, HttpError> {
        request.verify()?;

        let url = self.api_root.join(&request.path);
        let mut req_builder = self
            .client
            .request(request.http_method.as_reqwest(), &url);

        if let Some(token) = token {
            req_builder = req_builder.bearer_auth(token.as_ref());
        }
        if let Some(extra) = &request.extra_headers {
            for (key, value) in extra {
                req_builder = req_builder.header(key, value);
            }
        }
        if let Some(query) = &request.query {
            req_builder = req_builder.query(query);
        }
        if let Some(body) = &request.body {
            req_builder = req_builder.json(body);
        }

        let res = req_builder.send().await?;

        let code = res.status().as_u16();
        let headers = Self::parse_response_headers(res.headers());
        let body_text = res.text().await.unwrap_or_default();

        let body = if body_text.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&body_text)
                .unwrap_or_else(|_| serde_json::json!({ "raw_body": body_text }))
        };

        let response = HttpResponse::new(code, headers, body);
        tracing::debug!(
            method = %request.http_method,
            path = %request.path,
            status = code,
            authenticated = token.is_some(),
            "Request completed"
        );

        if response.is_ok() {
            return Ok(response);
        }

        Err(HttpError::Response(HttpResponseError {
            code,
            message: response.error_message(),
            body: response.body,
        }))
    }

    /// Parses response headers into a `HashMap`.
    fn parse_response_headers(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            let key = name.as_str().to_lowercase();
            let value = value.to_str().unwrap_or_default().to_string();
            result.entry(key).or_default().push(value);
        }
        result
    }
}
