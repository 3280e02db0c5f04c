//! The authenticated client used by every page of the application.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::auth::events::{self, SessionEvent};
use crate::auth::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher, TokenStore};
use crate::clients::dispatcher::RequestDispatcher;
use crate::clients::errors::HttpError;
use crate::clients::http_request::{HttpMethod, HttpRequest};
use crate::clients::http_response::HttpResponse;
use crate::config::{ApiRoot, ClientConfig};

/// HTTP client with bearer authentication and transparent token refresh.
///
/// Every request carries the stored access token. When the API answers 401,
/// the client refreshes the token through its [`RefreshCoordinator`] (one
/// refresh call no matter how many requests fail together) and resends the
/// request exactly once. If the refresh fails, the session is cleared and
/// [`SessionEvent::Invalidated`] is broadcast to subscribers.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use parcel_api::{ApiRoot, AuthenticatedClient, ClientConfig, HttpMethod, JsonFileStorage, TokenStore};
///
/// let config = ClientConfig::builder()
///     .api_root(ApiRoot::new("https://deliveroo.example.com/api")?)
///     .build()?;
/// let store = Arc::new(TokenStore::new(JsonFileStorage::open("session.json")));
/// let client = AuthenticatedClient::new(&config, store)?;
///
/// let parcels = client.send(HttpMethod::Get, "parcels", None, None).await?;
/// ```
#[derive(Debug)]
pub struct AuthenticatedClient {
    dispatcher: RequestDispatcher,
    store: Arc<TokenStore>,
    coordinator: RefreshCoordinator,
    events: broadcast::Sender<SessionEvent>,
}

// Verify AuthenticatedClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AuthenticatedClient>();
};

impl AuthenticatedClient {
    /// Creates a client that refreshes tokens against the configured
    /// refresh endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Network`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, store: Arc<TokenStore>) -> Result<Self, HttpError> {
        let dispatcher = RequestDispatcher::new(config)?;
        let refresher = Arc::new(HttpTokenRefresher::new(
            dispatcher.http_client().clone(),
            config,
        ));
        Ok(Self::assemble(config, dispatcher, store, refresher))
    }

    /// Creates a client with a custom [`TokenRefresher`].
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Network`] if the HTTP client cannot be built.
    pub fn with_refresher(
        config: &ClientConfig,
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Result<Self, HttpError> {
        let dispatcher = RequestDispatcher::new(config)?;
        Ok(Self::assemble(config, dispatcher, store, refresher))
    }

    fn assemble(
        config: &ClientConfig,
        dispatcher: RequestDispatcher,
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        let events = events::channel();
        let coordinator =
            RefreshCoordinator::new(store.clone(), refresher, config, events.clone());
        Self {
            dispatcher,
            store,
            coordinator,
            events,
        }
    }

    /// Returns the API root.
    #[must_use]
    pub const fn api_root(&self) -> &ApiRoot {
        self.dispatcher.api_root()
    }

    /// Returns the token store shared with this client.
    #[must_use]
    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Returns the refresh coordinator owned by this client.
    #[must_use]
    pub const fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub(crate) const fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        events::emit(&self.events, event);
    }

    /// Subscribes to session events.
    ///
    /// The UI layer should send the user to the sign-in page when it
    /// receives [`SessionEvent::Invalidated`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Sends a request, refreshing the access token once on 401.
    ///
    /// # Errors
    ///
    /// - [`HttpError::InvalidRequest`] if the request fails validation
    /// - [`HttpError::Refresh`] if a 401 could not be recovered because the
    ///   refresh failed; the session has been cleared
    /// - [`HttpError::Response`] for any other status >= 400, including a
    ///   401 on the retried request
    /// - [`HttpError::Network`] if no response is received
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        request.verify()?;

        let token = self.store.get().access_token;
        match self.dispatcher.send(&request, token.as_ref()).await {
            Err(HttpError::Response(e)) if e.is_unauthorized() => {
                tracing::debug!(path = %request.path, "Access token rejected, refreshing");
            }
            other => return other,
        }

        // The retry below is final: its result is returned whatever it is.
        let fresh = self.coordinator.ensure_fresh_token().await?;
        self.dispatcher.send(&request, Some(&fresh)).await
    }

    /// Sends a request described by its parts.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
        headers: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, HttpError> {
        let mut builder = HttpRequest::builder(method, path);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(headers) = headers {
            builder = builder.extra_headers(headers);
        }
        self.request(builder.build()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::{MemoryStorage, REFRESH_TOKEN_KEY, TOKEN_KEY};
    use crate::auth::{AccessToken, RefreshError, RefreshResponse, RefreshToken};
    use crate::clients::InvalidHttpRequestError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Default)]
    struct StaticRefresher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenRefresher for StaticRefresher {
        async fn refresh(
            &self,
            refresh_token: &RefreshToken,
        ) -> Result<RefreshResponse, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(refresh_token.as_ref(), "R1");
            Ok(RefreshResponse {
                access_token: AccessToken::new("T2").unwrap(),
                refresh_token: None,
                role: None,
                expires_in: None,
            })
        }
    }

    fn client_for(server: &MockServer, refresher: Arc<StaticRefresher>) -> AuthenticatedClient {
        let config = ClientConfig::builder()
            .api_root(ApiRoot::new(format!("{}/api", server.uri())).unwrap())
            .build()
            .unwrap();
        let store = Arc::new(TokenStore::new(MemoryStorage::with_entries([
            (TOKEN_KEY, "T1"),
            (REFRESH_TOKEN_KEY, "R1"),
        ])));
        AuthenticatedClient::with_refresher(&config, store, refresher).unwrap()
    }

    #[tokio::test]
    async fn test_injected_refresher_is_used_on_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/customer/parcels"))
            .and(header("Authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "Token has expired"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/customer/parcels"))
            .and(header("Authorization", "Bearer T2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let refresher = Arc::new(StaticRefresher::default());
        let client = client_for(&server, refresher.clone());

        let response = client
            .send(HttpMethod::Get, "customer/parcels", None, None)
            .await
            .unwrap();

        assert_eq!(response.body, json!([]));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_sending() {
        let server = MockServer::start().await;
        let client = client_for(&server, Arc::new(StaticRefresher::default()));

        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer forged".to_string());
        let result = client
            .send(HttpMethod::Get, "parcels", None, Some(headers))
            .await;

        assert!(matches!(
            result,
            Err(HttpError::InvalidRequest(
                InvalidHttpRequestError::ReservedHeader { .. }
            ))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accessors() {
        let server = MockServer::start().await;
        let client = client_for(&server, Arc::new(StaticRefresher::default()));

        assert!(client.api_root().as_ref().ends_with("/api"));
        assert!(client.token_store().get().is_authenticated());
        assert!(!client.refresh_coordinator().is_refreshing());
    }
}
