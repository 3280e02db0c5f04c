//! Single-flight access token refresh.
//!
//! A *refresh episode* starts when a caller finds no refresh in flight and
//! ends when the refresh call settles. During an episode:
//!
//! - exactly one refresh call is made, however many callers ask for a token;
//! - callers that arrive while it is running are queued and settled, in
//!   arrival order, with the episode's outcome;
//! - on failure the [`TokenStore`] is cleared and
//!   [`SessionEvent::Invalidated`] is emitted once;
//! - if the session is cleared or replaced (logout, login) while the refresh
//!   call is in flight, its outcome is discarded and every caller receives
//!   [`RefreshError::Cancelled`].
//!
//! Between episodes the queue is empty and no refresh is marked in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use parcel_api::{HttpTokenRefresher, RefreshCoordinator, TokenStore};
//!
//! let store = Arc::new(TokenStore::in_memory());
//! let refresher = Arc::new(HttpTokenRefresher::new(reqwest::Client::new(), &config));
//! let coordinator = RefreshCoordinator::new(store, refresher, &config, events);
//!
//! let token = coordinator.ensure_fresh_token().await?;
//! ```

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, oneshot};

use crate::auth::events::{self, SessionEvent};
use crate::auth::{AccessToken, RefreshError, RefreshResponse, RefreshToken, TokenStore};
use crate::config::ClientConfig;

/// Issues the refresh call itself.
///
/// Implemented by [`HttpTokenRefresher`] for the real backend; tests inject
/// their own implementations.
#[async_trait]
pub trait TokenRefresher: Send + Sync + fmt::Debug {
    /// Exchanges `refresh_token` for a new access token.
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<RefreshResponse, RefreshError>;
}

/// Refreshes tokens against the backend's refresh endpoint.
///
/// Sends `POST <api-root><refresh_path>` with an empty JSON body and the
/// refresh token as bearer credential.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenRefresher {
    /// Creates a refresher that reuses `client` for its calls.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            url: config.refresh_url(),
        }
    }

    /// Returns the refresh endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<RefreshResponse, RefreshError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(refresh_token.as_ref())
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| RefreshError::Failed {
                status: 0,
                message: format!("Network error: {e}"),
            })?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(RefreshError::Failed {
                status,
                message: error_body,
            });
        }

        response
            .json::<RefreshResponse>()
            .await
            .map_err(|e| RefreshError::Failed {
                status,
                message: format!("Failed to parse refresh response: {e}"),
            })
    }
}

type Waiter = oneshot::Sender<Result<AccessToken, RefreshError>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: Vec<Waiter>,
}

/// Guarantees at most one outstanding refresh call per coordinator.
pub struct RefreshCoordinator {
    store: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    timeout: Duration,
    events: broadcast::Sender<SessionEvent>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    /// Creates a coordinator over `store`, refreshing through `refresher`.
    #[must_use]
    pub fn new(
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        config: &ClientConfig,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self::with_timeout(store, refresher, config.refresh_timeout(), events)
    }

    /// Creates a coordinator with an explicit refresh timeout.
    #[must_use]
    pub fn with_timeout(
        store: Arc<TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        timeout: Duration,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            store,
            refresher,
            timeout,
            events,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Returns `true` while a refresh episode is running.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock_state().refreshing
    }

    /// Returns the number of callers queued behind the running episode.
    #[must_use]
    pub fn pending_callers(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Returns a fresh access token, refreshing at most once per episode.
    ///
    /// If an episode is already running, the caller waits for its outcome
    /// instead of issuing another refresh call.
    ///
    /// # Errors
    ///
    /// - [`RefreshError::Unavailable`] if no refresh token is stored
    /// - [`RefreshError::Failed`] if the refresh call fails
    /// - [`RefreshError::TimedOut`] if the refresh call exceeds the timeout
    /// - [`RefreshError::Cancelled`] if the task running the episode was dropped,
    ///   or the session was cleared or replaced while the refresh was in flight
    pub async fn ensure_fresh_token(&self) -> Result<AccessToken, RefreshError> {
        let waiter = {
            let mut state = self.lock_state();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.queue.push(tx);
                tracing::debug!(
                    pending = state.queue.len(),
                    "Refresh in flight, queueing caller"
                );
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or(Err(RefreshError::Cancelled));
        }

        let episode = Episode {
            coordinator: self,
            settled: false,
        };
        let outcome = self.refresh().await;
        episode.settle(outcome)
    }

    async fn refresh(&self) -> Result<AccessToken, RefreshError> {
        let generation = self.store.generation();
        let Some(refresh_token) = self.store.get().refresh_token else {
            tracing::warn!("No refresh token stored, ending session");
            return Err(self.invalidate(generation, RefreshError::Unavailable));
        };

        tracing::debug!("Refreshing access token");
        let result = tokio::time::timeout(self.timeout, self.refresher.refresh(&refresh_token))
            .await
            .unwrap_or(Err(RefreshError::TimedOut {
                after: self.timeout,
            }));

        match result {
            Ok(response) => {
                let access_token = response.access_token.clone();
                let update = response.into_update();
                let role = update.role;
                if !self.store.set_if_current(generation, update) {
                    tracing::info!("Session replaced during refresh, discarding new token");
                    return Err(RefreshError::Cancelled);
                }
                tracing::info!(?role, "Access token refreshed");
                events::emit(&self.events, SessionEvent::Refreshed { role });
                Ok(access_token)
            }
            Err(error) => {
                tracing::warn!(%error, "Token refresh failed, ending session");
                Err(self.invalidate(generation, error))
            }
        }
    }

    /// Clears the session the episode started from and returns the error the
    /// episode settles with.
    fn invalidate(&self, generation: u64, reason: RefreshError) -> RefreshError {
        if !self.store.clear_if_current(generation) {
            tracing::info!("Session replaced during refresh, leaving it in place");
            return RefreshError::Cancelled;
        }
        events::emit(
            &self.events,
            SessionEvent::Invalidated {
                reason: reason.clone(),
            },
        );
        reason
    }

    /// Ends the running episode and settles every queued caller with `outcome`.
    fn finish(&self, outcome: &Result<AccessToken, RefreshError>) {
        let queue = {
            let mut state = self.lock_state();
            state.refreshing = false;
            mem::take(&mut state.queue)
        };

        for waiter in queue {
            // A waiter whose caller was dropped has nobody left to notify.
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("RefreshCoordinator")
            .field("refresher", &self.refresher)
            .field("timeout", &self.timeout)
            .field("refreshing", &state.refreshing)
            .field("pending_callers", &state.queue.len())
            .finish_non_exhaustive()
    }
}

/// Ends an episode exactly once, even if the leading task is dropped mid-refresh.
struct Episode<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl Episode<'_> {
    fn settle(
        mut self,
        outcome: Result<AccessToken, RefreshError>,
    ) -> Result<AccessToken, RefreshError> {
        self.settled = true;
        self.coordinator.finish(&outcome);
        outcome
    }
}

impl Drop for Episode<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Refresh episode dropped before completion");
            self.coordinator.finish(&Err(RefreshError::Cancelled));
        }
    }
}

// Verify RefreshCoordinator is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RefreshCoordinator>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::{MemoryStorage, REFRESH_TOKEN_KEY, TOKEN_KEY};
    use crate::auth::{Role, Session, SessionUpdate};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Refresher that blocks on a gate and counts its calls.
    #[derive(Debug)]
    struct GatedRefresher {
        calls: AtomicUsize,
        gate: Semaphore,
        outcome: Result<&'static str, RefreshError>,
    }

    impl GatedRefresher {
        fn new(outcome: Result<&'static str, RefreshError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Semaphore::new(0),
                outcome,
            })
        }

        fn open(&self) {
            self.gate.add_permits(Semaphore::MAX_PERMITS);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for GatedRefresher {
        async fn refresh(
            &self,
            _refresh_token: &RefreshToken,
        ) -> Result<RefreshResponse, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _permit = self.gate.acquire().await.unwrap();
            self.outcome.clone().map(|token| RefreshResponse {
                access_token: AccessToken::new(token).unwrap(),
                refresh_token: None,
                role: Some(Role::Customer),
                expires_in: None,
            })
        }
    }

    fn signed_in_store() -> Arc<TokenStore> {
        Arc::new(TokenStore::new(MemoryStorage::with_entries([
            (TOKEN_KEY, "T1"),
            (REFRESH_TOKEN_KEY, "R1"),
        ])))
    }

    fn coordinator(
        store: Arc<TokenStore>,
        refresher: Arc<GatedRefresher>,
    ) -> (Arc<RefreshCoordinator>, broadcast::Receiver<SessionEvent>) {
        let events = events::channel();
        let receiver = events.subscribe();
        let coordinator =
            RefreshCoordinator::with_timeout(store, refresher, Duration::from_secs(5), events);
        (Arc::new(coordinator), receiver)
    }

    async fn wait_for_pending(coordinator: &RefreshCoordinator, pending: usize) {
        while coordinator.pending_callers() < pending {
            tokio::task::yield_now().await;
        }
    }

    fn spawn_callers(
        coordinator: &Arc<RefreshCoordinator>,
        count: usize,
    ) -> Vec<tokio::task::JoinHandle<Result<AccessToken, RefreshError>>> {
        (0..count)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.ensure_fresh_token().await })
            })
            .collect()
    }

    #[tokio::test]
    async fn test_single_refresh_call_for_concurrent_callers() {
        let refresher = GatedRefresher::new(Ok("T2"));
        let store = signed_in_store();
        let (coordinator, _events) = coordinator(store.clone(), refresher.clone());

        let handles = spawn_callers(&coordinator, 5);
        wait_for_pending(&coordinator, 4).await;
        assert!(coordinator.is_refreshing());
        refresher.open();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().as_ref(), "T2");
        }
        assert_eq!(refresher.calls(), 1);
        assert_eq!(store.get().access_token.unwrap().as_ref(), "T2");
        assert_eq!(store.get().role, Some(Role::Customer));
    }

    #[tokio::test]
    async fn test_failure_fans_out_identical_error_and_clears_store() {
        let failure = RefreshError::Failed {
            status: 401,
            message: "Token has expired".to_string(),
        };
        let refresher = GatedRefresher::new(Err(failure.clone()));
        let store = signed_in_store();
        let (coordinator, mut events) = coordinator(store.clone(), refresher.clone());

        let handles = spawn_callers(&coordinator, 3);
        wait_for_pending(&coordinator, 2).await;
        refresher.open();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err(), failure);
        }
        assert_eq!(refresher.calls(), 1);
        assert!(!store.get().is_authenticated());
        assert!(!store.get().can_refresh());
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Invalidated { reason: failure }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_state_is_reset_between_episodes() {
        let refresher = GatedRefresher::new(Ok("T2"));
        refresher.open();
        let (coordinator, _events) = coordinator(signed_in_store(), refresher.clone());

        coordinator.ensure_fresh_token().await.unwrap();
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.pending_callers(), 0);

        coordinator.ensure_fresh_token().await.unwrap();
        assert_eq!(refresher.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_calling_refresher() {
        let refresher = GatedRefresher::new(Ok("T2"));
        let store = Arc::new(TokenStore::new(MemoryStorage::with_entries([(
            TOKEN_KEY, "T1",
        )])));
        let (coordinator, mut events) = coordinator(store.clone(), refresher.clone());

        let result = coordinator.ensure_fresh_token().await;

        assert_eq!(result.unwrap_err(), RefreshError::Unavailable);
        assert_eq!(refresher.calls(), 0);
        assert!(!store.get().is_authenticated());
        assert!(!coordinator.is_refreshing());
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Invalidated {
                reason: RefreshError::Unavailable
            }
        ));
    }

    #[tokio::test]
    async fn test_timeout_ends_episode() {
        let refresher = GatedRefresher::new(Ok("T2"));
        let store = signed_in_store();
        let events = events::channel();
        let coordinator = RefreshCoordinator::with_timeout(
            store.clone(),
            refresher.clone(),
            Duration::from_millis(20),
            events,
        );

        let result = coordinator.ensure_fresh_token().await;

        assert_eq!(
            result.unwrap_err(),
            RefreshError::TimedOut {
                after: Duration::from_millis(20)
            }
        );
        assert!(!store.get().is_authenticated());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_dropped_leader_cancels_queued_callers() {
        let refresher = GatedRefresher::new(Ok("T2"));
        let store = signed_in_store();
        let (coordinator, _events) = coordinator(store.clone(), refresher.clone());

        let leader = spawn_callers(&coordinator, 1).remove(0);
        while refresher.calls() == 0 {
            tokio::task::yield_now().await;
        }
        let follower = spawn_callers(&coordinator, 1).remove(0);
        wait_for_pending(&coordinator, 1).await;

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        assert_eq!(follower.await.unwrap().unwrap_err(), RefreshError::Cancelled);
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.pending_callers(), 0);
        // Cancellation is not a refresh failure: the session stays.
        assert!(store.get().can_refresh());
    }

    async fn park_leader(
        coordinator: &Arc<RefreshCoordinator>,
        refresher: &GatedRefresher,
    ) -> Vec<tokio::task::JoinHandle<Result<AccessToken, RefreshError>>> {
        let mut handles = spawn_callers(coordinator, 1);
        while refresher.calls() == 0 {
            tokio::task::yield_now().await;
        }
        handles.extend(spawn_callers(coordinator, 1));
        wait_for_pending(coordinator, 1).await;
        handles
    }

    #[tokio::test]
    async fn test_logout_during_refresh_discards_new_token() {
        let refresher = GatedRefresher::new(Ok("T2"));
        let store = signed_in_store();
        let (coordinator, mut events) = coordinator(store.clone(), refresher.clone());

        let handles = park_leader(&coordinator, &refresher).await;
        store.clear();
        refresher.open();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err(), RefreshError::Cancelled);
        }
        assert_eq!(store.get(), Session::default());
        assert!(!coordinator.is_refreshing());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_newer_login_in_place() {
        let refresher = GatedRefresher::new(Err(RefreshError::Failed {
            status: 401,
            message: "Token has expired".to_string(),
        }));
        let store = signed_in_store();
        let (coordinator, mut events) = coordinator(store.clone(), refresher.clone());

        let handles = park_leader(&coordinator, &refresher).await;
        store.replace(SessionUpdate {
            access_token: Some(AccessToken::new("T9").unwrap()),
            refresh_token: Some(RefreshToken::new("R9").unwrap()),
            role: Some(Role::Admin),
            user: None,
        });
        refresher.open();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap_err(), RefreshError::Cancelled);
        }
        let session = store.get();
        assert_eq!(session.access_token.unwrap().as_ref(), "T9");
        assert_eq!(session.refresh_token.unwrap().as_ref(), "R9");
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_http_refresher_targets_configured_endpoint() {
        let config = ClientConfig::builder()
            .api_root(crate::ApiRoot::new("https://example.com/api").unwrap())
            .refresh_path("/refresh")
            .build()
            .unwrap();

        let refresher = HttpTokenRefresher::new(reqwest::Client::new(), &config);
        assert_eq!(refresher.url(), "https://example.com/api/refresh");
    }
}
