//! The single source of truth for the current [`Session`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::auth::storage::{
    MemoryStorage, SessionStorage, REFRESH_TOKEN_KEY, ROLE_KEY, SESSION_KEYS, TOKEN_KEY, USER_KEY,
};
use crate::auth::{AccessToken, RefreshToken, Session, SessionUpdate};

/// In-memory session cache backed by durable [`SessionStorage`].
///
/// The first read loads the session from storage; every write goes to both
/// memory and storage, so reads always observe the latest write.
///
/// Each store carries a *generation* that changes whenever the session is
/// cleared or replaced wholesale. Work that started against one session
/// (such as a token refresh) uses it to avoid writing into the next one.
///
/// # Example
///
/// ```rust
/// use parcel_api::{AccessToken, SessionUpdate, TokenStore};
///
/// let store = TokenStore::in_memory();
/// store.set(SessionUpdate::access_token(AccessToken::new("T1").unwrap()));
/// assert_eq!(store.get().access_token.unwrap().as_ref(), "T1");
///
/// store.clear();
/// assert!(!store.get().is_authenticated());
/// ```
#[derive(Debug)]
pub struct TokenStore {
    storage: Arc<dyn SessionStorage>,
    cache: RwLock<Option<Session>>,
    generation: AtomicU64,
}

impl TokenStore {
    /// Creates a store over the given storage backend.
    #[must_use]
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self::with_storage(Arc::new(storage))
    }

    /// Creates a store over a shared storage backend.
    #[must_use]
    pub fn with_storage(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            cache: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Creates a store over fresh [`MemoryStorage`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Returns the current session.
    #[must_use]
    pub fn get(&self) -> Session {
        if let Some(session) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return session.clone();
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.get_or_insert_with(|| self.load()).clone()
    }

    /// Returns the current session generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Writes the fields present in `update` to memory and storage.
    pub fn set(&self, update: SessionUpdate) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        self.apply(&mut cache, update);
    }

    /// Like [`set`](Self::set), but only while the session is still at
    /// `generation`. Returns `false` if nothing was written.
    pub fn set_if_current(&self, generation: u64, update: SessionUpdate) -> bool {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation() != generation {
            return false;
        }
        self.apply(&mut cache, update);
        true
    }

    /// Replaces the whole session. Fields missing from `update` are removed.
    pub fn replace(&self, update: SessionUpdate) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        self.reset(&mut cache);
        self.apply(&mut cache, update);
    }

    /// Removes every session field from memory and storage.
    pub fn clear(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        self.reset(&mut cache);
    }

    /// Like [`clear`](Self::clear), but only while the session is still at
    /// `generation`. Returns `false` if nothing was removed.
    pub fn clear_if_current(&self, generation: u64) -> bool {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation() != generation {
            return false;
        }
        self.reset(&mut cache);
        true
    }

    fn reset(&self, cache: &mut Option<Session>) {
        for key in SESSION_KEYS {
            self.storage.remove(key);
        }
        *cache = Some(Session::default());
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn apply(&self, cache: &mut Option<Session>, update: SessionUpdate) {
        let session = cache.get_or_insert_with(|| self.load());

        if let Some(token) = update.access_token {
            self.storage.set(TOKEN_KEY, token.as_ref());
            session.access_token = Some(token);
        }
        if let Some(token) = update.refresh_token {
            self.storage.set(REFRESH_TOKEN_KEY, token.as_ref());
            session.refresh_token = Some(token);
        }
        if let Some(role) = update.role {
            self.storage.set(ROLE_KEY, role.as_str());
            session.role = Some(role);
        }
        if let Some(user) = update.user {
            match serde_json::to_string(&user) {
                Ok(json) => self.storage.set(USER_KEY, &json),
                Err(e) => tracing::warn!(error = %e, "Failed to encode user profile"),
            }
            session.user = Some(user);
        }
    }

    fn load(&self) -> Session {
        let role = self.storage.get(ROLE_KEY).and_then(|value| match value.parse() {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring stored role");
                None
            }
        });
        let user = self
            .storage
            .get(USER_KEY)
            .and_then(|value| match serde_json::from_str(&value) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring stored user profile");
                    None
                }
            });

        Session {
            access_token: self
                .storage
                .get(TOKEN_KEY)
                .and_then(|value| AccessToken::new(value).ok()),
            refresh_token: self
                .storage
                .get(REFRESH_TOKEN_KEY)
                .and_then(|value| RefreshToken::new(value).ok()),
            role,
            user,
        }
    }
}

// Verify TokenStore is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<TokenStore>();
};
