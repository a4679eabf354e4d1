use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::{
    AuthError, Credentials, IdentityProvider, Session, SessionData, SignupFields, TokenStorage,
};

/// Storage key the session is persisted under.
pub const SESSION_KEY: &str = "session";

/// Owns the current session.
///
/// Every mutation of the session goes through this store; everything else
/// reads snapshots via [`SessionStore::current_session`].
pub struct SessionStore<P> {
    provider: P,
    storage: Arc<dyn TokenStorage>,
    current: RwLock<Session>,
}

impl<P: IdentityProvider> SessionStore<P> {
    /// Create an anonymous store without looking at persisted state.
    pub fn new(provider: P, storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            provider,
            storage,
            current: RwLock::new(Session::anonymous()),
        }
    }

    /// Create a store, restoring a persisted session if one is still valid.
    ///
    /// Expired or unreadable persisted sessions are discarded.
    pub fn init(provider: P, storage: Arc<dyn TokenStorage>) -> Self {
        let store = Self::new(provider, storage);

        match store.load_persisted() {
            Ok(Some(data)) if !data.is_expired() => {
                debug!(user_id = %data.user_id, "Restored persisted session");
                *store.write() = Session::authenticated(data);
            }
            Ok(Some(data)) => {
                info!(user_id = %data.user_id, "Persisted session expired, discarding");
                store.forget_persisted();
            }
            Ok(None) => debug!("No persisted session"),
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session, discarding");
                store.forget_persisted();
            }
        }

        store
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn storage(&self) -> Arc<dyn TokenStorage> {
        Arc::clone(&self.storage)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let credentials = Credentials::new(email, password);
        let identity = self.provider.login(&credentials).await?;
        info!(user_id = %identity.user_id, "Login successful");
        Ok(self.establish(SessionData::from_identity(identity)))
    }

    pub async fn signup(&self, fields: &SignupFields) -> Result<Session, AuthError> {
        let identity = self.provider.signup(fields).await?;
        info!(user_id = %identity.user_id, "Signup successful");
        Ok(self.establish(SessionData::from_identity(identity)))
    }

    /// Clear the session and its persisted token. Safe to call repeatedly.
    pub fn logout(&self) {
        let mut current = self.write();
        let previous = std::mem::take(&mut *current);
        self.forget_persisted();
        drop(current);

        if let Some(data) = previous.data() {
            info!(user_id = %data.user_id, "Logged out");
        }
    }

    /// Snapshot of the current session; an expired session is destroyed here.
    pub fn current_session(&self) -> Session {
        let session = self.read().clone();
        if session.is_present() && !session.is_valid() {
            return self.expire();
        }
        session
    }

    /// Clear the current session if it is still expired once the write lock
    /// is held. A session established after the read snapshot survives.
    fn expire(&self) -> Session {
        let mut current = self.write();
        if current.is_present() && !current.is_valid() {
            if let Some(data) = current.data() {
                info!(user_id = %data.user_id, "Session expired");
            }
            *current = Session::anonymous();
            self.forget_persisted();
        }
        current.clone()
    }

    /// Drop in-memory state at application teardown. The persisted token
    /// stays so the next `init` can restore it.
    pub fn shutdown(&self) {
        *self.write() = Session::anonymous();
        debug!("Session store shut down");
    }

    /// Persist and publish a new session under one write lock, so an
    /// expiry or logout cannot interleave between the two.
    fn establish(&self, data: SessionData) -> Session {
        let mut current = self.write();
        if let Err(e) = self.persist(&data) {
            warn!(error = %e, "Failed to persist session");
        }
        let session = Session::authenticated(data);
        *current = session.clone();
        session
    }

    fn persist(&self, data: &SessionData) -> Result<()> {
        let contents = serde_json::to_string(data)?;
        self.storage.set(SESSION_KEY, &contents)
    }

    fn load_persisted(&self) -> Result<Option<SessionData>> {
        let Some(contents) = self.storage.get(SESSION_KEY)? else {
            return Ok(None);
        };
        let data = serde_json::from_str(&contents).context("Failed to parse persisted session")?;
        Ok(Some(data))
    }

    fn forget_persisted(&self) {
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            warn!(error = %e, "Failed to remove persisted session");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }
}


#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::testing::FakeProvider;
    use super::*;
    use crate::auth::{Identity, MemoryTokenStorage, UserId};

    fn store_with(provider: FakeProvider) -> (SessionStore<FakeProvider>, Arc<MemoryTokenStorage>) {
        let storage = Arc::new(MemoryTokenStorage::new());
        let store = SessionStore::new(provider, storage.clone());
        (store, storage)
    }

    #[tokio::test]
    async fn test_login_then_current_session_matches_account() {
        let (store, storage) = store_with(FakeProvider::new());

        let session = store.login("fan@example.com", "correct horse").await.unwrap();
        assert_eq!(session.user_id(), Some(&UserId::new("user:fan@example.com")));

        let current = store.current_session();
        assert_eq!(current, session);
        assert!(storage.get(SESSION_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_rejected_leaves_session_untouched() {
        let (store, storage) = store_with(FakeProvider::new());

        let err = store.login("fan@example.com", "wrong").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert!(!store.current_session().is_present());
        assert!(storage.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_network_failure_is_returned() {
        let mut provider = FakeProvider::new();
        provider.offline = true;
        let (store, _) = store_with(provider);

        let err = store.login("fan@example.com", "correct horse").await.unwrap_err();
        assert!(matches!(err, AuthError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_logout_always_yields_anonymous() {
        let (store, storage) = store_with(FakeProvider::new());

        store.logout();
        assert!(!store.current_session().is_present());

        store.login("fan@example.com", "correct horse").await.unwrap();
        store.logout();
        store.logout();
        assert!(!store.current_session().is_present());
        assert!(storage.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signup_establishes_session() {
        let (store, _) = store_with(FakeProvider::new());
        let fields = SignupFields {
            display_name: "New Fan".to_string(),
            email: "new@example.com".to_string(),
            password: "longenough".to_string(),
            confirm_password: "longenough".to_string(),
        };

        let session = store.signup(&fields).await.unwrap();
        assert_eq!(session.greeting_name(), Some("New Fan"));
        assert!(store.current_session().is_valid());
    }

    #[tokio::test]
    async fn test_init_restores_persisted_session() {
        let storage = Arc::new(MemoryTokenStorage::new());
        let first = SessionStore::new(FakeProvider::new(), storage.clone());
        let session = first.login("fan@example.com", "correct horse").await.unwrap();
        first.shutdown();
        assert!(!first.current_session().is_present());

        let restored = SessionStore::init(FakeProvider::new(), storage);
        assert_eq!(restored.current_session(), session);
    }

    #[tokio::test]
    async fn test_init_discards_expired_session() {
        let mut provider = FakeProvider::new();
        provider.expires_at = Some(Utc::now() - Duration::minutes(1));
        let storage = Arc::new(MemoryTokenStorage::new());
        let first = SessionStore::new(provider, storage.clone());
        first.login("fan@example.com", "correct horse").await.unwrap();

        let restored = SessionStore::init(FakeProvider::new(), storage.clone());
        assert!(!restored.current_session().is_present());
        assert!(storage.get(SESSION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_init_discards_corrupt_session() {
        let storage = Arc::new(MemoryTokenStorage::new());
        storage.set(SESSION_KEY, "{not json").unwrap();

        let store = SessionStore::init(FakeProvider::new(), storage.clone());
        assert!(!store.current_session().is_present());
        assert!(storage.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_current_session_destroys_expired_session() {
        let mut provider = FakeProvider::new();
        provider.expires_at = Some(Utc::now() - Duration::seconds(1));
        let (store, storage) = store_with(provider);

        store.login("fan@example.com", "correct horse").await.unwrap();
        assert!(!store.current_session().is_present());
        assert!(storage.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expiry_keeps_session_established_after_snapshot() {
        let mut provider = FakeProvider::new();
        provider.expires_at = Some(Utc::now() - Duration::seconds(1));
        let (store, storage) = store_with(provider);

        store.login("fan@example.com", "correct horse").await.unwrap();
        let stale = store.read().clone();
        assert!(stale.is_present() && !stale.is_valid());

        // A login lands between the reader's snapshot and its expiry step.
        let fresh = store.establish(SessionData::from_identity(Identity {
            user_id: UserId::new("user:other@example.com"),
            email: "other@example.com".to_string(),
            display_name: None,
            token: "fresh-token".to_string(),
            expires_at: None,
        }));

        assert_eq!(store.expire(), fresh);
        assert_eq!(store.current_session(), fresh);
        let persisted = storage.get(SESSION_KEY).unwrap().unwrap();
        assert!(persisted.contains("fresh-token"));
    }
}
