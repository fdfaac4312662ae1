//! In-memory identity provider.
//!
//! Holds registered accounts and at most one live session. Session events
//! are deduplicated: delivering the same event for the same session twice in
//! a row is suppressed, matching how provider SDK callbacks behave.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use lumina_auth::error::AuthError;
use lumina_auth::session::{Credentials, IdentityProvider, Session, SessionEvent};
use lumina_core::UserId;

/// A registered account.
#[derive(Debug, Clone)]
struct Account {
    user_id: UserId,
    password: String,
}

/// In-memory [`IdentityProvider`] implementation.
pub struct InMemoryIdentityProvider {
    accounts: DashMap<String, Account>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
    last_emitted: Mutex<Option<(String, String)>>,
    session_ttl: Duration,
}

impl InMemoryIdentityProvider {
    /// Creates a provider issuing sessions valid for one hour.
    #[must_use]
    pub fn new() -> Self {
        Self::with_session_ttl(Duration::from_secs(3600))
    }

    /// Creates a provider issuing sessions valid for `session_ttl`.
    #[must_use]
    pub fn with_session_ttl(session_ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: DashMap::new(),
            current: RwLock::new(None),
            events,
            last_emitted: Mutex::new(None),
            session_ttl,
        }
    }

    /// Registers an account and returns its user id.
    pub fn register(&self, email: impl Into<String>, password: impl Into<String>) -> UserId {
        let email = email.into();
        let user_id = UserId::generate();
        self.accounts.insert(
            email,
            Account {
                user_id,
                password: password.into(),
            },
        );
        user_id
    }

    /// Extends the current session and emits a refresh event, mimicking the
    /// provider's transparent token refresh.
    pub async fn refresh_session(&self) {
        let refreshed = {
            let mut current = self.current.write().await;
            let Some(session) = current.as_mut() else {
                return;
            };
            session.expires_at = OffsetDateTime::now_utc()
                + time::Duration::seconds(self.session_ttl.as_secs() as i64);
            session.access_token = Uuid::new_v4().to_string();
            session.clone()
        };
        self.emit(SessionEvent::TokenRefreshed(refreshed));
    }

    /// Emit an event unless it duplicates the previous one.
    fn emit(&self, event: SessionEvent) {
        let fingerprint = (
            event.kind().to_string(),
            event
                .session()
                .map(|s| s.access_token.clone())
                .unwrap_or_default(),
        );
        let mut last = self.last_emitted.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_ref() == Some(&fingerprint) {
            tracing::debug!(kind = event.kind(), "duplicate session event suppressed");
            return;
        }
        *last = Some(fingerprint);
        let _ = self.events.send(event);
    }

    fn issue_session(&self, user_id: UserId, email: &str) -> Session {
        let now = OffsetDateTime::now_utc();
        Session {
            user_id,
            email: email.to_string(),
            issued_at: now,
            expires_at: now + time::Duration::seconds(self.session_ttl.as_secs() as i64),
            access_token: Uuid::new_v4().to_string(),
        }
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let current = self.current.read().await;
        Ok(current.as_ref().filter(|s| s.is_valid()).cloned())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let account = self
            .accounts
            .get(&credentials.email)
            .ok_or(AuthError::InvalidCredentials)?;
        if account.password != credentials.password {
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.issue_session(account.user_id, &credentials.email);
        drop(account);

        *self.current.write().await = Some(session.clone());
        self.emit(SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let had_session = self.current.write().await.take().is_some();
        if had_session {
            self.emit(SessionEvent::SignedOut);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_with_valid_credentials() {
        let provider = InMemoryIdentityProvider::new();
        let user_id = provider.register("ana@clinic.example", "secret");

        let session = provider
            .sign_in(&Credentials::new("ana@clinic.example", "secret"))
            .await
            .unwrap();
        assert_eq!(session.user_id, user_id);
        assert!(session.is_valid());

        let current = provider.current_session().await.unwrap();
        assert_eq!(current, Some(session));
    }

    #[tokio::test]
    async fn test_sign_in_rejects_wrong_password() {
        let provider = InMemoryIdentityProvider::new();
        provider.register("ana@clinic.example", "secret");

        let err = provider
            .sign_in(&Credentials::new("ana@clinic.example", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_in_rejects_unknown_email() {
        let provider = InMemoryIdentityProvider::new();
        let err = provider
            .sign_in(&Credentials::new("nobody@clinic.example", "secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let provider = InMemoryIdentityProvider::new();
        provider.register("ana@clinic.example", "secret");
        provider
            .sign_in(&Credentials::new("ana@clinic.example", "secret"))
            .await
            .unwrap();

        provider.sign_out().await.unwrap();
        assert!(provider.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_not_returned() {
        let provider = InMemoryIdentityProvider::with_session_ttl(Duration::ZERO);
        provider.register("ana@clinic.example", "secret");
        provider
            .sign_in(&Credentials::new("ana@clinic.example", "secret"))
            .await
            .unwrap();

        assert!(provider.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_events_fire_on_lifecycle_changes() {
        let provider = InMemoryIdentityProvider::new();
        provider.register("ana@clinic.example", "secret");
        let mut events = provider.subscribe();

        provider
            .sign_in(&Credentials::new("ana@clinic.example", "secret"))
            .await
            .unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SignedIn(_)
        ));

        provider.refresh_session().await;
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::TokenRefreshed(_)
        ));

        provider.sign_out().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SignedOut
        ));
    }

    #[tokio::test]
    async fn test_duplicate_sign_out_emits_once() {
        let provider = InMemoryIdentityProvider::new();
        provider.register("ana@clinic.example", "secret");
        let mut events = provider.subscribe();

        provider
            .sign_in(&Credentials::new("ana@clinic.example", "secret"))
            .await
            .unwrap();
        provider.sign_out().await.unwrap();
        provider.sign_out().await.unwrap();
        provider.sign_out().await.unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SignedIn(_)
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SignedOut
        ));
        // No further events queued.
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
