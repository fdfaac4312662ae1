//! Identity provider adapter.
//!
//! Wraps the external identity provider's session primitives behind the
//! [`IdentityProvider`] trait: sign-in, sign-out, current-session lookup and
//! a session-change subscription. The adapter owns the session; everything
//! downstream treats it as read-only input.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;

use lumina_core::UserId;

use crate::error::AuthError;

// =============================================================================
// Session
// =============================================================================

/// Provider-issued proof of authentication.
///
/// Created on sign-in, refreshed transparently by the provider (surfaced as
/// a [`SessionEvent::TokenRefreshed`]), destroyed on sign-out or expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Subject identifier. Equals the profile's primary key.
    pub user_id: UserId,

    /// Email the subject authenticated with.
    pub email: String,

    /// When the session was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When the session stops being valid.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Opaque provider token. Never inspected by this subsystem.
    pub access_token: String,
}

impl Session {
    /// Returns `true` if the session has passed its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }

    /// Returns `true` if the session is still usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired()
    }

    /// The session subject.
    #[must_use]
    pub fn subject(&self) -> UserId {
        self.user_id
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Email/password credentials for password sign-in.
#[derive(Clone)]
pub struct Credentials {
    /// Account email.
    pub email: String,

    /// Plaintext password, handed to the provider and nowhere else.
    pub password: String,
}

impl Credentials {
    /// Creates credentials for the given email and password.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Manual impl so the password never lands in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Session Events
// =============================================================================

/// Session lifecycle notifications emitted by the provider adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was established.
    SignedIn(Session),

    /// The provider transparently refreshed the session token.
    TokenRefreshed(Session),

    /// The session ended (explicit sign-out or expiry).
    SignedOut,
}

impl SessionEvent {
    /// Short event name for structured logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "signed_in",
            Self::TokenRefreshed(_) => "token_refreshed",
            Self::SignedOut => "signed_out",
        }
    }

    /// The session carried by the event, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) | Self::TokenRefreshed(session) => Some(session),
            Self::SignedOut => None,
        }
    }
}

// =============================================================================
// Identity Provider Trait
// =============================================================================

/// Adapter over the external identity provider.
///
/// Implementations hold no session state beyond what is needed to dedupe
/// subscription callbacks: delivering the same event for the same session
/// twice in a row is the implementation's job to suppress.
///
/// Expected conditions are values, not errors: an absent session is
/// `Ok(None)`, and sign-in rejections are [`AuthError::InvalidCredentials`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch the current session from the provider.
    ///
    /// Returns `Ok(None)` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for rejected credentials
    /// and [`AuthError::ProviderUnreachable`] for transport failures.
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Destroy the current session.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Subscribe to session lifecycle events.
    ///
    /// Fires on sign-in, sign-out and token refresh.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
