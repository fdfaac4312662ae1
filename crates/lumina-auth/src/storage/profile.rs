//! User profile storage trait.
//!
//! Defines the interface for profile persistence operations.
//! Implementations are provided by storage backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use lumina_core::UserId;

use super::FetchResult;

// =============================================================================
// User Profile
// =============================================================================

/// A user's application profile.
///
/// At most one profile exists per user. The primary key is the session
/// subject id itself ([`UserId`]), never an independently generated value;
/// a lookup keyed by the session subject therefore cannot miss a profile
/// that exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Primary key. Equals the identity provider's subject id.
    pub id: UserId,

    /// Display name.
    pub full_name: String,

    /// Contact email.
    pub email: String,

    /// Whether the account is active. Inactive profiles see no routes.
    pub active: bool,

    /// `true` until onboarding completes.
    pub first_access: bool,

    /// When the profile was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the profile was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UserProfile {
    /// Creates a fresh first-access profile for the given subject.
    #[must_use]
    pub fn new(id: UserId, full_name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            full_name: full_name.into(),
            email: email.into(),
            active: true,
            first_access: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks onboarding as complete.
    #[must_use]
    pub fn onboarded(mut self) -> Self {
        self.first_access = false;
        self.updated_at = OffsetDateTime::now_utc();
        self
    }

    /// Sets whether the profile is active.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Returns `true` if the account is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns `true` if the user still needs onboarding.
    #[must_use]
    pub fn needs_onboarding(&self) -> bool {
        self.first_access
    }
}

// =============================================================================
// Profile Storage Trait
// =============================================================================

/// Storage operations for user profiles.
///
/// # Example
///
/// ```ignore
/// use lumina_auth::storage::ProfileStorage;
///
/// async fn example(storage: &dyn ProfileStorage, user_id: UserId) {
///     if let Some(profile) = storage.find_by_id(user_id).await? {
///         println!("Found profile for {}", profile.full_name);
///     }
/// }
/// ```
#[async_trait]
pub trait ProfileStorage: Send + Sync {
    /// Find a profile by its user id.
    ///
    /// Returns `Ok(None)` if no profile has been provisioned yet; that is a
    /// valid result, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, user_id: UserId) -> FetchResult<Option<UserProfile>>;

    /// Create a new profile.
    ///
    /// # Errors
    ///
    /// Returns a conflict error if a profile already exists for the user,
    /// or an error if the storage operation fails.
    async fn create(&self, profile: &UserProfile) -> FetchResult<()>;

    /// Update an existing profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile doesn't exist or the storage
    /// operation fails.
    async fn update(&self, profile: &UserProfile) -> FetchResult<()>;

    /// Delete a profile.
    ///
    /// Only used to undo a provisioning write; profiles are never deleted in
    /// normal operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Deleting an absent
    /// profile is not an error (the undo must be idempotent).
    async fn delete(&self, user_id: UserId) -> FetchResult<()>;

    /// Flip `first_access` to `false` for the given user.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile doesn't exist or the storage
    /// operation fails.
    async fn mark_onboarded(&self, user_id: UserId) -> FetchResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_is_first_access() {
        let profile = UserProfile::new(UserId::generate(), "Ana Souza", "ana@clinic.example");
        assert!(profile.active);
        assert!(profile.first_access);
        assert!(profile.needs_onboarding());
    }

    #[test]
    fn test_onboarded_clears_first_access() {
        let profile =
            UserProfile::new(UserId::generate(), "Ana Souza", "ana@clinic.example").onboarded();
        assert!(!profile.first_access);
        assert!(!profile.needs_onboarding());
        assert!(profile.is_active());
    }

    #[test]
    fn test_with_active() {
        let profile = UserProfile::new(UserId::generate(), "Ana Souza", "ana@clinic.example")
            .with_active(false);
        assert!(!profile.is_active());
    }

    #[test]
    fn test_serde_round_trip() {
        let profile = UserProfile::new(UserId::generate(), "Ana Souza", "ana@clinic.example");
        let json = serde_json::to_string(&profile).unwrap();
        let back: UserProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
