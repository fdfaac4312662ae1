//! Profile and role fetcher.
//!
//! Idempotent reads over the profile and role stores, routed through the
//! single-flight manager so concurrent components asking for the same user
//! never issue duplicate network load. Retry-with-backoff for transient
//! failures lives here and nowhere else; the UI layer never retries on its
//! own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use lumina_core::UserId;

use crate::config::{CacheConfig, RetryConfig};
use crate::error::FetchError;
use crate::singleflight::{SingleFlight, SingleFlightStats};
use crate::storage::{FetchResult, ProfileStorage, RoleAssignment, RoleStorage, UserProfile};

// =============================================================================
// Account Snapshot
// =============================================================================

/// The pair of reads the decision engine requires.
///
/// Both reads have resolved (or definitively errored before construction);
/// evaluating route decisions on a partial input set is what caused the
/// redirect loops this type exists to prevent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// The profile, or `None` when not yet provisioned.
    pub profile: Option<UserProfile>,

    /// Active role assignments, possibly empty.
    pub roles: Vec<RoleAssignment>,
}

impl AccountSnapshot {
    /// Returns `true` if no profile has been provisioned.
    #[must_use]
    pub fn is_unprovisioned(&self) -> bool {
        self.profile.is_none()
    }
}

// =============================================================================
// Account Fetcher
// =============================================================================

/// Fetches profile and role data for authenticated users.
pub struct AccountFetcher {
    profiles: Arc<dyn ProfileStorage>,
    roles: Arc<dyn RoleStorage>,
    profile_flights: SingleFlight<Option<UserProfile>>,
    role_flights: SingleFlight<Vec<RoleAssignment>>,
    retry: RetryConfig,
}

fn profile_key(user_id: UserId) -> String {
    format!("profile:{user_id}")
}

fn roles_key(user_id: UserId) -> String {
    format!("roles:{user_id}")
}

impl AccountFetcher {
    /// Creates a fetcher over the given stores.
    #[must_use]
    pub fn new(
        profiles: Arc<dyn ProfileStorage>,
        roles: Arc<dyn RoleStorage>,
        cache: &CacheConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            profiles,
            roles,
            profile_flights: SingleFlight::new(cache.ttl),
            role_flights: SingleFlight::new(cache.ttl),
            retry,
        }
    }

    /// Fetch the user's profile.
    ///
    /// `Ok(None)` means "not yet provisioned" and is a valid result, distinct
    /// from a failed fetch.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is unreachable after retries or
    /// rejects the read.
    pub async fn fetch_profile(&self, user_id: UserId) -> FetchResult<Option<UserProfile>> {
        let storage = Arc::clone(&self.profiles);
        let retry = self.retry.clone();
        self.profile_flights
            .execute(&profile_key(user_id), move || async move {
                retry_fetch(&retry, "profile", || {
                    let storage = Arc::clone(&storage);
                    async move { storage.find_by_id(user_id).await }
                })
                .await
            })
            .await
    }

    /// Fetch the user's active role assignments.
    ///
    /// # Errors
    ///
    /// Returns an error when the store is unreachable after retries or
    /// rejects the read.
    pub async fn fetch_active_roles(&self, user_id: UserId) -> FetchResult<Vec<RoleAssignment>> {
        let storage = Arc::clone(&self.roles);
        let retry = self.retry.clone();
        self.role_flights
            .execute(&roles_key(user_id), move || async move {
                retry_fetch(&retry, "roles", || {
                    let storage = Arc::clone(&storage);
                    async move { storage.find_active_by_user(user_id).await }
                })
                .await
            })
            .await
    }

    /// Fetch profile and roles together.
    ///
    /// The two reads run concurrently; the snapshot is returned only once
    /// BOTH have resolved. If either definitively errors, that error is
    /// returned (profile first when both fail).
    ///
    /// # Errors
    ///
    /// Returns the first underlying fetch error.
    pub async fn fetch_account(&self, user_id: UserId) -> FetchResult<AccountSnapshot> {
        let (profile, roles) = tokio::join!(
            self.fetch_profile(user_id),
            self.fetch_active_roles(user_id)
        );
        Ok(AccountSnapshot {
            profile: profile?,
            roles: roles?,
        })
    }

    /// Drop the user's cached profile and roles.
    ///
    /// Call immediately after a known mutation (onboarding completion,
    /// profile edit) so the next read observes fresh data.
    pub async fn invalidate(&self, user_id: UserId) {
        self.profile_flights.invalidate(&profile_key(user_id)).await;
        self.role_flights.invalidate(&roles_key(user_id)).await;
    }

    /// Cache counters for the profile flight.
    #[must_use]
    pub fn profile_stats(&self) -> SingleFlightStats {
        self.profile_flights.stats()
    }

    /// Cache counters for the role flight.
    #[must_use]
    pub fn role_stats(&self) -> SingleFlightStats {
        self.role_flights.stats()
    }
}

// =============================================================================
// Retry
// =============================================================================

/// Run `op`, retrying transient failures with exponential backoff.
async fn retry_fetch<T, F, Fut>(retry: &RetryConfig, what: &str, mut op: F) -> FetchResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < retry.max_attempts => {
                let delay = backoff_delay(retry, attempt);
                tracing::warn!(
                    what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient fetch failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Exponential backoff with jitter: half the capped exponential delay plus a
/// random half on top, so synchronized clients spread out.
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exp = retry
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt - 1))
        .min(retry.max_delay);
    let half_ms = (exp.as_millis() / 2) as u64;
    if half_ms == 0 {
        return exp;
    }
    let jitter_ms = rand::thread_rng().gen_range(0..=half_ms);
    Duration::from_millis(half_ms + jitter_ms)
}

// =============================================================================
// Tests
// =============================================================================
