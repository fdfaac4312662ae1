//! Auth subsystem configuration.
//!
//! Configuration for the session cache, the route guard's loading timers and
//! the fetcher's retry policy, organized into logical subsections.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the auth subsystem.
///
/// # Example (TOML)
///
/// ```toml
/// [auth.cache]
/// ttl = "5s"
///
/// [auth.guard]
/// soft_warning = "3s"
/// hard_ceiling = "10s"
///
/// [auth.retry]
/// max_attempts = 3
/// base_delay = "200ms"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Single-flight cache configuration.
    pub cache: CacheConfig,

    /// Route guard timing configuration.
    pub guard: GuardConfig,

    /// Fetch retry configuration.
    pub retry: RetryConfig,

    /// Well-known route paths.
    pub paths: RoutePaths,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            guard: GuardConfig::default(),
            retry: RetryConfig::default(),
            paths: RoutePaths::default(),
        }
    }
}

/// Single-flight cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a successful fetch result stays fresh.
    ///
    /// Kept short (seconds, not minutes): profile and role state changes
    /// during onboarding must be observed promptly.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5),
        }
    }
}

/// Route guard timing configuration.
///
/// The guard's loading state carries two timers. The soft threshold surfaces
/// a "taking longer than expected" event while waiting continues; the hard
/// ceiling stops waiting entirely and resolves through the error fallback.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// After this long, a slow-loading event is emitted.
    #[serde(with = "humantime_serde")]
    pub soft_warning: Duration,

    /// After this long, input gathering is abandoned.
    /// Must be greater than `soft_warning`.
    #[serde(with = "humantime_serde")]
    pub hard_ceiling: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            soft_warning: Duration::from_secs(3),
            hard_ceiling: Duration::from_secs(10),
        }
    }
}

/// Retry policy for transient fetch failures.
///
/// Exponential backoff with jitter. Only transient errors are retried;
/// permission and validity errors fail immediately.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one. `1` disables retries.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each subsequent attempt.
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Upper bound for a single backoff delay.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Well-known application paths the decision engine redirects between.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutePaths {
    /// Sign-in page.
    pub auth: String,

    /// First-access onboarding flow.
    pub onboarding: String,

    /// Default landing page and safe fallback target.
    pub dashboard: String,
}

impl Default for RoutePaths {
    fn default() -> Self {
        Self {
            auth: "/auth".to_string(),
            onboarding: "/onboarding".to_string(),
            dashboard: "/dashboard".to_string(),
        }
    }
}

impl AuthConfig {
    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.guard.hard_ceiling <= self.guard.soft_warning {
            return Err(format!(
                "guard.hard_ceiling ({:?}) must exceed guard.soft_warning ({:?})",
                self.guard.hard_ceiling, self.guard.soft_warning
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        if self.paths.auth == self.paths.onboarding || self.paths.auth == self.paths.dashboard {
            return Err("route paths must be distinct".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AuthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.ttl, Duration::from_secs(5));
        assert!(config.guard.hard_ceiling > config.guard.soft_warning);
    }

    #[test]
    fn test_ceiling_must_exceed_warning() {
        let mut config = AuthConfig::default();
        config.guard.hard_ceiling = Duration::from_secs(1);
        let err = config.validate().unwrap_err();
        assert!(err.contains("hard_ceiling"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = AuthConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_src = r#"
            [cache]
            ttl = "2s"

            [guard]
            soft_warning = "1s"
            hard_ceiling = "4s"

            [retry]
            max_attempts = 5
            base_delay = "100ms"

            [paths]
            onboarding = "/bem-vindo"
        "#;

        let config: AuthConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.cache.ttl, Duration::from_secs(2));
        assert_eq!(config.guard.hard_ceiling, Duration::from_secs(4));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(100));
        // Unspecified fields keep defaults
        assert_eq!(config.retry.max_delay, Duration::from_secs(2));
        assert_eq!(config.paths.onboarding, "/bem-vindo");
        assert_eq!(config.paths.auth, "/auth");
        assert!(config.validate().is_ok());
    }
}
