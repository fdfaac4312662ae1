//! Authentication, fetch and onboarding error types.
//!
//! The propagation rules are strict: expected conditions (missing profile,
//! absent session) are `Ok` values, never errors; the identity adapter and
//! the fetcher convert unexpected exceptions into typed errors at their
//! boundary; the decision engine never returns an error at all.

use std::fmt;

// =============================================================================
// Auth Error
// =============================================================================

/// Errors reported by the identity provider adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The supplied credentials were rejected by the provider.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The session existed but has expired.
    #[error("Session expired")]
    SessionExpired,

    /// The identity provider could not be reached.
    #[error("Identity provider unreachable: {message}")]
    ProviderUnreachable {
        /// Description of the transport failure.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal auth error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `ProviderUnreachable` error.
    #[must_use]
    pub fn provider_unreachable(message: impl Into<String>) -> Self {
        Self::ProviderUnreachable {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnreachable { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidCredentials | Self::SessionExpired => ErrorCategory::Authentication,
            Self::ProviderUnreachable { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

// =============================================================================
// Fetch Error
// =============================================================================

/// Errors reported by the data-store boundary (profile, role and clinic
/// storages, and the single-flight layer above them).
///
/// `Clone` because a single in-flight fetch may be awaited by many callers;
/// each of them receives the same error value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The store could not be reached or the request failed in transit.
    #[error("Network error: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// The addressed row does not exist where existence was required.
    ///
    /// Read paths that allow absence return `Ok(None)` instead.
    #[error("Not found: {what}")]
    NotFound {
        /// What was being looked up.
        what: String,
    },

    /// The store's access rules rejected the operation.
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Description of the rejection.
        message: String,
    },

    /// A uniqueness or concurrent-write conflict.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// The stored data could not be interpreted.
    #[error("Invalid data: {message}")]
    Invalid {
        /// Description of the malformed data.
        message: String,
    },

    /// The operation exceeded its deadline.
    #[error("Timed out after {waited_ms}ms")]
    Timeout {
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// An unexpected internal error occurred.
    #[error("Internal fetch error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl FetchError {
    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a new `PermissionDenied` error.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(waited_ms: u64) -> Self {
        Self::Timeout { waited_ms }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the same call may succeed.
    ///
    /// Drives the fetcher's retry policy: permission and validity errors are
    /// final; transport failures are worth another attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => ErrorCategory::Infrastructure,
            Self::NotFound { .. } => ErrorCategory::Fetch,
            Self::PermissionDenied { .. } => ErrorCategory::Authorization,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Invalid { .. } => ErrorCategory::Validation,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

// =============================================================================
// Onboarding Error
// =============================================================================

/// Errors raised by a single onboarding step.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OnboardingError {
    /// The onboarding request failed validation before any write.
    #[error("Validation failed in step '{step}': {message}")]
    Validation {
        /// Name of the step (or "validate" for the pre-flight check).
        step: &'static str,
        /// What was wrong with the request.
        message: String,
    },

    /// A write conflicted with existing data (e.g. duplicate create).
    #[error("Write conflict in step '{step}': {message}")]
    WriteConflict {
        /// Name of the failing step.
        step: &'static str,
        /// Description of the conflict.
        message: String,
    },

    /// A storage operation failed.
    #[error("Step '{step}' failed: {source}")]
    Store {
        /// Name of the failing step.
        step: &'static str,
        /// The underlying storage error.
        source: FetchError,
    },
}

impl OnboardingError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(step: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            step,
            message: message.into(),
        }
    }

    /// Wraps a storage error, lifting conflicts to `WriteConflict`.
    #[must_use]
    pub fn from_store(step: &'static str, source: FetchError) -> Self {
        match source {
            FetchError::Conflict { message } => Self::WriteConflict { step, message },
            other => Self::Store { step, source: other },
        }
    }

    /// Name of the step that raised this error.
    #[must_use]
    pub fn step(&self) -> &'static str {
        match self {
            Self::Validation { step, .. }
            | Self::WriteConflict { step, .. }
            | Self::Store { step, .. } => step,
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::WriteConflict { .. } => ErrorCategory::Conflict,
            Self::Store { source, .. } => source.category(),
        }
    }
}

// =============================================================================
// Error Category
// =============================================================================

/// Categories of subsystem errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity verification errors.
    Authentication,
    /// Permission/access errors.
    Authorization,
    /// Data retrieval errors.
    Fetch,
    /// Request validation errors.
    Validation,
    /// Uniqueness/concurrency conflicts.
    Conflict,
    /// Transport/storage availability errors.
    Infrastructure,
    /// Unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Fetch => write!(f, "fetch"),
            Self::Validation => write!(f, "validation"),
            Self::Conflict => write!(f, "conflict"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid credentials");
        assert_eq!(
            AuthError::provider_unreachable("dns failure").to_string(),
            "Identity provider unreachable: dns failure"
        );
    }

    #[test]
    fn test_auth_error_retryable() {
        assert!(AuthError::provider_unreachable("down").is_retryable());
        assert!(!AuthError::InvalidCredentials.is_retryable());
        assert!(!AuthError::SessionExpired.is_retryable());
    }

    #[test]
    fn test_auth_error_category() {
        assert_eq!(
            AuthError::InvalidCredentials.category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            AuthError::provider_unreachable("down").category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn test_fetch_error_transient() {
        assert!(FetchError::network("reset").is_transient());
        assert!(FetchError::timeout(5000).is_transient());
        assert!(!FetchError::permission_denied("rls").is_transient());
        assert!(!FetchError::conflict("duplicate").is_transient());
        assert!(!FetchError::not_found("profile").is_transient());
    }

    #[test]
    fn test_fetch_error_category() {
        assert_eq!(
            FetchError::network("reset").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            FetchError::permission_denied("rls").category(),
            ErrorCategory::Authorization
        );
        assert_eq!(
            FetchError::invalid("bad row").category(),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn test_onboarding_error_from_store_lifts_conflict() {
        let err = OnboardingError::from_store("create-profile", FetchError::conflict("exists"));
        assert!(matches!(err, OnboardingError::WriteConflict { .. }));
        assert_eq!(err.step(), "create-profile");
        assert_eq!(err.category(), ErrorCategory::Conflict);

        let err = OnboardingError::from_store("create-role", FetchError::network("reset"));
        assert!(matches!(err, OnboardingError::Store { .. }));
        assert_eq!(err.category(), ErrorCategory::Infrastructure);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Authentication.to_string(), "authentication");
        assert_eq!(ErrorCategory::Conflict.to_string(), "conflict");
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
