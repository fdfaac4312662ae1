//! # lumina-auth
//!
//! Authentication, session state and onboarding module for the Lumina
//! clinic-practice platform.
//!
//! This crate provides:
//! - An identity-provider adapter trait with session-change events
//! - Profile and role fetching with single-flight deduplication and caching
//! - A pure route decision engine mapping auth context to one discrete state
//! - A route guard with bounded loading and idempotent redirects
//! - A rollback-capable onboarding transaction orchestrator
//!
//! ## Overview
//!
//! Data flows in one direction: the identity adapter yields a session, the
//! fetcher resolves the profile and role inputs for that session, the
//! decision engine reduces the full context to a state and a route decision,
//! and the guard applies exactly that decision. The onboarding orchestrator
//! runs beside this pipeline; committing a transaction invalidates the
//! fetcher's cache so the next decision sees the completed profile.
//!
//! ## Modules
//!
//! - [`config`] - Cache, guard-timing and retry configuration
//! - [`session`] - Session types and the identity-provider adapter trait
//! - [`storage`] - Profile, role and clinic storage traits
//! - [`singleflight`] - Deduplicating short-TTL request cache
//! - [`fetcher`] - Profile/role reads with centralized retry
//! - [`decision`] - The pure route decision engine
//! - [`routes`] - Declarative route table
//! - [`guard`] - The route guard
//! - [`onboarding`] - The onboarding transaction orchestrator

pub mod config;
pub mod decision;
pub mod error;
pub mod fetcher;
pub mod guard;
pub mod onboarding;
pub mod routes;
pub mod session;
pub mod singleflight;
pub mod storage;

pub use config::{AuthConfig, CacheConfig, GuardConfig, RetryConfig, RoutePaths};
pub use decision::{AuthContext, AuthContextBuilder, AuthState, Decision, RouteDecision, decide};
pub use error::{AuthError, ErrorCategory, FetchError, OnboardingError};
pub use fetcher::{AccountFetcher, AccountSnapshot};
pub use guard::{GuardEvent, GuardOutcome, GuardResolution, RouteGuard};
pub use onboarding::{
    ClinicSetup, OnboardingFailure, OnboardingOrchestrator, OnboardingReceipt, OnboardingRequest,
    OnboardingStep, OnboardingStores, ProfessionalSetup,
};
pub use routes::{RouteRule, RouteTable};
pub use session::{Credentials, IdentityProvider, Session, SessionEvent};
pub use singleflight::{SingleFlight, SingleFlightStats};
pub use storage::{
    Clinic, ClinicStorage, FetchResult, Organization, ProfessionalRecord, ProfileStorage, Role,
    RoleAssignment, RoleStorage, UserProfile, highest_privilege,
};

/// Type alias for identity-provider results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use lumina_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, CacheConfig, GuardConfig, RetryConfig, RoutePaths};
    pub use crate::decision::{
        AuthContext, AuthContextBuilder, AuthState, Decision, RouteDecision, decide,
    };
    pub use crate::error::{AuthError, ErrorCategory, FetchError, OnboardingError};
    pub use crate::fetcher::{AccountFetcher, AccountSnapshot};
    pub use crate::guard::{GuardEvent, GuardOutcome, GuardResolution, RouteGuard};
    pub use crate::onboarding::{
        ClinicSetup, OnboardingFailure, OnboardingOrchestrator, OnboardingReceipt,
        OnboardingRequest, OnboardingStep, OnboardingStores, ProfessionalSetup,
    };
    pub use crate::routes::{RouteRule, RouteTable};
    pub use crate::session::{Credentials, IdentityProvider, Session, SessionEvent};
    pub use crate::storage::{
        Clinic, ClinicStorage, FetchResult, Organization, ProfessionalRecord, ProfileStorage,
        Role, RoleAssignment, RoleStorage, UserProfile, highest_privilege,
    };
}
