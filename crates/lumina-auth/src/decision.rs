//! Route decision engine.
//!
//! One pure function, [`decide`], maps the full authentication context to a
//! discrete state and a route decision. Every guard in the application is a
//! thin consumer of this output; there are no parallel decision paths.
//!
//! The rules form a fixed, total priority chain. They are not independent:
//! reordering them re-opens the redirect loops this engine exists to close,
//! so any change here must re-validate the whole chain.

use serde::{Deserialize, Serialize};

use crate::fetcher::AccountSnapshot;
use crate::session::Session;
use crate::storage::{Role, RoleAssignment, UserProfile};

// =============================================================================
// Auth State
// =============================================================================

/// The discrete, mutually exclusive authentication states.
///
/// Derived on every evaluation; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No usable session.
    Anonymous,

    /// Signed in, onboarding not yet completed.
    AuthenticatedNew,

    /// Signed in, currently inside the onboarding flow.
    OnboardingInProgress,

    /// Signed in with a completed, active profile.
    AuthenticatedExisting,

    /// Inputs errored or contradict each other; fall back safely.
    ErrorState,
}

// =============================================================================
// Route Decision
// =============================================================================

/// What the guard should do with the current navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    /// Send the user to the sign-in page.
    RedirectToAuth,

    /// Send the user to the onboarding flow.
    RedirectToOnboarding,

    /// Render the requested route.
    Allow,

    /// Safe fallback: send the user to the dashboard.
    RedirectToDashboard,

    /// The user lacks every role the route requires.
    Deny,
}

impl RouteDecision {
    /// Returns `true` if the requested route may render.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if the guard must navigate elsewhere.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            Self::RedirectToAuth | Self::RedirectToOnboarding | Self::RedirectToDashboard
        )
    }
}

/// The engine's full verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Which state the user is in.
    pub state: AuthState,

    /// What to do with the navigation.
    pub route: RouteDecision,
}

impl Decision {
    /// The verdict when required inputs could not be gathered at all
    /// (provider unreachable, loading ceiling hit). Matches what rule 2
    /// produces for errored inputs: never loop back into the failing fetch.
    #[must_use]
    pub fn error_fallback() -> Self {
        Self {
            state: AuthState::ErrorState,
            route: RouteDecision::RedirectToDashboard,
        }
    }
}

// =============================================================================
// Auth Context
// =============================================================================

/// Everything [`decide`] looks at.
///
/// Built by the guard once BOTH the profile and the role fetch have resolved
/// (or definitively errored, signalled by `fetch_failed`). Constructing a
/// context from partial inputs is the bug this bundling prevents.
#[derive(Debug, Clone)]
pub struct AuthContext {
    session: Option<Session>,
    profile: Option<UserProfile>,
    roles: Vec<RoleAssignment>,
    fetch_failed: bool,
    current_path: String,
    onboarding_path: String,
    auth_path: String,
    required_roles: Vec<Role>,
}

impl AuthContext {
    /// Starts a context for the given navigation target.
    #[must_use]
    pub fn builder(current_path: impl Into<String>) -> AuthContextBuilder {
        AuthContextBuilder {
            context: AuthContext {
                session: None,
                profile: None,
                roles: Vec::new(),
                fetch_failed: false,
                current_path: current_path.into(),
                onboarding_path: "/onboarding".to_string(),
                auth_path: "/auth".to_string(),
                required_roles: Vec::new(),
            },
        }
    }

    /// The navigation target under evaluation.
    #[must_use]
    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    fn has_valid_session(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_valid)
    }

    fn at_onboarding(&self) -> bool {
        self.current_path == self.onboarding_path
    }

    fn at_auth(&self) -> bool {
        self.current_path == self.auth_path
    }
}

/// Builder for [`AuthContext`].
pub struct AuthContextBuilder {
    context: AuthContext,
}

impl AuthContextBuilder {
    /// Sets the provider session, if any.
    #[must_use]
    pub fn session(mut self, session: Option<Session>) -> Self {
        self.context.session = session;
        self
    }

    /// Sets the resolved profile and role inputs from a snapshot.
    #[must_use]
    pub fn snapshot(mut self, snapshot: AccountSnapshot) -> Self {
        self.context.profile = snapshot.profile;
        self.context.roles = snapshot.roles;
        self
    }

    /// Sets the resolved profile directly.
    #[must_use]
    pub fn profile(mut self, profile: Option<UserProfile>) -> Self {
        self.context.profile = profile;
        self
    }

    /// Sets the resolved role assignments directly.
    #[must_use]
    pub fn roles(mut self, roles: Vec<RoleAssignment>) -> Self {
        self.context.roles = roles;
        self
    }

    /// Marks the profile/role inputs as errored rather than resolved.
    #[must_use]
    pub fn fetch_failed(mut self, failed: bool) -> Self {
        self.context.fetch_failed = failed;
        self
    }

    /// Sets the onboarding path (default `/onboarding`).
    #[must_use]
    pub fn onboarding_path(mut self, path: impl Into<String>) -> Self {
        self.context.onboarding_path = path.into();
        self
    }

    /// Sets the sign-in path (default `/auth`).
    #[must_use]
    pub fn auth_path(mut self, path: impl Into<String>) -> Self {
        self.context.auth_path = path.into();
        self
    }

    /// Declares the roles the requested route requires (empty = public to
    /// any signed-in user).
    #[must_use]
    pub fn required_roles(mut self, roles: Vec<Role>) -> Self {
        self.context.required_roles = roles;
        self
    }

    /// Finishes the context.
    #[must_use]
    pub fn build(self) -> AuthContext {
        self.context
    }
}

// =============================================================================
// Decide
// =============================================================================

/// Map the authentication context to a state and a route decision.
///
/// Pure and total: no I/O, no hidden state, never panics, and identical
/// contexts produce identical decisions. The rule chain:
///
/// 1. No usable session: anonymous, go sign in.
/// 2. Inputs errored: error state, fall back to the dashboard rather than
///    looping back into whichever rule produced the failure.
/// 3. Session but no profile row: not yet provisioned, go sign in.
///    Provisioning is the onboarding orchestrator's job, invoked explicitly;
///    deciding routes must never create rows as a side effect.
/// 4. First access: inside the onboarding flow stay put, anywhere else go to
///    onboarding.
/// 5. Completed active profile: signed-in users don't linger on the sign-in
///    page; otherwise the route's required roles gate access (holding any
///    one of them suffices).
/// 6. Anything left (e.g. deactivated profile): error state, dashboard.
#[must_use]
pub fn decide(context: &AuthContext) -> Decision {
    if !context.has_valid_session() {
        return Decision {
            state: AuthState::Anonymous,
            route: RouteDecision::RedirectToAuth,
        };
    }

    if context.fetch_failed {
        return Decision {
            state: AuthState::ErrorState,
            route: RouteDecision::RedirectToDashboard,
        };
    }

    let Some(profile) = context.profile.as_ref() else {
        return Decision {
            state: AuthState::Anonymous,
            route: RouteDecision::RedirectToAuth,
        };
    };

    if profile.first_access {
        return if context.at_onboarding() {
            Decision {
                state: AuthState::OnboardingInProgress,
                route: RouteDecision::Allow,
            }
        } else {
            Decision {
                state: AuthState::AuthenticatedNew,
                route: RouteDecision::RedirectToOnboarding,
            }
        };
    }

    if profile.active {
        if context.at_auth() {
            return Decision {
                state: AuthState::AuthenticatedExisting,
                route: RouteDecision::RedirectToDashboard,
            };
        }
        let route = if satisfies(&context.required_roles, &context.roles) {
            RouteDecision::Allow
        } else {
            RouteDecision::Deny
        };
        return Decision {
            state: AuthState::AuthenticatedExisting,
            route,
        };
    }

    Decision {
        state: AuthState::ErrorState,
        route: RouteDecision::RedirectToDashboard,
    }
}

/// OR-semantics role check: any one active assignment matching any required
/// role grants access. An empty requirement admits every signed-in user.
#[must_use]
pub fn satisfies(required: &[Role], assignments: &[RoleAssignment]) -> bool {
    if required.is_empty() {
        return true;
    }
    assignments
        .iter()
        .filter(|assignment| assignment.active)
        .any(|assignment| required.contains(&assignment.role))
}

// =============================================================================
// Tests
// =============================================================================
