//! Route guard.
//!
//! The UI-boundary component. On every navigation it gathers the decision
//! engine's inputs (session, then profile and roles together), bounds the
//! wait with a soft warning and a hard ceiling, and turns the engine's
//! verdict into exactly one outcome: render, redirect once, or deny.
//!
//! Guards are thin by design: all routing logic lives in
//! [`decide`](crate::decision::decide); this type only gathers inputs,
//! bounds time, and suppresses duplicate redirects.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use crate::config::GuardConfig;
use crate::decision::{AuthContext, Decision, RouteDecision, decide};
use crate::fetcher::{AccountFetcher, AccountSnapshot};
use crate::routes::RouteTable;
use crate::session::{IdentityProvider, Session};

// =============================================================================
// Guard Outcome
// =============================================================================

/// What the caller should do after a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Render the protected content.
    Render,

    /// Navigate to the given path, once.
    Redirect(String),

    /// The decision's target is the current path; do not navigate again.
    Stay,

    /// The user lacks every required role; render the denial affordance.
    Denied,

    /// A newer navigation superseded this resolution; discard it.
    Superseded,
}

/// A completed guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardResolution {
    /// The engine's verdict.
    pub decision: Decision,

    /// What to do with it at the current path.
    pub outcome: GuardOutcome,
}

// =============================================================================
// Guard Events
// =============================================================================

/// Progress notifications emitted while a resolution is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEvent {
    /// Input gathering passed the soft threshold; surface a "taking longer
    /// than expected" affordance. Gathering continues until the hard ceiling.
    LoadingSlow {
        /// The navigation being resolved.
        path: String,
    },

    /// A resolution finished.
    Resolved {
        /// The navigation that was resolved.
        path: String,
        /// The engine's verdict.
        decision: Decision,
    },
}

// =============================================================================
// Gathered Inputs
// =============================================================================

/// Result of gathering the engine's inputs, before time bounds.
enum GatheredInputs {
    /// Definitively signed out (no session, or an expired one).
    Anonymous,

    /// Session plus a fully resolved account snapshot.
    SignedIn {
        session: Session,
        snapshot: AccountSnapshot,
    },

    /// Session resolved but the account fetch definitively errored.
    FetchFailed { session: Session },

    /// The provider itself could not be reached.
    SessionUnavailable,
}

// =============================================================================
// Route Guard
// =============================================================================

/// Evaluates navigations against the decision engine.
pub struct RouteGuard {
    identity: Arc<dyn IdentityProvider>,
    fetcher: Arc<AccountFetcher>,
    table: RouteTable,
    config: GuardConfig,
    generation: AtomicU64,
    events: broadcast::Sender<GuardEvent>,
}

impl RouteGuard {
    /// Creates a guard over the given identity provider and fetcher.
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        fetcher: Arc<AccountFetcher>,
        table: RouteTable,
        config: GuardConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            identity,
            fetcher,
            table,
            config,
            generation: AtomicU64::new(0),
            events,
        }
    }

    /// Subscribe to progress events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GuardEvent> {
        self.events.subscribe()
    }

    /// Resolve a navigation to `path`.
    ///
    /// Waits for the engine's inputs, bounded by the configured soft warning
    /// (emits [`GuardEvent::LoadingSlow`]) and hard ceiling (gives up and
    /// resolves through the error fallback). A resolution that finishes
    /// after a newer navigation has started returns
    /// [`GuardOutcome::Superseded`] so stale results are never applied.
    pub async fn resolve(&self, path: &str) -> GuardResolution {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let decision = match self.gather_bounded(path).await {
            Some(inputs) => self.evaluate(path, inputs),
            None => {
                tracing::warn!(path, "input gathering hit the hard ceiling");
                Decision::error_fallback()
            }
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(path, "discarding superseded resolution");
            return GuardResolution {
                decision,
                outcome: GuardOutcome::Superseded,
            };
        }

        let _ = self.events.send(GuardEvent::Resolved {
            path: path.to_string(),
            decision,
        });

        GuardResolution {
            decision,
            outcome: self.apply(path, decision),
        }
    }

    /// Invalidate the signed-in user's cached account data, then resolve.
    ///
    /// This is the retry affordance and the mandatory re-evaluation entry
    /// point right after onboarding completes: the next read must observe
    /// the flipped `first_access`, not a cached snapshot.
    pub async fn refresh(&self, path: &str) -> GuardResolution {
        if let Ok(Some(session)) = self.identity.current_session().await {
            self.fetcher.invalidate(session.user_id).await;
        }
        self.resolve(path).await
    }

    /// Gather inputs under the soft/hard timers.
    ///
    /// `None` means the hard ceiling fired.
    async fn gather_bounded(&self, path: &str) -> Option<GatheredInputs> {
        let gather = self.gather();
        tokio::pin!(gather);

        let softened = tokio::select! {
            inputs = &mut gather => Some(inputs),
            () = sleep(self.config.soft_warning) => None,
        };
        if let Some(inputs) = softened {
            return Some(inputs);
        }

        let _ = self.events.send(GuardEvent::LoadingSlow {
            path: path.to_string(),
        });
        let remaining = self
            .config
            .hard_ceiling
            .saturating_sub(self.config.soft_warning);
        timeout(remaining, &mut gather).await.ok()
    }

    /// Gather session, then profile and roles together.
    async fn gather(&self) -> GatheredInputs {
        let session = match self.identity.current_session().await {
            Ok(Some(session)) if session.is_valid() => session,
            Ok(_) => return GatheredInputs::Anonymous,
            Err(error) => {
                tracing::warn!(error = %error, "session lookup failed");
                return GatheredInputs::SessionUnavailable;
            }
        };

        match self.fetcher.fetch_account(session.user_id).await {
            Ok(snapshot) => GatheredInputs::SignedIn { session, snapshot },
            Err(error) => {
                tracing::warn!(user_id = %session.user_id, error = %error, "account fetch failed");
                GatheredInputs::FetchFailed { session }
            }
        }
    }

    /// Run the decision engine over gathered inputs.
    ///
    /// A definitive "signed out" answer and a provider outage are different
    /// things: only the former may claim there is no session. When the
    /// session state is unknown the evaluation short-circuits to the error
    /// fallback instead of fabricating an anonymous context.
    fn evaluate(&self, path: &str, inputs: GatheredInputs) -> Decision {
        let paths = self.table.paths();
        let builder = AuthContext::builder(path)
            .auth_path(paths.auth.clone())
            .onboarding_path(paths.onboarding.clone())
            .required_roles(self.table.required_roles(path));

        let context = match inputs {
            GatheredInputs::Anonymous => builder.build(),
            GatheredInputs::SignedIn { session, snapshot } => {
                builder.session(Some(session)).snapshot(snapshot).build()
            }
            GatheredInputs::FetchFailed { session } => {
                builder.session(Some(session)).fetch_failed(true).build()
            }
            GatheredInputs::SessionUnavailable => return Decision::error_fallback(),
        };
        decide(&context)
    }

    /// Map a verdict to an outcome at the current path, suppressing
    /// redirects that would land where the user already is.
    fn apply(&self, path: &str, decision: Decision) -> GuardOutcome {
        let paths = self.table.paths();
        let target = match decision.route {
            RouteDecision::Allow => return GuardOutcome::Render,
            RouteDecision::Deny => return GuardOutcome::Denied,
            RouteDecision::RedirectToAuth => &paths.auth,
            RouteDecision::RedirectToOnboarding => &paths.onboarding,
            RouteDecision::RedirectToDashboard => &paths.dashboard,
        };
        if target.as_str() == path {
            GuardOutcome::Stay
        } else {
            GuardOutcome::Redirect(target.clone())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
