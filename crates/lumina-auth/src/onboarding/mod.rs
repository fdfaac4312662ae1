//! Onboarding transaction orchestrator.
//!
//! First-time users are provisioned through an ordered sequence of external
//! writes: profile, role, optionally an organization with its first clinic,
//! optionally a professional record. The orchestrator executes the steps
//! strictly in order; on the first failure it rolls back every step that
//! already succeeded, in reverse order, and reports the original failure.
//! There is no partial resume: a retry restarts the whole transaction.
//!
//! The transaction ledger lives only in memory for the duration of one run.
//! A page reload mid-onboarding loses the rollback bookkeeping; already
//! applied writes then remain until the user retries and the duplicate
//! creates surface as conflicts.

mod steps;

pub use steps::default_steps;

use std::sync::Arc;

use uuid::Uuid;

use lumina_core::{ClinicId, OrganizationId, UserId};

use crate::error::OnboardingError;
use crate::fetcher::AccountFetcher;
use crate::storage::{ClinicStorage, ProfileStorage, Role, RoleStorage};

// =============================================================================
// Request
// =============================================================================

/// What the onboarding UI submits.
#[derive(Debug, Clone)]
pub struct OnboardingRequest {
    /// The signed-in subject being provisioned.
    pub user_id: UserId,

    /// Display name for the new profile.
    pub full_name: String,

    /// Contact email for the new profile.
    pub email: String,

    /// The primary role the user picked.
    pub role: Role,

    /// Present when the user is founding a practice.
    pub clinic: Option<ClinicSetup>,

    /// Present when the user practices professionally.
    pub professional: Option<ProfessionalSetup>,
}

/// Organization/clinic branch of the request.
#[derive(Debug, Clone)]
pub struct ClinicSetup {
    /// Name of the organization to create.
    pub organization_name: String,

    /// Name of its first clinic.
    pub clinic_name: String,
}

/// Professional branch of the request.
#[derive(Debug, Clone)]
pub struct ProfessionalSetup {
    /// Name shown on schedules.
    pub display_name: String,

    /// Specialty, if declared.
    pub specialty: Option<String>,
}

// =============================================================================
// Stores & Context
// =============================================================================

/// The storage handles onboarding writes go through.
#[derive(Clone)]
pub struct OnboardingStores {
    /// Profile rows.
    pub profiles: Arc<dyn ProfileStorage>,

    /// Role assignment rows.
    pub roles: Arc<dyn RoleStorage>,

    /// Organization, clinic and professional rows.
    pub clinics: Arc<dyn ClinicStorage>,
}

/// Mutable state threaded through one transaction run.
///
/// Each step records what it created so its rollback (and later steps) can
/// address the same rows.
pub struct OnboardingContext {
    /// The request being executed.
    pub request: OnboardingRequest,

    /// Storage handles.
    pub stores: OnboardingStores,

    /// Set once `create-profile` succeeds.
    pub profile_created: bool,

    /// Set once `create-role` succeeds.
    pub assignment_id: Option<Uuid>,

    /// Set once `create-organization` succeeds.
    pub organization_id: Option<OrganizationId>,

    /// Set once `create-clinic` succeeds.
    pub clinic_id: Option<ClinicId>,

    /// Set once `create-professional` succeeds.
    pub professional_id: Option<Uuid>,
}

impl OnboardingContext {
    fn new(request: OnboardingRequest, stores: OnboardingStores) -> Self {
        Self {
            request,
            stores,
            profile_created: false,
            assignment_id: None,
            organization_id: None,
            clinic_id: None,
            professional_id: None,
        }
    }
}

// =============================================================================
// Step Trait
// =============================================================================

/// One side-effecting write in the onboarding sequence.
#[async_trait::async_trait]
pub trait OnboardingStep: Send + Sync {
    /// Stable step name, used in the ledger and in failure reports.
    fn name(&self) -> &'static str;

    /// Whether this step participates for the given request.
    fn applies(&self, _context: &OnboardingContext) -> bool {
        true
    }

    /// Perform the write, recording created ids on the context.
    ///
    /// # Errors
    ///
    /// Returns an error describing the failed write; the orchestrator then
    /// rolls back every previously applied step.
    async fn execute(&self, context: &mut OnboardingContext) -> Result<(), OnboardingError>;

    /// Undo the write. Must be self-contained and idempotent: rollback can
    /// run against partially applied state and may itself be retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the undo fails; the orchestrator logs it and
    /// keeps the original failure as the surfaced error.
    async fn rollback(&self, context: &OnboardingContext) -> Result<(), OnboardingError>;
}

// =============================================================================
// Receipt & Failure
// =============================================================================

/// Proof of a committed onboarding transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingReceipt {
    /// Transaction identifier, for support/audit logs.
    pub transaction_id: Uuid,

    /// Names of the steps that ran, in execution order.
    pub steps: Vec<&'static str>,
}

/// A failed onboarding transaction, after rollback.
///
/// The surfaced error is always the step that failed, never a rollback
/// outcome.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "Onboarding transaction {transaction_id} failed at step '{step}': {error}; \
     {rolled} prior step(s) were reverted",
    step = .error.step(),
    rolled = .rolled_back.len()
)]
pub struct OnboardingFailure {
    /// Transaction identifier.
    pub transaction_id: Uuid,

    /// The original step failure.
    pub error: OnboardingError,

    /// Names of the steps whose rollback ran, in reverse execution order.
    pub rolled_back: Vec<&'static str>,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs onboarding transactions.
pub struct OnboardingOrchestrator {
    stores: OnboardingStores,
    fetcher: Arc<AccountFetcher>,
    steps: Vec<Arc<dyn OnboardingStep>>,
}

impl OnboardingOrchestrator {
    /// Creates an orchestrator with the standard step sequence.
    #[must_use]
    pub fn new(stores: OnboardingStores, fetcher: Arc<AccountFetcher>) -> Self {
        Self::with_steps(stores, fetcher, default_steps())
    }

    /// Creates an orchestrator with a custom step sequence.
    #[must_use]
    pub fn with_steps(
        stores: OnboardingStores,
        fetcher: Arc<AccountFetcher>,
        steps: Vec<Arc<dyn OnboardingStep>>,
    ) -> Self {
        Self {
            stores,
            fetcher,
            steps,
        }
    }

    /// Execute one onboarding transaction.
    ///
    /// Validates the request before any write, then runs the applicable
    /// steps in order. Only after the final step succeeds is the
    /// transaction committed; the user's cached account data is invalidated
    /// so the next route evaluation observes the completed profile.
    ///
    /// # Errors
    ///
    /// Returns the original step failure after best-effort rollback of the
    /// already applied steps.
    pub async fn run(&self, request: OnboardingRequest) -> Result<OnboardingReceipt, OnboardingFailure> {
        let transaction_id = Uuid::new_v4();

        if let Err(error) = validate(&request) {
            return Err(OnboardingFailure {
                transaction_id,
                error,
                rolled_back: Vec::new(),
            });
        }

        let user_id = request.user_id;
        let mut context = OnboardingContext::new(request, self.stores.clone());
        let mut applied: Vec<Arc<dyn OnboardingStep>> = Vec::new();

        tracing::info!(%transaction_id, %user_id, "onboarding transaction started");

        for step in &self.steps {
            if !step.applies(&context) {
                continue;
            }
            match step.execute(&mut context).await {
                Ok(()) => {
                    tracing::debug!(%transaction_id, step = step.name(), "step applied");
                    applied.push(Arc::clone(step));
                }
                Err(error) => {
                    tracing::warn!(
                        %transaction_id,
                        step = step.name(),
                        error = %error,
                        "step failed, rolling back"
                    );
                    let rolled_back = self.rollback_applied(&context, &applied).await;
                    return Err(OnboardingFailure {
                        transaction_id,
                        error,
                        rolled_back,
                    });
                }
            }
        }

        // Committed. Drop cached account data so the next decision sees the
        // flipped first_access instead of a stale snapshot.
        self.fetcher.invalidate(user_id).await;

        tracing::info!(%transaction_id, %user_id, "onboarding transaction committed");
        Ok(OnboardingReceipt {
            transaction_id,
            steps: applied.iter().map(|step| step.name()).collect(),
        })
    }

    /// Roll back applied steps in reverse order. Rollback failures are
    /// logged and swallowed; the caller surfaces the original error.
    async fn rollback_applied(
        &self,
        context: &OnboardingContext,
        applied: &[Arc<dyn OnboardingStep>],
    ) -> Vec<&'static str> {
        let mut rolled_back = Vec::with_capacity(applied.len());
        for step in applied.iter().rev() {
            if let Err(error) = step.rollback(context).await {
                tracing::warn!(
                    step = step.name(),
                    error = %error,
                    "rollback failed, continuing"
                );
            }
            rolled_back.push(step.name());
        }
        rolled_back
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Pre-flight request validation; runs before any write.
fn validate(request: &OnboardingRequest) -> Result<(), OnboardingError> {
    const STEP: &str = "validate";

    if request.full_name.trim().is_empty() {
        return Err(OnboardingError::validation(STEP, "full name is required"));
    }
    if !request.email.contains('@') {
        return Err(OnboardingError::validation(STEP, "a valid email is required"));
    }
    if request.role == Role::SuperAdmin {
        return Err(OnboardingError::validation(
            STEP,
            "the platform operator role cannot be self-assigned",
        ));
    }
    if let Some(clinic) = &request.clinic {
        if clinic.organization_name.trim().is_empty() || clinic.clinic_name.trim().is_empty() {
            return Err(OnboardingError::validation(
                STEP,
                "organization and clinic names are required",
            ));
        }
    }
    if let Some(professional) = &request.professional {
        if professional.display_name.trim().is_empty() {
            return Err(OnboardingError::validation(
                STEP,
                "professional display name is required",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> OnboardingRequest {
        OnboardingRequest {
            user_id: UserId::generate(),
            full_name: "Ana Souza".to_string(),
            email: "ana@clinic.example".to_string(),
            role: Role::Owner,
            clinic: None,
            professional: None,
        }
    }

    #[test]
    fn test_validate_accepts_minimal_request() {
        assert!(validate(&base_request()).is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let request = OnboardingRequest {
            full_name: "   ".to_string(),
            ..base_request()
        };
        let err = validate(&request).unwrap_err();
        assert!(matches!(err, OnboardingError::Validation { .. }));
        assert_eq!(err.step(), "validate");
    }

    #[test]
    fn test_validate_rejects_bad_email() {
        let request = OnboardingRequest {
            email: "not-an-email".to_string(),
            ..base_request()
        };
        assert!(validate(&request).is_err());
    }

    #[test]
    fn test_validate_rejects_super_admin() {
        let request = OnboardingRequest {
            role: Role::SuperAdmin,
            ..base_request()
        };
        assert!(validate(&request).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_clinic_names() {
        let request = OnboardingRequest {
            clinic: Some(ClinicSetup {
                organization_name: "Espaço Beleza".to_string(),
                clinic_name: "".to_string(),
            }),
            ..base_request()
        };
        assert!(validate(&request).is_err());
    }

    #[test]
    fn test_failure_display_names_step_and_revert_count() {
        let failure = OnboardingFailure {
            transaction_id: Uuid::nil(),
            error: OnboardingError::from_store(
                "create-clinic",
                crate::error::FetchError::network("down"),
            ),
            rolled_back: vec!["create-role", "create-profile"],
        };
        let message = failure.to_string();
        assert!(message.contains("create-clinic"));
        assert!(message.contains("2 prior step(s)"));
    }
}
