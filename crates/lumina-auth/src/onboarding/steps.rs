//! The standard onboarding step sequence.
//!
//! Step order matters: later steps address rows created by earlier ones.
//! Every rollback is an idempotent delete/undo addressing only what its own
//! step created, so a partially failed rollback pass leaves no step undone
//! twice.

use std::sync::Arc;

use super::{OnboardingContext, OnboardingStep};
use crate::error::OnboardingError;
use crate::storage::{Clinic, Organization, ProfessionalRecord, RoleAssignment, UserProfile};

/// The standard sequence, in execution order.
#[must_use]
pub fn default_steps() -> Vec<Arc<dyn OnboardingStep>> {
    vec![
        Arc::new(CreateProfile),
        Arc::new(CreateRole),
        Arc::new(CreateOrganization),
        Arc::new(CreateClinic),
        Arc::new(AssignClinicToRole),
        Arc::new(CreateProfessional),
        Arc::new(LinkProfessionalToClinic),
        Arc::new(CompleteOnboarding),
    ]
}

// =============================================================================
// create-profile
// =============================================================================

/// Creates the first-access profile row, keyed by the session subject id.
struct CreateProfile;

#[async_trait::async_trait]
impl OnboardingStep for CreateProfile {
    fn name(&self) -> &'static str {
        "create-profile"
    }

    async fn execute(&self, context: &mut OnboardingContext) -> Result<(), OnboardingError> {
        let profile = UserProfile::new(
            context.request.user_id,
            context.request.full_name.clone(),
            context.request.email.clone(),
        );
        context
            .stores
            .profiles
            .create(&profile)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))?;
        context.profile_created = true;
        Ok(())
    }

    async fn rollback(&self, context: &OnboardingContext) -> Result<(), OnboardingError> {
        context
            .stores
            .profiles
            .delete(context.request.user_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }
}

// =============================================================================
// create-role
// =============================================================================

/// Grants the requested role to the user.
struct CreateRole;

#[async_trait::async_trait]
impl OnboardingStep for CreateRole {
    fn name(&self) -> &'static str {
        "create-role"
    }

    async fn execute(&self, context: &mut OnboardingContext) -> Result<(), OnboardingError> {
        let assignment = RoleAssignment::new(
            context.request.user_id,
            context.request.role,
            context.request.user_id,
        );
        context
            .stores
            .roles
            .create(&assignment)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))?;
        context.assignment_id = Some(assignment.id);
        Ok(())
    }

    async fn rollback(&self, context: &OnboardingContext) -> Result<(), OnboardingError> {
        let Some(assignment_id) = context.assignment_id else {
            return Ok(());
        };
        context
            .stores
            .roles
            .delete(assignment_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }
}

// =============================================================================
// create-organization
// =============================================================================

/// Creates the organization when the user is founding a practice.
struct CreateOrganization;

#[async_trait::async_trait]
impl OnboardingStep for CreateOrganization {
    fn name(&self) -> &'static str {
        "create-organization"
    }

    fn applies(&self, context: &OnboardingContext) -> bool {
        context.request.clinic.is_some()
    }

    async fn execute(&self, context: &mut OnboardingContext) -> Result<(), OnboardingError> {
        let Some(setup) = context.request.clinic.as_ref() else {
            return Ok(());
        };
        let organization =
            Organization::new(setup.organization_name.clone(), context.request.user_id);
        context
            .stores
            .clinics
            .create_organization(&organization)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))?;
        context.organization_id = Some(organization.id);
        Ok(())
    }

    async fn rollback(&self, context: &OnboardingContext) -> Result<(), OnboardingError> {
        let Some(organization_id) = context.organization_id else {
            return Ok(());
        };
        context
            .stores
            .clinics
            .delete_organization(organization_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }
}

// =============================================================================
// create-clinic
// =============================================================================

/// Creates the organization's first clinic.
struct CreateClinic;

#[async_trait::async_trait]
impl OnboardingStep for CreateClinic {
    fn name(&self) -> &'static str {
        "create-clinic"
    }

    fn applies(&self, context: &OnboardingContext) -> bool {
        context.request.clinic.is_some()
    }

    async fn execute(&self, context: &mut OnboardingContext) -> Result<(), OnboardingError> {
        let (Some(setup), Some(organization_id)) =
            (context.request.clinic.as_ref(), context.organization_id)
        else {
            return Err(OnboardingError::validation(
                self.name(),
                "clinic step ran without an organization",
            ));
        };
        let clinic = Clinic::new(organization_id, setup.clinic_name.clone());
        context
            .stores
            .clinics
            .create_clinic(&clinic)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))?;
        context.clinic_id = Some(clinic.id);
        Ok(())
    }

    async fn rollback(&self, context: &OnboardingContext) -> Result<(), OnboardingError> {
        let Some(clinic_id) = context.clinic_id else {
            return Ok(());
        };
        context
            .stores
            .clinics
            .delete_clinic(clinic_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }
}

// =============================================================================
// assign-clinic-to-role
// =============================================================================

/// Scopes the freshly granted role to the new clinic.
struct AssignClinicToRole;

#[async_trait::async_trait]
impl OnboardingStep for AssignClinicToRole {
    fn name(&self) -> &'static str {
        "assign-clinic-to-role"
    }

    fn applies(&self, context: &OnboardingContext) -> bool {
        context.request.clinic.is_some()
    }

    async fn execute(&self, context: &mut OnboardingContext) -> Result<(), OnboardingError> {
        let (Some(assignment_id), Some(clinic_id)) = (context.assignment_id, context.clinic_id)
        else {
            return Err(OnboardingError::validation(
                self.name(),
                "role scoping ran before role and clinic creation",
            ));
        };
        context
            .stores
            .roles
            .set_clinic(assignment_id, clinic_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }

    async fn rollback(&self, context: &OnboardingContext) -> Result<(), OnboardingError> {
        let Some(assignment_id) = context.assignment_id else {
            return Ok(());
        };
        context
            .stores
            .roles
            .clear_clinic(assignment_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }
}

// =============================================================================
// create-professional
// =============================================================================

/// Creates the professional record for practicing users.
struct CreateProfessional;

#[async_trait::async_trait]
impl OnboardingStep for CreateProfessional {
    fn name(&self) -> &'static str {
        "create-professional"
    }

    fn applies(&self, context: &OnboardingContext) -> bool {
        context.request.professional.is_some()
    }

    async fn execute(&self, context: &mut OnboardingContext) -> Result<(), OnboardingError> {
        let Some(setup) = context.request.professional.as_ref() else {
            return Ok(());
        };
        let mut record =
            ProfessionalRecord::new(context.request.user_id, setup.display_name.clone());
        record.specialty = setup.specialty.clone();
        context
            .stores
            .clinics
            .create_professional(&record)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))?;
        context.professional_id = Some(record.id);
        Ok(())
    }

    async fn rollback(&self, context: &OnboardingContext) -> Result<(), OnboardingError> {
        let Some(professional_id) = context.professional_id else {
            return Ok(());
        };
        context
            .stores
            .clinics
            .delete_professional(professional_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }
}

// =============================================================================
// link-professional-to-clinic
// =============================================================================

/// Links the professional record to the clinic created in this run.
struct LinkProfessionalToClinic;

#[async_trait::async_trait]
impl OnboardingStep for LinkProfessionalToClinic {
    fn name(&self) -> &'static str {
        "link-professional-to-clinic"
    }

    fn applies(&self, context: &OnboardingContext) -> bool {
        context.request.professional.is_some() && context.request.clinic.is_some()
    }

    async fn execute(&self, context: &mut OnboardingContext) -> Result<(), OnboardingError> {
        let (Some(professional_id), Some(clinic_id)) =
            (context.professional_id, context.clinic_id)
        else {
            return Err(OnboardingError::validation(
                self.name(),
                "link ran before professional and clinic creation",
            ));
        };
        context
            .stores
            .clinics
            .link_professional(professional_id, clinic_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }

    async fn rollback(&self, context: &OnboardingContext) -> Result<(), OnboardingError> {
        let Some(professional_id) = context.professional_id else {
            return Ok(());
        };
        context
            .stores
            .clinics
            .unlink_professional(professional_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }
}

// =============================================================================
// complete-onboarding
// =============================================================================

/// Flips `first_access` to `false`. Commit point of the transaction.
struct CompleteOnboarding;

#[async_trait::async_trait]
impl OnboardingStep for CompleteOnboarding {
    fn name(&self) -> &'static str {
        "complete-onboarding"
    }

    async fn execute(&self, context: &mut OnboardingContext) -> Result<(), OnboardingError> {
        context
            .stores
            .profiles
            .mark_onboarded(context.request.user_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }

    async fn rollback(&self, context: &OnboardingContext) -> Result<(), OnboardingError> {
        // Last in the sequence, so this only runs if the step list is ever
        // extended past it. Restore the first-access flag.
        let profile = context
            .stores
            .profiles
            .find_by_id(context.request.user_id)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))?;
        let Some(mut profile) = profile else {
            return Ok(());
        };
        profile.first_access = true;
        context
            .stores
            .profiles
            .update(&profile)
            .await
            .map_err(|e| OnboardingError::from_store(self.name(), e))
    }
}
