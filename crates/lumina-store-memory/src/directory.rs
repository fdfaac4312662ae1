//! In-memory directory backend.
//!
//! One [`InMemoryDirectory`] implements all three storage traits over
//! dashmap concurrent maps, with the same conflict semantics a relational
//! backend would enforce through unique constraints.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use lumina_auth::error::FetchError;
use lumina_auth::storage::{
    Clinic, ClinicStorage, FetchResult, Organization, ProfessionalRecord, ProfileStorage,
    RoleAssignment, RoleStorage, UserProfile,
};
use lumina_core::{ClinicId, OrganizationId, UserId};

/// In-memory implementation of the profile, role and clinic stores.
#[derive(Default)]
pub struct InMemoryDirectory {
    profiles: DashMap<UserId, UserProfile>,
    assignments: DashMap<Uuid, RoleAssignment>,
    organizations: DashMap<OrganizationId, Organization>,
    clinics: DashMap<ClinicId, Clinic>,
    professionals: DashMap<Uuid, ProfessionalRecord>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles.
    #[must_use]
    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    /// Number of stored role assignments.
    #[must_use]
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// Number of stored organizations.
    #[must_use]
    pub fn organization_count(&self) -> usize {
        self.organizations.len()
    }

    /// Number of stored clinics.
    #[must_use]
    pub fn clinic_count(&self) -> usize {
        self.clinics.len()
    }

    /// Number of stored professional records.
    #[must_use]
    pub fn professional_count(&self) -> usize {
        self.professionals.len()
    }
}

// =============================================================================
// Profile Storage
// =============================================================================

#[async_trait]
impl ProfileStorage for InMemoryDirectory {
    async fn find_by_id(&self, user_id: UserId) -> FetchResult<Option<UserProfile>> {
        Ok(self.profiles.get(&user_id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, profile: &UserProfile) -> FetchResult<()> {
        if self.profiles.contains_key(&profile.id) {
            return Err(FetchError::conflict(format!(
                "profile {} already exists",
                profile.id
            )));
        }
        self.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn update(&self, profile: &UserProfile) -> FetchResult<()> {
        match self.profiles.get_mut(&profile.id) {
            Some(mut entry) => {
                *entry = profile.clone();
                Ok(())
            }
            None => Err(FetchError::not_found(format!("profile {}", profile.id))),
        }
    }

    async fn delete(&self, user_id: UserId) -> FetchResult<()> {
        self.profiles.remove(&user_id);
        Ok(())
    }

    async fn mark_onboarded(&self, user_id: UserId) -> FetchResult<()> {
        match self.profiles.get_mut(&user_id) {
            Some(mut entry) => {
                entry.first_access = false;
                entry.updated_at = OffsetDateTime::now_utc();
                Ok(())
            }
            None => Err(FetchError::not_found(format!("profile {user_id}"))),
        }
    }
}

// =============================================================================
// Role Storage
// =============================================================================

#[async_trait]
impl RoleStorage for InMemoryDirectory {
    async fn find_active_by_user(&self, user_id: UserId) -> FetchResult<Vec<RoleAssignment>> {
        Ok(self
            .assignments
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.active)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn create(&self, assignment: &RoleAssignment) -> FetchResult<()> {
        let duplicate = self.assignments.iter().any(|entry| {
            entry.user_id == assignment.user_id
                && entry.role == assignment.role
                && entry.clinic_id == assignment.clinic_id
                && entry.active
        });
        if duplicate {
            return Err(FetchError::conflict(format!(
                "user {} already holds role {}",
                assignment.user_id, assignment.role
            )));
        }
        self.assignments.insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn set_clinic(&self, assignment_id: Uuid, clinic_id: ClinicId) -> FetchResult<()> {
        match self.assignments.get_mut(&assignment_id) {
            Some(mut entry) => {
                entry.clinic_id = Some(clinic_id);
                Ok(())
            }
            None => Err(FetchError::not_found(format!(
                "role assignment {assignment_id}"
            ))),
        }
    }

    async fn clear_clinic(&self, assignment_id: Uuid) -> FetchResult<()> {
        if let Some(mut entry) = self.assignments.get_mut(&assignment_id) {
            entry.clinic_id = None;
        }
        Ok(())
    }

    async fn delete(&self, assignment_id: Uuid) -> FetchResult<()> {
        self.assignments.remove(&assignment_id);
        Ok(())
    }
}

// =============================================================================
// Clinic Storage
// =============================================================================

#[async_trait]
impl ClinicStorage for InMemoryDirectory {
    async fn create_organization(&self, organization: &Organization) -> FetchResult<()> {
        if self.organizations.contains_key(&organization.id) {
            return Err(FetchError::conflict(format!(
                "organization {} already exists",
                organization.id
            )));
        }
        self.organizations
            .insert(organization.id, organization.clone());
        Ok(())
    }

    async fn delete_organization(&self, organization_id: OrganizationId) -> FetchResult<()> {
        self.organizations.remove(&organization_id);
        Ok(())
    }

    async fn create_clinic(&self, clinic: &Clinic) -> FetchResult<()> {
        if !self.organizations.contains_key(&clinic.organization_id) {
            return Err(FetchError::not_found(format!(
                "organization {}",
                clinic.organization_id
            )));
        }
        if self.clinics.contains_key(&clinic.id) {
            return Err(FetchError::conflict(format!(
                "clinic {} already exists",
                clinic.id
            )));
        }
        self.clinics.insert(clinic.id, clinic.clone());
        Ok(())
    }

    async fn delete_clinic(&self, clinic_id: ClinicId) -> FetchResult<()> {
        self.clinics.remove(&clinic_id);
        Ok(())
    }

    async fn create_professional(&self, professional: &ProfessionalRecord) -> FetchResult<()> {
        if self.professionals.contains_key(&professional.id) {
            return Err(FetchError::conflict(format!(
                "professional record {} already exists",
                professional.id
            )));
        }
        self.professionals
            .insert(professional.id, professional.clone());
        Ok(())
    }

    async fn delete_professional(&self, professional_id: Uuid) -> FetchResult<()> {
        self.professionals.remove(&professional_id);
        Ok(())
    }

    async fn link_professional(
        &self,
        professional_id: Uuid,
        clinic_id: ClinicId,
    ) -> FetchResult<()> {
        match self.professionals.get_mut(&professional_id) {
            Some(mut entry) => {
                entry.clinic_id = Some(clinic_id);
                Ok(())
            }
            None => Err(FetchError::not_found(format!(
                "professional record {professional_id}"
            ))),
        }
    }

    async fn unlink_professional(&self, professional_id: Uuid) -> FetchResult<()> {
        if let Some(mut entry) = self.professionals.get_mut(&professional_id) {
            entry.clinic_id = None;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_auth::storage::Role;

    #[tokio::test]
    async fn test_profile_create_find_update() {
        let directory = InMemoryDirectory::new();
        let user = UserId::generate();
        let profile = UserProfile::new(user, "Ana Souza", "ana@clinic.example");

        ProfileStorage::create(&directory, &profile).await.unwrap();
        let found = directory.find_by_id(user).await.unwrap().unwrap();
        assert_eq!(found, profile);

        let updated = found.onboarded();
        directory.update(&updated).await.unwrap();
        let found = directory.find_by_id(user).await.unwrap().unwrap();
        assert!(!found.first_access);
    }

    #[tokio::test]
    async fn test_duplicate_profile_is_a_conflict() {
        let directory = InMemoryDirectory::new();
        let profile = UserProfile::new(UserId::generate(), "Ana Souza", "ana@clinic.example");

        ProfileStorage::create(&directory, &profile).await.unwrap();
        let err = ProfileStorage::create(&directory, &profile)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_profile_delete_is_idempotent() {
        let directory = InMemoryDirectory::new();
        let user = UserId::generate();
        // Deleting a profile that never existed must not error.
        ProfileStorage::delete(&directory, user).await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_onboarded_requires_profile() {
        let directory = InMemoryDirectory::new();
        let err = directory.mark_onboarded(UserId::generate()).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_active_assignments_only() {
        let directory = InMemoryDirectory::new();
        let user = UserId::generate();
        let active = RoleAssignment::new(user, Role::Owner, user);
        let inactive = RoleAssignment::new(user, Role::Client, user).with_active(false);

        RoleStorage::create(&directory, &active).await.unwrap();
        RoleStorage::create(&directory, &inactive).await.unwrap();

        let found = directory.find_active_by_user(user).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].role, Role::Owner);
    }

    #[tokio::test]
    async fn test_duplicate_active_grant_is_a_conflict() {
        let directory = InMemoryDirectory::new();
        let user = UserId::generate();
        let first = RoleAssignment::new(user, Role::Owner, user);
        let second = RoleAssignment::new(user, Role::Owner, user);

        RoleStorage::create(&directory, &first).await.unwrap();
        let err = RoleStorage::create(&directory, &second).await.unwrap_err();
        assert!(matches!(err, FetchError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_set_and_clear_clinic_scope() {
        let directory = InMemoryDirectory::new();
        let user = UserId::generate();
        let assignment = RoleAssignment::new(user, Role::Owner, user);
        RoleStorage::create(&directory, &assignment).await.unwrap();

        let clinic = ClinicId::generate();
        directory.set_clinic(assignment.id, clinic).await.unwrap();
        let found = directory.find_active_by_user(user).await.unwrap();
        assert_eq!(found[0].clinic_id, Some(clinic));

        directory.clear_clinic(assignment.id).await.unwrap();
        let found = directory.find_active_by_user(user).await.unwrap();
        assert!(found[0].clinic_id.is_none());
    }

    #[tokio::test]
    async fn test_clinic_requires_existing_organization() {
        let directory = InMemoryDirectory::new();
        let orphan = Clinic::new(OrganizationId::generate(), "Unidade Centro");
        let err = directory.create_clinic(&orphan).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_professional_link_cycle() {
        let directory = InMemoryDirectory::new();
        let owner = UserId::generate();
        let organization = Organization::new("Espaço Beleza", owner);
        directory.create_organization(&organization).await.unwrap();
        let clinic = Clinic::new(organization.id, "Unidade Centro");
        directory.create_clinic(&clinic).await.unwrap();

        let record = ProfessionalRecord::new(owner, "Dra. Ana");
        directory.create_professional(&record).await.unwrap();
        directory
            .link_professional(record.id, clinic.id)
            .await
            .unwrap();

        directory.unlink_professional(record.id).await.unwrap();
        directory.delete_professional(record.id).await.unwrap();
        assert_eq!(directory.professional_count(), 0);
    }
}
