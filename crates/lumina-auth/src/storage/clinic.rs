//! Organization, clinic and professional-record storage trait.
//!
//! These rows are created by the onboarding flow: an owner provisions an
//! organization with its first clinic; a professional gets a professional
//! record, optionally linked to the clinic that employs them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use lumina_core::{ClinicId, OrganizationId, UserId};

use super::FetchResult;

// =============================================================================
// Organization
// =============================================================================

/// The billing/ownership tenant. Owns one or more clinics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier.
    pub id: OrganizationId,

    /// Display name.
    pub name: String,

    /// The owning user.
    pub owner_id: UserId,

    /// When the organization was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Organization {
    /// Creates a new organization owned by the given user.
    #[must_use]
    pub fn new(name: impl Into<String>, owner_id: UserId) -> Self {
        Self {
            id: OrganizationId::generate(),
            name: name.into(),
            owner_id,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

// =============================================================================
// Clinic
// =============================================================================

/// A physical clinic within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinic {
    /// Unique identifier.
    pub id: ClinicId,

    /// Owning organization.
    pub organization_id: OrganizationId,

    /// Display name.
    pub name: String,

    /// When the clinic was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Clinic {
    /// Creates a new clinic inside the given organization.
    #[must_use]
    pub fn new(organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id: ClinicId::generate(),
            organization_id,
            name: name.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

// =============================================================================
// Professional Record
// =============================================================================

/// A practicing professional, optionally linked to the clinic employing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalRecord {
    /// Unique identifier of the record.
    pub id: Uuid,

    /// The user behind the record.
    pub user_id: UserId,

    /// Clinic the professional works at, once linked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<ClinicId>,

    /// Name shown on schedules.
    pub display_name: String,

    /// Specialty, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,

    /// Inactive records are hidden from scheduling.
    pub active: bool,

    /// When the record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ProfessionalRecord {
    /// Creates an active, unlinked professional record.
    #[must_use]
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            clinic_id: None,
            display_name: display_name.into(),
            specialty: None,
            active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Sets the specialty.
    #[must_use]
    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }
}

// =============================================================================
// Clinic Storage Trait
// =============================================================================

/// Storage operations for organizations, clinics and professional records.
#[async_trait]
pub trait ClinicStorage: Send + Sync {
    /// Create a new organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create_organization(&self, organization: &Organization) -> FetchResult<()>;

    /// Delete an organization.
    ///
    /// Only used to undo a provisioning write.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Deleting an absent
    /// organization is not an error (the undo must be idempotent).
    async fn delete_organization(&self, organization_id: OrganizationId) -> FetchResult<()>;

    /// Create a new clinic.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create_clinic(&self, clinic: &Clinic) -> FetchResult<()>;

    /// Delete a clinic.
    ///
    /// Only used to undo a provisioning write.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Deleting an absent
    /// clinic is not an error (the undo must be idempotent).
    async fn delete_clinic(&self, clinic_id: ClinicId) -> FetchResult<()>;

    /// Create a new professional record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create_professional(&self, professional: &ProfessionalRecord) -> FetchResult<()>;

    /// Delete a professional record.
    ///
    /// Only used to undo a provisioning write.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Deleting an absent
    /// record is not an error (the undo must be idempotent).
    async fn delete_professional(&self, professional_id: Uuid) -> FetchResult<()>;

    /// Link a professional record to a clinic.
    ///
    /// # Errors
    ///
    /// Returns an error if the record doesn't exist or the storage operation
    /// fails.
    async fn link_professional(&self, professional_id: Uuid, clinic_id: ClinicId)
    -> FetchResult<()>;

    /// Remove a professional record's clinic link.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Unlinking an absent
    /// link is not an error (the undo must be idempotent).
    async fn unlink_professional(&self, professional_id: Uuid) -> FetchResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_new() {
        let owner = UserId::generate();
        let org = Organization::new("Espaço Beleza", owner);
        assert_eq!(org.name, "Espaço Beleza");
        assert_eq!(org.owner_id, owner);
    }

    #[test]
    fn test_clinic_belongs_to_organization() {
        let org = Organization::new("Espaço Beleza", UserId::generate());
        let clinic = Clinic::new(org.id, "Unidade Centro");
        assert_eq!(clinic.organization_id, org.id);
    }

    #[test]
    fn test_professional_record_builder() {
        let user = UserId::generate();
        let record = ProfessionalRecord::new(user, "Dra. Ana").with_specialty("dermatology");
        assert_eq!(record.user_id, user);
        assert_eq!(record.specialty.as_deref(), Some("dermatology"));
        assert!(record.clinic_id.is_none());
        assert!(record.active);
    }
}
