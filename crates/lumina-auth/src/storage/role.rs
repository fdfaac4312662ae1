//! Role model and role-assignment storage trait.
//!
//! Roles form a closed set with a total privilege order. A user may hold
//! several assignments at once (owner of clinic A, professional at clinic B);
//! tenancy is carried by the assignment's clinic id and enforced by the
//! store's row-level access rules.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use lumina_core::{ClinicId, OrganizationId, UserId};

use super::FetchResult;
use crate::error::FetchError;

// =============================================================================
// Role
// =============================================================================

/// Application roles, highest privilege first.
///
/// Wire names keep the data model's original Portuguese strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Platform operator.
    #[serde(rename = "super_admin")]
    SuperAdmin,

    /// Practice owner.
    #[serde(rename = "proprietaria")]
    Owner,

    /// Clinic manager.
    #[serde(rename = "gerente")]
    Manager,

    /// Healthcare/aesthetics professional.
    #[serde(rename = "profissionais")]
    Professional,

    /// Front-desk receptionist.
    #[serde(rename = "recepcionistas")]
    Receptionist,

    /// Read-only visitor.
    #[serde(rename = "visitante")]
    Visitor,

    /// End client of the practice.
    #[serde(rename = "cliente")]
    Client,
}

/// All roles in descending privilege order.
pub const PRIVILEGE_ORDER: [Role; 7] = [
    Role::SuperAdmin,
    Role::Owner,
    Role::Manager,
    Role::Professional,
    Role::Receptionist,
    Role::Visitor,
    Role::Client,
];

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Owner => "proprietaria",
            Self::Manager => "gerente",
            Self::Professional => "profissionais",
            Self::Receptionist => "recepcionistas",
            Self::Visitor => "visitante",
            Self::Client => "cliente",
        }
    }

    /// Privilege rank; lower is more privileged.
    #[must_use]
    pub fn privilege_rank(&self) -> usize {
        PRIVILEGE_ORDER
            .iter()
            .position(|role| role == self)
            .unwrap_or(PRIVILEGE_ORDER.len())
    }

    /// Returns `true` if `self` outranks or equals `other`.
    #[must_use]
    pub fn outranks(&self, other: &Role) -> bool {
        self.privilege_rank() <= other.privilege_rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PRIVILEGE_ORDER
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| FetchError::invalid(format!("unknown role '{s}'")))
    }
}

/// Highest-privilege role among the user's active assignments.
///
/// Walks the fixed descending order and returns the first role held. Used
/// for display and default-landing purposes only, never for access control.
#[must_use]
pub fn highest_privilege(assignments: &[RoleAssignment]) -> Option<Role> {
    PRIVILEGE_ORDER.into_iter().find(|role| {
        assignments
            .iter()
            .any(|a| a.active && a.role == *role)
    })
}

// =============================================================================
// Role Assignment
// =============================================================================

/// A (user, role, tenant-scope) grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Unique identifier of the grant row.
    pub id: Uuid,

    /// The user holding the role.
    pub user_id: UserId,

    /// The granted role.
    pub role: Role,

    /// Organization scope, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrganizationId>,

    /// Clinic scope, if any. Carries multi-tenant scoping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<ClinicId>,

    /// Inactive assignments grant nothing.
    pub active: bool,

    /// Who created the grant.
    pub created_by: UserId,

    /// When the grant was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl RoleAssignment {
    /// Creates an active, unscoped assignment.
    #[must_use]
    pub fn new(user_id: UserId, role: Role, created_by: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role,
            organization_id: None,
            clinic_id: None,
            active: true,
            created_by,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Sets the organization scope.
    #[must_use]
    pub fn with_organization(mut self, organization_id: OrganizationId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    /// Sets the clinic scope.
    #[must_use]
    pub fn with_clinic(mut self, clinic_id: ClinicId) -> Self {
        self.clinic_id = Some(clinic_id);
        self
    }

    /// Sets whether the assignment is active.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

// =============================================================================
// Role Storage Trait
// =============================================================================

/// Storage operations for role assignments.
#[async_trait]
pub trait RoleStorage: Send + Sync {
    /// All active assignments held by the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_active_by_user(&self, user_id: UserId) -> FetchResult<Vec<RoleAssignment>>;

    /// Create a new assignment.
    ///
    /// # Errors
    ///
    /// Returns a conflict error if an identical grant already exists, or an
    /// error if the storage operation fails.
    async fn create(&self, assignment: &RoleAssignment) -> FetchResult<()>;

    /// Attach a clinic scope to an existing assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the assignment doesn't exist or the storage
    /// operation fails.
    async fn set_clinic(&self, assignment_id: Uuid, clinic_id: ClinicId) -> FetchResult<()>;

    /// Remove the clinic scope from an assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Clearing an absent
    /// scope is not an error (the undo must be idempotent).
    async fn clear_clinic(&self, assignment_id: Uuid) -> FetchResult<()>;

    /// Delete an assignment.
    ///
    /// Only used to undo a provisioning write.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Deleting an absent
    /// assignment is not an error (the undo must be idempotent).
    async fn delete(&self, assignment_id: Uuid) -> FetchResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names_round_trip() {
        for role in PRIVILEGE_ORDER {
            let parsed: Role = role.as_str().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = "auditor".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("auditor"));
    }

    #[test]
    fn test_privilege_order_is_total() {
        assert!(Role::SuperAdmin.outranks(&Role::Owner));
        assert!(Role::Owner.outranks(&Role::Manager));
        assert!(Role::Manager.outranks(&Role::Professional));
        assert!(Role::Professional.outranks(&Role::Receptionist));
        assert!(Role::Receptionist.outranks(&Role::Visitor));
        assert!(Role::Visitor.outranks(&Role::Client));
        assert!(!Role::Client.outranks(&Role::SuperAdmin));
    }

    #[test]
    fn test_highest_privilege_walks_descending_order() {
        let user = UserId::generate();
        let assignments = vec![
            RoleAssignment::new(user, Role::Client, user),
            RoleAssignment::new(user, Role::Manager, user),
            RoleAssignment::new(user, Role::Receptionist, user),
        ];
        assert_eq!(highest_privilege(&assignments), Some(Role::Manager));
    }

    #[test]
    fn test_highest_privilege_ignores_inactive() {
        let user = UserId::generate();
        let assignments = vec![
            RoleAssignment::new(user, Role::Owner, user).with_active(false),
            RoleAssignment::new(user, Role::Client, user),
        ];
        assert_eq!(highest_privilege(&assignments), Some(Role::Client));
        assert_eq!(highest_privilege(&[]), None);
    }

    #[test]
    fn test_role_serde_uses_wire_names() {
        let json = serde_json::to_string(&Role::Owner).unwrap();
        assert_eq!(json, "\"proprietaria\"");
        let role: Role = serde_json::from_str("\"profissionais\"").unwrap();
        assert_eq!(role, Role::Professional);
    }

    #[test]
    fn test_assignment_builder() {
        let user = UserId::generate();
        let clinic = ClinicId::generate();
        let assignment = RoleAssignment::new(user, Role::Owner, user).with_clinic(clinic);
        assert_eq!(assignment.user_id, user);
        assert_eq!(assignment.clinic_id, Some(clinic));
        assert!(assignment.active);
    }
}
