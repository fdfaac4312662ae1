//! Storage traits for profile, role and clinic data.
//!
//! This module defines the data-store boundary of the subsystem:
//!
//! - User profiles (one row per user, keyed by the session subject id)
//! - Role assignments (zero or more per user, tenant-scoped)
//! - Organizations, clinics and professional records
//!
//! The store is expected to enforce row-level access rules itself; callers
//! here never re-implement tenancy checks.
//!
//! # Implementations
//!
//! Storage implementations are provided in separate crates:
//!
//! - `lumina-store-memory` - in-memory reference backend

pub mod clinic;
pub mod profile;
pub mod role;

pub use clinic::{Clinic, ClinicStorage, Organization, ProfessionalRecord};
pub use profile::{ProfileStorage, UserProfile};
pub use role::{Role, RoleAssignment, RoleStorage, highest_privilege};

use crate::error::FetchError;

/// Type alias for data-store results.
pub type FetchResult<T> = Result<T, FetchError>;
