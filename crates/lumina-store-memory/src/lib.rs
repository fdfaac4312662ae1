//! In-memory identity and storage backend for Lumina.
//!
//! This crate provides in-memory implementations of the `lumina-auth`
//! traits, using dashmap concurrent maps. It is the reference backend for
//! tests and local development.
//!
//! # Example
//!
//! ```ignore
//! use lumina_store_memory::{InMemoryDirectory, InMemoryIdentityProvider};
//! use lumina_auth::Credentials;
//!
//! let identity = InMemoryIdentityProvider::new();
//! let user_id = identity.register("ana@clinic.example", "secret");
//!
//! let session = identity
//!     .sign_in(&Credentials::new("ana@clinic.example", "secret"))
//!     .await?;
//! ```

pub mod directory;
pub mod identity;

pub use directory::InMemoryDirectory;
pub use identity::InMemoryIdentityProvider;

use std::sync::Arc;

use lumina_auth::OnboardingStores;

/// Bundles one shared in-memory directory into the orchestrator's store set.
#[must_use]
pub fn onboarding_stores(directory: Arc<InMemoryDirectory>) -> OnboardingStores {
    OnboardingStores {
        profiles: Arc::clone(&directory) as Arc<dyn lumina_auth::ProfileStorage>,
        roles: Arc::clone(&directory) as Arc<dyn lumina_auth::RoleStorage>,
        clinics: directory as Arc<dyn lumina_auth::ClinicStorage>,
    }
}
