//! # Evidence Profile Core
//!
//! Core logic for HAWC evidence profiles.
//!
//! This crate turns a flat form submission into a nested evidence profile and keeps the stored
//! copy in step with it:
//! - [`form`] parses, validates and assembles the submitted fields into a tree
//! - [`persistence`] diffs that tree against stored rows and applies the writes atomically
//! - [`service`] ties both together behind create/update/get/list/delete
//!
//! **No API concerns**: HTTP routing and request extraction belong in `api-rest`.

pub mod config;
pub mod constants;
pub mod error;
pub mod form;
pub mod lookups;
pub mod persistence;
pub mod profile;
pub mod service;

pub use config::CoreConfig;
pub use error::{
    FormError, LookupError, ProfileError, ProfileResult, StoreError, StoreResult,
};
pub use form::{FormFields, Reconstruction, RejectReason, Rejection};
pub use lookups::Lookups;
pub use persistence::{InMemoryStore, ProfileStore};
pub use profile::EvidenceProfile;
pub use service::{EvidenceProfileService, ProfileSummary, Submission};
