use ep_types::TextError;

/// Hard failures in the submitted profile header.
///
/// Object-level problems (a bad Stream, an orphaned Scenario) never surface here; they are
/// reported as [`crate::form::Rejection`] diagnostics instead.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid title: {0}")]
    InvalidTitle(TextError),
    #[error("invalid slug: {0}")]
    InvalidSlug(TextError),
    #[error("invalid confidence judgement score: {0:?}")]
    InvalidScore(String),
}

/// Failures raised by a [`crate::persistence::ProfileStore`].
///
/// Any of these aborts the enclosing write; nothing from the failed plan is kept.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{table} row {id} does not belong to evidence profile {profile_id}")]
    ForeignRow {
        table: &'static str,
        id: i64,
        profile_id: i64,
    },
    #[error("evidence profile {0} not found")]
    ProfileNotFound(i64),
    #[error("slug {slug:?} is already used by another evidence profile in assessment {assessment_id}")]
    SlugConflict { assessment_id: i64, slug: String },
    #[error("failed to serialize row: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize row: {0}")]
    Deserialization(serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Failures while loading the lookup tables.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("failed to read lookups file: {0}")]
    FileRead(std::io::Error),
    #[error("lookups schema mismatch at {path}: {message}")]
    Schema { path: String, message: String },
    #[error("duplicate {table} key {key}")]
    DuplicateKey { table: &'static str, key: i64 },
    #[error("lookup table {0} is empty")]
    EmptyTable(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid form: {0}")]
    Form(#[from] FormError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),
    #[error("evidence profile {slug:?} not found in assessment {assessment_id}")]
    NotFound { assessment_id: i64, slug: String },
    #[error("URL name {0:?} must be unique for this assessment")]
    SlugTaken(String),
}

pub type ProfileResult<T> = std::result::Result<T, ProfileError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
