//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handlers never read environment variables; the binary
//! reads them once and builds a [`CoreConfig`].

use crate::form::DuplicateOrderPolicy;
use crate::lookups::Lookups;
use crate::{ProfileError, ProfileResult};
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    lookups: Arc<Lookups>,
    duplicate_order_policy: DuplicateOrderPolicy,
}

impl CoreConfig {
    pub fn new(lookups: Lookups, duplicate_order_policy: DuplicateOrderPolicy) -> Self {
        Self {
            lookups: Arc::new(lookups),
            duplicate_order_policy,
        }
    }

    pub fn lookups(&self) -> &Lookups {
        &self.lookups
    }

    pub fn duplicate_order_policy(&self) -> DuplicateOrderPolicy {
        self.duplicate_order_policy
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(Lookups::default(), DuplicateOrderPolicy::default())
    }
}

/// Load lookup tables from `path`, or fall back to the built-in tables.
pub fn load_lookups(path: Option<PathBuf>) -> ProfileResult<Lookups> {
    match path {
        Some(path) => {
            let lookups = Lookups::from_file(&path)?;
            tracing::info!(path = %path.display(), "loaded lookup tables");
            Ok(lookups)
        }
        None => Ok(Lookups::default()),
    }
}

/// Parse the duplicate-order policy from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default (last write wins).
pub fn duplicate_order_policy_from_env_value(
    value: Option<String>,
) -> ProfileResult<DuplicateOrderPolicy> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value
        .map(|v| v.parse::<DuplicateOrderPolicy>())
        .transpose()
        .map_err(ProfileError::InvalidInput)?;

    Ok(parsed.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn policy_defaults_when_unset_or_blank() {
        assert_eq!(
            duplicate_order_policy_from_env_value(None).unwrap(),
            DuplicateOrderPolicy::LastWriteWins
        );
        assert_eq!(
            duplicate_order_policy_from_env_value(Some("  ".into())).unwrap(),
            DuplicateOrderPolicy::LastWriteWins
        );
        assert_eq!(
            duplicate_order_policy_from_env_value(Some("reject".into())).unwrap(),
            DuplicateOrderPolicy::RejectDuplicates
        );
        assert!(matches!(
            duplicate_order_policy_from_env_value(Some("first-wins".into())),
            Err(ProfileError::InvalidInput(_))
        ));
    }

    #[test]
    fn lookups_fall_back_to_builtin_tables() {
        let lookups = load_lookups(None).unwrap();
        assert!(lookups.is_stream_type(1));
    }

    #[test]
    fn lookups_file_errors_propagate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "stream_types: nonsense").unwrap();
        assert!(matches!(
            load_lookups(Some(file.path().to_path_buf())),
            Err(ProfileError::Lookup(_))
        ));
    }
}
