//! Shared primitives for all Rust crates in StaffHQ.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type used across StaffHQ crates.
pub type AppResult<T> = Result<T, AppError>;

/// Stable identifier of an authenticated subject (a user account).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(Uuid);

impl SubjectId {
    /// Creates a random subject identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a subject identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Parses a subject identifier from its string form.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid subject id: {error}")))
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SubjectId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A credential could not be parsed into an identity claim.
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// A credential's embedded expiry has passed.
    #[error("expired credential: {0}")]
    ExpiredCredential(String),

    /// The subject is not allowed to perform the requested action.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Impersonation was started or ended from an invalid state.
    #[error("invalid impersonation state: {0}")]
    ImpersonationStateInvalid(String),

    /// A backend round-trip failed; local state is unchanged.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Persisted local state could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error invalidates the current credential and must force
    /// a fresh login.
    #[must_use]
    pub fn is_credential_terminal(&self) -> bool {
        matches!(
            self,
            Self::MalformedCredential(_) | Self::ExpiredCredential(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, SubjectId};

    #[test]
    fn subject_id_formats_as_uuid() {
        let subject_id = SubjectId::new();
        assert_eq!(subject_id.to_string().len(), 36);
    }

    #[test]
    fn subject_id_rejects_non_uuid_input() {
        assert!(SubjectId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn subject_id_roundtrips_through_string_form() {
        let subject_id = SubjectId::new();
        let parsed = SubjectId::parse(&subject_id.to_string());
        assert_eq!(parsed.unwrap_or_default(), subject_id);
    }

    #[test]
    fn credential_errors_are_terminal() {
        assert!(AppError::ExpiredCredential("exp".to_owned()).is_credential_terminal());
        assert!(AppError::MalformedCredential("bad".to_owned()).is_credential_terminal());
        assert!(!AppError::NetworkFailure("timeout".to_owned()).is_credential_terminal());
    }
}
