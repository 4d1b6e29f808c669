//! Identity claims decoded from bearer credentials.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use staffhq_core::{AppError, AppResult, SubjectId};
use uuid::Uuid;

/// Coarse role carried by every identity claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Operator with access to administrative surfaces, including
    /// impersonation.
    Admin,
    /// Regular employee account.
    Staff,
}

impl Role {
    /// Returns a stable transport value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
        }
    }

    /// Parses a transport value into a role.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            _ => Err(AppError::Validation(format!("unknown role '{value}'"))),
        }
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Staff specialisation beneath the coarse role (team lead, HR clerk, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRole {
    /// Stable sub-role identifier.
    pub id: Uuid,
    /// Display name of the sub-role.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
}

/// Opaque bearer credential issued by the backend.
///
/// Presented on every authenticated request; never inspected outside the
/// credential codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential(String);

impl Credential {
    /// Creates a credential from its raw transport string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "credential must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the raw credential string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Credential> for String {
    fn from(value: Credential) -> Self {
        value.0
    }
}

/// Decoded, structured representation of the authenticated subject.
///
/// Immutable once decoded: a new credential produces a new claim, never a
/// mutation of an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    /// Stable subject identifier.
    pub subject_id: SubjectId,
    /// Display name, empty when the token carries none.
    pub display_name: String,
    /// Email address, if the token carries one.
    pub email: Option<String>,
    /// Coarse role of the subject.
    pub role: Role,
    /// Staff specialisation, if any.
    pub sub_role: Option<SubRole>,
    /// Subject of the operator who initiated impersonation, when this claim
    /// was issued for an impersonated session.
    pub impersonated_by: Option<SubjectId>,
    /// Embedded credential expiry.
    pub expires_at: DateTime<Utc>,
}

impl IdentityClaim {
    /// Whether this claim belongs to an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this claim was issued for an impersonated session.
    #[must_use]
    pub fn is_impersonated(&self) -> bool {
        self.impersonated_by.is_some()
    }

    /// Whether the claim satisfies a role requirement.
    ///
    /// Sub-role holders group under [`Role::Staff`]: a claim with any
    /// sub-role satisfies a `Staff` requirement regardless of how the
    /// specialisation is named.
    #[must_use]
    pub fn matches_role(&self, required: &BTreeSet<Role>) -> bool {
        if required.contains(&self.role) {
            return true;
        }

        self.sub_role.is_some() && required.contains(&Role::Staff)
    }
}

/// Persisted side-channel that survives a credential swap during
/// impersonation.
///
/// Exists if and only if the active session's claim carries
/// `impersonated_by`; holds everything needed to restore the original
/// operator later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpersonationRecord {
    /// Always true while the record exists; persisted for the storage
    /// contract.
    pub impersonating: bool,
    /// Credential of the operator who started the impersonation.
    pub original_credential: Credential,
    /// Subject being impersonated.
    pub target: SubjectId,
}

impl ImpersonationRecord {
    /// Creates the record captured at the start of an impersonation.
    #[must_use]
    pub fn new(original_credential: Credential, target: SubjectId) -> Self {
        Self {
            impersonating: true,
            original_credential,
            target,
        }
    }
}
