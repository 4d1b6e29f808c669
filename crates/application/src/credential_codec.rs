//! Decoding of opaque bearer credentials into identity claims.
//!
//! The client is never the signature authority: only the payload segment of
//! the token is parsed, and the backend remains responsible for rejecting
//! forged credentials. Decoding is pure; the caller supplies the clock used
//! for the expiry check.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use staffhq_core::{AppError, AppResult, SubjectId};
use staffhq_domain::{IdentityClaim, Role, SubRole};

/// Payload schema of an issued credential.
///
/// `sub`, `exp` and `role` are required; the remaining recognised fields
/// default to empty/None when absent. Unrecognised fields are ignored.
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    role: String,
    #[serde(default)]
    sub_role: Option<RawSubRole>,
    #[serde(default)]
    impersonated_by: Option<String>,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct RawSubRole {
    id: Uuid,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

/// Decodes a raw credential against the given clock.
///
/// Fails with [`AppError::MalformedCredential`] when the payload cannot be
/// parsed into the claim schema and with [`AppError::ExpiredCredential`]
/// when the embedded expiry has passed.
pub fn decode_at(raw: &str, now: DateTime<Utc>) -> AppResult<IdentityClaim> {
    let mut segments = raw.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AppError::MalformedCredential(
            "credential is not a three-segment token".to_owned(),
        ));
    };

    let payload_bytes = URL_SAFE_NO_PAD.decode(payload.as_bytes()).map_err(|error| {
        AppError::MalformedCredential(format!("payload is not base64url: {error}"))
    })?;

    let claims: RawClaims = serde_json::from_slice(&payload_bytes).map_err(|error| {
        AppError::MalformedCredential(format!("payload does not match the claim schema: {error}"))
    })?;

    let subject_id = SubjectId::parse(&claims.sub)
        .map_err(|error| AppError::MalformedCredential(format!("invalid 'sub' claim: {error}")))?;

    let role = Role::parse(&claims.role)
        .map_err(|error| AppError::MalformedCredential(format!("invalid 'role' claim: {error}")))?;

    let impersonated_by = claims
        .impersonated_by
        .as_deref()
        .map(SubjectId::parse)
        .transpose()
        .map_err(|error| {
            AppError::MalformedCredential(format!("invalid 'impersonated_by' claim: {error}"))
        })?;

    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or_else(|| {
        AppError::MalformedCredential(format!("invalid 'exp' claim: {}", claims.exp))
    })?;

    if expires_at <= now {
        return Err(AppError::ExpiredCredential(format!(
            "credential expired at {expires_at}"
        )));
    }

    Ok(IdentityClaim {
        subject_id,
        display_name: claims.name.unwrap_or_default(),
        email: claims.email,
        role,
        sub_role: claims.sub_role.map(|raw| SubRole {
            id: raw.id,
            name: raw.name,
            description: raw.description,
        }),
        impersonated_by,
        expires_at,
    })
}

/// Decodes a raw credential against the current wall clock.
pub fn decode(raw: &str) -> AppResult<IdentityClaim> {
    decode_at(raw, Utc::now())
}


#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    use staffhq_core::AppError;
    use staffhq_domain::Role;

    use super::testing::encode_claims;
    use super::{decode, decode_at};

    fn far_future() -> i64 {
        Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0)
            .single()
            .map(|at| at.timestamp())
            .unwrap_or(i64::MAX)
    }

    #[test]
    fn full_claim_set_roundtrips() {
        let subject = Uuid::new_v4();
        let operator = Uuid::new_v4();
        let sub_role_id = Uuid::new_v4();
        let raw = encode_claims(&json!({
            "sub": subject.to_string(),
            "name": "Dana Ops",
            "email": "dana@example.com",
            "role": "staff",
            "sub_role": {"id": sub_role_id, "name": "Team Lead", "description": "Shift approvals"},
            "impersonated_by": operator.to_string(),
            "exp": far_future(),
        }));

        let claim = match decode(&raw) {
            Ok(claim) => claim,
            Err(error) => panic!("decode failed: {error}"),
        };
        assert_eq!(claim.subject_id.as_uuid(), subject);
        assert_eq!(claim.role, Role::Staff);
        assert_eq!(claim.display_name, "Dana Ops");
        assert_eq!(
            claim.impersonated_by.map(|subject| subject.as_uuid()),
            Some(operator)
        );
        assert_eq!(
            claim.sub_role.as_ref().map(|sub_role| sub_role.id),
            Some(sub_role_id)
        );
    }

    #[test]
    fn missing_optionals_default_to_empty() {
        let raw = encode_claims(&json!({
            "sub": Uuid::new_v4().to_string(),
            "role": "admin",
            "exp": far_future(),
        }));

        let claim = match decode(&raw) {
            Ok(claim) => claim,
            Err(error) => panic!("decode failed: {error}"),
        };
        assert_eq!(claim.display_name, "");
        assert_eq!(claim.email, None);
        assert!(claim.sub_role.is_none());
        assert!(claim.impersonated_by.is_none());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let raw = encode_claims(&json!({
            "sub": Uuid::new_v4().to_string(),
            "role": "admin",
            "exp": far_future(),
            "iss": "staffhq",
            "tenant": "acme",
        }));

        assert!(decode(&raw).is_ok());
    }

    #[test]
    fn two_segment_token_is_malformed() {
        let result = decode("header.payload");
        assert!(matches!(result, Err(AppError::MalformedCredential(_))));
    }

    #[test]
    fn non_json_payload_is_malformed() {
        let result = decode("aGVhZGVy.bm90LWpzb24.sig");
        assert!(matches!(result, Err(AppError::MalformedCredential(_))));
    }

    #[test]
    fn unknown_role_is_malformed() {
        let raw = encode_claims(&json!({
            "sub": Uuid::new_v4().to_string(),
            "role": "superuser",
            "exp": far_future(),
        }));

        assert!(matches!(
            decode(&raw),
            Err(AppError::MalformedCredential(_))
        ));
    }

    #[test]
    fn missing_expiry_is_malformed() {
        let raw = encode_claims(&json!({
            "sub": Uuid::new_v4().to_string(),
            "role": "staff",
        }));

        assert!(matches!(
            decode(&raw),
            Err(AppError::MalformedCredential(_))
        ));
    }

    #[test]
    fn past_expiry_is_expired() {
        let expired_at = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single();
        let raw = encode_claims(&json!({
            "sub": Uuid::new_v4().to_string(),
            "role": "staff",
            "exp": expired_at.map(|at| at.timestamp()).unwrap_or_default(),
        }));

        assert!(matches!(decode(&raw), Err(AppError::ExpiredCredential(_))));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let boundary = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).single();
        let Some(boundary) = boundary else {
            panic!("invalid boundary timestamp");
        };
        let raw = encode_claims(&json!({
            "sub": Uuid::new_v4().to_string(),
            "role": "staff",
            "exp": boundary.timestamp(),
        }));

        assert!(matches!(
            decode_at(&raw, boundary),
            Err(AppError::ExpiredCredential(_))
        ));
    }
}
