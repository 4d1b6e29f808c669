//! Admin-over-user impersonation control.
//!
//! Layered on the session service: begin swaps the session to a credential
//! issued for the target while the operator's own credential is parked in
//! the persisted impersonation record; end restores it. Impersonation never
//! nests: one record, one level, rejected before any network call.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use staffhq_core::{AppError, AppResult, SubjectId};
use staffhq_domain::ImpersonationRecord;

use crate::access_service::RedirectTarget;
use crate::credential_codec;
use crate::session_service::{AuthGateway, SessionRepository, SessionService};

/// Application service driving impersonation swaps.
pub struct ImpersonationService {
    session: Arc<SessionService>,
    repository: Arc<dyn SessionRepository>,
    gateway: Arc<dyn AuthGateway>,
}

impl ImpersonationService {
    /// Creates an impersonation service over the given session.
    #[must_use]
    pub fn new(
        session: Arc<SessionService>,
        repository: Arc<dyn SessionRepository>,
        gateway: Arc<dyn AuthGateway>,
    ) -> Self {
        Self {
            session,
            repository,
            gateway,
        }
    }

    /// Starts impersonating `target` and signals navigation to the staff
    /// landing page.
    ///
    /// Rejected before any network call when the caller is not an admin or
    /// an impersonation is already in progress (one level only).
    pub async fn begin(&self, target: SubjectId) -> AppResult<RedirectTarget> {
        let snapshot = self.session.snapshot();
        let (Some(identity), Some(credential)) = (snapshot.identity, snapshot.credential) else {
            return Err(AppError::PermissionDenied(
                "impersonation requires an authenticated session".to_owned(),
            ));
        };

        if identity.is_impersonated() || self.repository.load_impersonation().await?.is_some() {
            return Err(AppError::ImpersonationStateInvalid(
                "already impersonating; nested impersonation is not supported".to_owned(),
            ));
        }

        if !identity.is_admin() {
            return Err(AppError::PermissionDenied(
                "only administrators may impersonate".to_owned(),
            ));
        }

        let issued = self.gateway.impersonate(&credential, target).await?;
        let claim = credential_codec::decode_at(issued.as_str(), Utc::now())?;
        if !claim.is_impersonated() {
            return Err(AppError::MalformedCredential(
                "impersonation credential carries no impersonated_by claim".to_owned(),
            ));
        }

        let record = ImpersonationRecord::new(credential, target);
        self.repository.save_impersonation(&record).await?;
        self.session.set_credentials(claim, issued).await?;

        info!(%target, operator = %identity.subject_id, "impersonation started");
        Ok(RedirectTarget::StaffLanding)
    }

    /// Ends the impersonation, restores the operator and signals navigation
    /// to the admin landing page.
    ///
    /// When the parked operator credential no longer decodes the session
    /// cannot be trusted: everything is cleared and the error propagates so
    /// the caller forces a fresh login.
    pub async fn end(&self) -> AppResult<RedirectTarget> {
        let Some(record) = self.repository.load_impersonation().await? else {
            return Err(AppError::ImpersonationStateInvalid(
                "no impersonation is in progress".to_owned(),
            ));
        };

        match credential_codec::decode_at(record.original_credential.as_str(), Utc::now()) {
            Ok(claim) => {
                let operator = claim.subject_id;
                self.session
                    .set_credentials(claim, record.original_credential)
                    .await?;
                self.repository.clear_impersonation().await?;

                info!(%operator, target = %record.target, "impersonation ended");
                Ok(RedirectTarget::AdminLanding)
            }
            Err(error) => {
                warn!(%error, "parked operator credential no longer decodes; forcing re-login");
                if let Err(clear_error) = self.repository.clear_impersonation().await {
                    warn!(%clear_error, "failed to clear impersonation record");
                }
                self.session.logout().await?;
                Err(error)
            }
        }
    }
}
