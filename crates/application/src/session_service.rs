//! Session lifecycle ports and application service.
//!
//! Owns the process-wide authenticated identity: hydration from persisted
//! local state, explicit login, wholesale credential swaps and logout. Every
//! consumer reads through [`SessionService::snapshot`]; nothing mutates the
//! session except the operations here.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use staffhq_core::{AppError, AppResult, SubjectId};
use staffhq_domain::{Capability, Credential, IdentityClaim, ImpersonationRecord};

use crate::credential_codec;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// Persisted client-side state as loaded during hydration.
///
/// Stands in for browser local storage: credential, cached permission set
/// and the impersonation triple live side by side and are invalidated
/// together on logout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    /// Stored bearer credential, if a previous session left one behind.
    pub credential: Option<Credential>,
    /// Cached capability set from the last permission fetch.
    pub permissions: BTreeSet<Capability>,
    /// Impersonation side-channel, present only mid-impersonation.
    pub impersonation: Option<ImpersonationRecord>,
}

/// Repository port for persisted local session state.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Loads everything persisted by earlier sessions.
    async fn load(&self) -> AppResult<PersistedSession>;

    /// Stores the credential for future hydration.
    async fn save_credential(&self, credential: &Credential) -> AppResult<()>;

    /// Removes the stored credential.
    async fn clear_credential(&self) -> AppResult<()>;

    /// Replaces the cached permission set.
    async fn save_permissions(&self, permissions: &BTreeSet<Capability>) -> AppResult<()>;

    /// Stores the impersonation record.
    async fn save_impersonation(&self, record: &ImpersonationRecord) -> AppResult<()>;

    /// Loads the impersonation record, if one exists.
    async fn load_impersonation(&self) -> AppResult<Option<ImpersonationRecord>>;

    /// Removes the impersonation record.
    async fn clear_impersonation(&self) -> AppResult<()>;

    /// Removes every persisted key at once (logout).
    async fn clear_all(&self) -> AppResult<()>;
}

/// Credential issued by a successful login, together with the
/// independently sourced permission set.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    /// Bearer credential for the authenticated subject.
    pub credential: Credential,
    /// Capability strings granted to the subject.
    pub permissions: BTreeSet<Capability>,
}

/// Backend port for credential issuance.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchanges email and password for a credential and permission set.
    async fn login(&self, email: &str, password: &str) -> AppResult<LoginGrant>;

    /// Requests a credential scoped to `target` acting as the caller.
    ///
    /// The backend is the authority on the admin-only requirement.
    async fn impersonate(
        &self,
        credential: &Credential,
        target: SubjectId,
    ) -> AppResult<Credential>;
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle phase of the session.
///
/// `Uninitialized -> Hydrating -> {Unauthenticated, Authenticated}`; once
/// hydrated the session never re-enters `Hydrating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Process start; nothing is known yet.
    Uninitialized,
    /// Persisted state is being loaded; guards must defer decisions.
    Hydrating,
    /// Hydration finished without a usable credential.
    Unauthenticated,
    /// A decoded identity and its credential are installed.
    Authenticated,
}

/// Consistent read of the session at one point in time.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Lifecycle phase at snapshot time.
    pub phase: SessionPhase,
    /// Active identity claim, if authenticated.
    pub identity: Option<IdentityClaim>,
    /// Active bearer credential, if authenticated.
    pub credential: Option<Credential>,
    /// Current capability set.
    pub permissions: BTreeSet<Capability>,
    /// Identity generation at snapshot time.
    pub generation: u64,
}

impl SessionSnapshot {
    /// Whether hydration has run to completion.
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Unauthenticated | SessionPhase::Authenticated
        )
    }

    /// Whether an identity and credential are both installed.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some() && self.credential.is_some()
    }
}

/// Broadcast value describing the identity in effect.
///
/// The generation increases on every identity swap; consumers use it to
/// discard in-flight work issued under a replaced identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEpoch {
    /// Monotonic identity generation.
    pub generation: u64,
    /// Subject currently authenticated, if any.
    pub subject: Option<SubjectId>,
}

struct SessionState {
    phase: SessionPhase,
    identity: Option<IdentityClaim>,
    credential: Option<Credential>,
    permissions: BTreeSet<Capability>,
    generation: u64,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service owning the authenticated session.
pub struct SessionService {
    repository: Arc<dyn SessionRepository>,
    gateway: Arc<dyn AuthGateway>,
    state: RwLock<SessionState>,
    epochs: watch::Sender<SessionEpoch>,
}

impl SessionService {
    /// Creates an uninitialized session service.
    #[must_use]
    pub fn new(repository: Arc<dyn SessionRepository>, gateway: Arc<dyn AuthGateway>) -> Self {
        let (epochs, _) = watch::channel(SessionEpoch {
            generation: 0,
            subject: None,
        });

        Self {
            repository,
            gateway,
            state: RwLock::new(SessionState {
                phase: SessionPhase::Uninitialized,
                identity: None,
                credential: None,
                permissions: BTreeSet::new(),
                generation: 0,
            }),
            epochs,
        }
    }

    /// Populates the session from persisted local state.
    ///
    /// Must be the first transition and runs at most once; a second call is
    /// a [`AppError::Conflict`]. A persisted credential that no longer
    /// decodes is a soft failure: it is cleared from storage, logged, and
    /// the session ends up unauthenticated but hydrated.
    pub async fn hydrate(&self) -> AppResult<SessionSnapshot> {
        {
            let mut state = self.state.write();
            if state.phase != SessionPhase::Uninitialized {
                return Err(AppError::Conflict("session is already hydrated".to_owned()));
            }
            state.phase = SessionPhase::Hydrating;
        }

        let persisted = match self.repository.load().await {
            Ok(persisted) => persisted,
            Err(error) => {
                warn!(%error, "persisted session state unreadable; starting unauthenticated");
                PersistedSession::default()
            }
        };

        let mut identity = None;
        let mut credential = None;
        if let Some(stored) = persisted.credential {
            match credential_codec::decode_at(stored.as_str(), Utc::now()) {
                Ok(claim) => {
                    identity = Some(claim);
                    credential = Some(stored);
                }
                Err(error) => {
                    warn!(%error, "persisted credential rejected during hydration");
                    if let Err(error) = self.repository.clear_credential().await {
                        warn!(%error, "failed to clear rejected credential");
                    }
                }
            }
        }

        // The impersonation record exists iff the active claim carries
        // `impersonated_by`; drop an orphaned record left by a crash.
        let impersonated = identity
            .as_ref()
            .is_some_and(IdentityClaim::is_impersonated);
        if persisted.impersonation.is_some() && !impersonated {
            debug!("clearing orphaned impersonation record");
            if let Err(error) = self.repository.clear_impersonation().await {
                warn!(%error, "failed to clear orphaned impersonation record");
            }
        }

        let snapshot = {
            let mut state = self.state.write();
            state.permissions = persisted.permissions;
            state.identity = identity;
            state.credential = credential;
            state.phase = if state.identity.is_some() {
                SessionPhase::Authenticated
            } else {
                SessionPhase::Unauthenticated
            };
            Self::snapshot_of(&state)
        };
        self.publish_epoch();

        Ok(snapshot)
    }

    /// Authenticates with email and password.
    ///
    /// Installs the issued credential and the independently returned
    /// permission set atomically with respect to readers.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<SessionSnapshot> {
        self.require_hydrated()?;

        let grant = self.gateway.login(email, password).await?;
        let claim = credential_codec::decode_at(grant.credential.as_str(), Utc::now())?;

        self.set_credentials(claim, grant.credential).await?;
        self.set_permissions(grant.permissions).await?;

        Ok(self.snapshot())
    }

    /// Atomically replaces identity and credential and persists the latter.
    ///
    /// Bumps the identity generation: consumers holding the previous epoch
    /// must discard their in-flight work.
    pub async fn set_credentials(
        &self,
        identity: IdentityClaim,
        credential: Credential,
    ) -> AppResult<()> {
        self.require_hydrated()?;

        self.repository.save_credential(&credential).await?;

        {
            let mut state = self.state.write();
            state.identity = Some(identity);
            state.credential = Some(credential);
            state.phase = SessionPhase::Authenticated;
            state.generation += 1;
        }
        self.publish_epoch();

        Ok(())
    }

    /// Atomically replaces the permission set and persists it.
    ///
    /// The permission channel is independent of the identity claim; no
    /// generation bump happens here.
    pub async fn set_permissions(&self, permissions: BTreeSet<Capability>) -> AppResult<()> {
        self.require_hydrated()?;

        self.repository.save_permissions(&permissions).await?;
        self.state.write().permissions = permissions;

        Ok(())
    }

    /// Clears the session and purges every persisted key.
    ///
    /// Local state is always cleared; a failing purge is logged, not
    /// propagated, so a user can always log out.
    pub async fn logout(&self) -> AppResult<()> {
        self.require_hydrated()?;

        if let Err(error) = self.repository.clear_all().await {
            warn!(%error, "failed to purge persisted session state during logout");
        }

        {
            let mut state = self.state.write();
            state.identity = None;
            state.credential = None;
            state.permissions.clear();
            state.phase = SessionPhase::Unauthenticated;
            state.generation += 1;
        }
        self.publish_epoch();

        Ok(())
    }

    /// Returns a consistent snapshot of the session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        Self::snapshot_of(&self.state.read())
    }

    /// Returns the current identity generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Subscribes to identity epochs for stale-work cancellation.
    #[must_use]
    pub fn subscribe_epochs(&self) -> watch::Receiver<SessionEpoch> {
        self.epochs.subscribe()
    }

    fn require_hydrated(&self) -> AppResult<()> {
        let state = self.state.read();
        match state.phase {
            SessionPhase::Uninitialized | SessionPhase::Hydrating => Err(AppError::Conflict(
                "session is not hydrated yet".to_owned(),
            )),
            SessionPhase::Unauthenticated | SessionPhase::Authenticated => Ok(()),
        }
    }

    fn snapshot_of(state: &SessionState) -> SessionSnapshot {
        SessionSnapshot {
            phase: state.phase,
            identity: state.identity.clone(),
            credential: state.credential.clone(),
            permissions: state.permissions.clone(),
            generation: state.generation,
        }
    }

    fn publish_epoch(&self) {
        let epoch = {
            let state = self.state.read();
            SessionEpoch {
                generation: state.generation,
                subject: state.identity.as_ref().map(|claim| claim.subject_id),
            }
        };
        self.epochs.send_replace(epoch);
    }
}

#[cfg(test)]
mod tests;
