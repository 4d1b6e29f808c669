use std::collections::BTreeSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use staffhq_application::{PersistedSession, SessionRepository};
use staffhq_core::AppResult;
use staffhq_domain::{Capability, Credential, ImpersonationRecord};

/// Ephemeral session repository for tests and stateless runs.
#[derive(Default)]
pub struct InMemorySessionRepository {
    state: Mutex<PersistedSession>,
}

impl InMemorySessionRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-seeded with persisted state.
    #[must_use]
    pub fn with_state(state: PersistedSession) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn load(&self) -> AppResult<PersistedSession> {
        Ok(self.state.lock().clone())
    }

    async fn save_credential(&self, credential: &Credential) -> AppResult<()> {
        self.state.lock().credential = Some(credential.clone());
        Ok(())
    }

    async fn clear_credential(&self) -> AppResult<()> {
        self.state.lock().credential = None;
        Ok(())
    }

    async fn save_permissions(&self, permissions: &BTreeSet<Capability>) -> AppResult<()> {
        self.state.lock().permissions = permissions.clone();
        Ok(())
    }

    async fn save_impersonation(&self, record: &ImpersonationRecord) -> AppResult<()> {
        self.state.lock().impersonation = Some(record.clone());
        Ok(())
    }

    async fn load_impersonation(&self) -> AppResult<Option<ImpersonationRecord>> {
        Ok(self.state.lock().impersonation.clone())
    }

    async fn clear_impersonation(&self) -> AppResult<()> {
        self.state.lock().impersonation = None;
        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        *self.state.lock() = PersistedSession::default();
        Ok(())
    }
}
