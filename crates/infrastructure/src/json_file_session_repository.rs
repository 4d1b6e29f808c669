use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use staffhq_application::{PersistedSession, SessionRepository};
use staffhq_core::{AppError, AppResult};
use staffhq_domain::{Capability, Credential, ImpersonationRecord};

/// Session repository persisting to a single JSON document on disk.
///
/// Stands in for browser local storage: credential, cached permission set
/// and the impersonation triple live in one file and are invalidated
/// together by [`SessionRepository::clear_all`].
pub struct JsonFileSessionRepository {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileSessionRepository {
    /// Creates a repository backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    async fn read_document(&self) -> AppResult<PersistedSession> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|error| {
                AppError::Storage(format!(
                    "session file {} is corrupt: {error}",
                    self.path.display()
                ))
            }),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(PersistedSession::default()),
            Err(error) => Err(AppError::Storage(format!(
                "failed to read session file {}: {error}",
                self.path.display()
            ))),
        }
    }

    async fn write_document(&self, document: &PersistedSession) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                AppError::Storage(format!(
                    "failed to create {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|error| AppError::Storage(format!("failed to encode session: {error}")))?;

        tokio::fs::write(&self.path, bytes).await.map_err(|error| {
            AppError::Storage(format!(
                "failed to write session file {}: {error}",
                self.path.display()
            ))
        })
    }

    async fn update<F>(&self, mutate: F) -> AppResult<()>
    where
        F: FnOnce(&mut PersistedSession),
    {
        let _guard = self.guard.lock().await;
        let mut document = self.read_document().await.unwrap_or_default();
        mutate(&mut document);
        self.write_document(&document).await
    }
}

#[async_trait]
impl SessionRepository for JsonFileSessionRepository {
    async fn load(&self) -> AppResult<PersistedSession> {
        let _guard = self.guard.lock().await;
        self.read_document().await
    }

    async fn save_credential(&self, credential: &Credential) -> AppResult<()> {
        let credential = credential.clone();
        self.update(move |document| document.credential = Some(credential))
            .await
    }

    async fn clear_credential(&self) -> AppResult<()> {
        self.update(|document| document.credential = None).await
    }

    async fn save_permissions(&self, permissions: &BTreeSet<Capability>) -> AppResult<()> {
        let permissions = permissions.clone();
        self.update(move |document| document.permissions = permissions)
            .await
    }

    async fn save_impersonation(&self, record: &ImpersonationRecord) -> AppResult<()> {
        let record = record.clone();
        self.update(move |document| document.impersonation = Some(record))
            .await
    }

    async fn load_impersonation(&self) -> AppResult<Option<ImpersonationRecord>> {
        let _guard = self.guard.lock().await;
        Ok(self.read_document().await?.impersonation)
    }

    async fn clear_impersonation(&self) -> AppResult<()> {
        self.update(|document| document.impersonation = None).await
    }

    async fn clear_all(&self) -> AppResult<()> {
        let _guard = self.guard.lock().await;
        self.write_document(&PersistedSession::default()).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use staffhq_application::{PersistedSession, SessionRepository};
    use staffhq_core::{AppError, SubjectId};
    use staffhq_domain::{Capability, Credential, ImpersonationRecord};

    use super::JsonFileSessionRepository;

    fn repository_in(dir: &tempfile::TempDir) -> JsonFileSessionRepository {
        JsonFileSessionRepository::new(dir.path().join("session.json"))
    }

    fn credential(raw: &str) -> Credential {
        Credential::new(raw).unwrap_or_else(|_| panic!("test credential"))
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty_session() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let repository = repository_in(&dir);

        let loaded = repository.load().await;
        assert_eq!(loaded.unwrap_or_default(), PersistedSession::default());
    }

    #[tokio::test]
    async fn saved_state_survives_a_reload() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let repository = repository_in(&dir);

        let stored = credential("h.p.s");
        assert!(repository.save_credential(&stored).await.is_ok());
        let permissions =
            BTreeSet::from([Capability::new("Attendance:view").unwrap_or_else(|_| panic!("test"))]);
        assert!(repository.save_permissions(&permissions).await.is_ok());
        let record = ImpersonationRecord::new(credential("o.p.s"), SubjectId::new());
        assert!(repository.save_impersonation(&record).await.is_ok());

        // A second repository over the same path sees everything.
        let reopened = repository_in(&dir);
        let loaded = reopened.load().await.unwrap_or_default();
        assert_eq!(loaded.credential, Some(stored));
        assert_eq!(loaded.permissions, permissions);
        assert_eq!(loaded.impersonation, Some(record));
    }

    #[tokio::test]
    async fn clear_all_invalidates_every_key() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let repository = repository_in(&dir);

        assert!(repository.save_credential(&credential("h.p.s")).await.is_ok());
        let record = ImpersonationRecord::new(credential("o.p.s"), SubjectId::new());
        assert!(repository.save_impersonation(&record).await.is_ok());

        assert!(repository.clear_all().await.is_ok());

        let loaded = repository.load().await.unwrap_or_default();
        assert_eq!(loaded, PersistedSession::default());
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_a_storage_error() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| panic!("tempdir"));
        let path = dir.path().join("session.json");
        assert!(std::fs::write(&path, b"{ not json").is_ok());

        let repository = JsonFileSessionRepository::new(path);
        assert!(matches!(
            repository.load().await,
            Err(AppError::Storage(_))
        ));
    }
}
