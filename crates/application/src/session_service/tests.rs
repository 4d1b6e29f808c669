use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use staffhq_core::{AppError, AppResult, SubjectId};
use staffhq_domain::{Capability, Credential, ImpersonationRecord};

use crate::credential_codec::testing::encode_claims;

use super::{
    AuthGateway, LoginGrant, PersistedSession, SessionPhase, SessionRepository, SessionService,
};

const FAR_FUTURE_EXP: i64 = 4_102_444_800; // 2100-01-01T00:00:00Z

#[derive(Default)]
struct FakeSessionRepository {
    state: Mutex<PersistedSession>,
}

#[async_trait]
impl SessionRepository for FakeSessionRepository {
    async fn load(&self) -> AppResult<PersistedSession> {
        Ok(self.state.lock().await.clone())
    }

    async fn save_credential(&self, credential: &Credential) -> AppResult<()> {
        self.state.lock().await.credential = Some(credential.clone());
        Ok(())
    }

    async fn clear_credential(&self) -> AppResult<()> {
        self.state.lock().await.credential = None;
        Ok(())
    }

    async fn save_permissions(&self, permissions: &BTreeSet<Capability>) -> AppResult<()> {
        self.state.lock().await.permissions = permissions.clone();
        Ok(())
    }

    async fn save_impersonation(&self, record: &ImpersonationRecord) -> AppResult<()> {
        self.state.lock().await.impersonation = Some(record.clone());
        Ok(())
    }

    async fn load_impersonation(&self) -> AppResult<Option<ImpersonationRecord>> {
        Ok(self.state.lock().await.impersonation.clone())
    }

    async fn clear_impersonation(&self) -> AppResult<()> {
        self.state.lock().await.impersonation = None;
        Ok(())
    }

    async fn clear_all(&self) -> AppResult<()> {
        *self.state.lock().await = PersistedSession::default();
        Ok(())
    }
}

#[derive(Default)]
struct FakeAuthGateway {
    grant: Mutex<Option<LoginGrant>>,
}

#[async_trait]
impl AuthGateway for FakeAuthGateway {
    async fn login(&self, _email: &str, _password: &str) -> AppResult<LoginGrant> {
        self.grant
            .lock()
            .await
            .clone()
            .ok_or_else(|| AppError::NetworkFailure("login unavailable".to_owned()))
    }

    async fn impersonate(
        &self,
        _credential: &Credential,
        _target: SubjectId,
    ) -> AppResult<Credential> {
        Err(AppError::NetworkFailure(
            "impersonation unavailable".to_owned(),
        ))
    }
}

fn credential_for(subject: SubjectId, role: &str) -> Credential {
    let raw = encode_claims(&json!({
        "sub": subject.to_string(),
        "role": role,
        "exp": FAR_FUTURE_EXP,
    }));
    Credential::new(raw).unwrap_or_else(|_| panic!("test credential"))
}

fn capability(value: &str) -> Capability {
    Capability::new(value).unwrap_or_else(|_| panic!("test capability"))
}

fn service_with(
    repository: Arc<FakeSessionRepository>,
    gateway: Arc<FakeAuthGateway>,
) -> SessionService {
    SessionService::new(repository, gateway)
}

#[tokio::test]
async fn hydrate_with_valid_persisted_credential_authenticates() {
    let subject = SubjectId::new();
    let repository = Arc::new(FakeSessionRepository::default());
    repository.state.lock().await.credential = Some(credential_for(subject, "staff"));
    repository.state.lock().await.permissions = BTreeSet::from([capability("Attendance:view")]);

    let service = service_with(repository, Arc::new(FakeAuthGateway::default()));
    let snapshot = match service.hydrate().await {
        Ok(snapshot) => snapshot,
        Err(error) => panic!("hydrate failed: {error}"),
    };
    assert_eq!(snapshot.phase, SessionPhase::Authenticated);
    assert!(snapshot.is_authenticated());
    assert_eq!(
        snapshot.identity.map(|claim| claim.subject_id),
        Some(subject)
    );
    assert!(snapshot.permissions.contains(&capability("Attendance:view")));
}

#[tokio::test]
async fn hydrate_with_rejected_credential_soft_fails() {
    let repository = Arc::new(FakeSessionRepository::default());
    repository.state.lock().await.credential =
        Some(Credential::new("not.a.credential").unwrap_or_else(|_| panic!("test")));

    let service = service_with(repository.clone(), Arc::new(FakeAuthGateway::default()));
    let snapshot = match service.hydrate().await {
        Ok(snapshot) => snapshot,
        Err(error) => panic!("hydrate must not propagate decode failures: {error}"),
    };
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert!(snapshot.is_hydrated());
    assert!(!snapshot.is_authenticated());
    assert!(repository.state.lock().await.credential.is_none());
}

#[tokio::test]
async fn hydrate_runs_at_most_once() {
    let service = service_with(
        Arc::new(FakeSessionRepository::default()),
        Arc::new(FakeAuthGateway::default()),
    );

    assert!(service.hydrate().await.is_ok());
    assert!(matches!(
        service.hydrate().await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn hydrate_clears_orphaned_impersonation_record() {
    let repository = Arc::new(FakeSessionRepository::default());
    repository.state.lock().await.impersonation = Some(ImpersonationRecord::new(
        credential_for(SubjectId::new(), "admin"),
        SubjectId::new(),
    ));

    let service = service_with(repository.clone(), Arc::new(FakeAuthGateway::default()));
    assert!(service.hydrate().await.is_ok());

    assert!(repository.state.lock().await.impersonation.is_none());
}

#[tokio::test]
async fn login_installs_identity_and_permissions() {
    let subject = SubjectId::new();
    let repository = Arc::new(FakeSessionRepository::default());
    let gateway = Arc::new(FakeAuthGateway::default());
    *gateway.grant.lock().await = Some(LoginGrant {
        credential: credential_for(subject, "admin"),
        permissions: BTreeSet::from([capability("Employee:manage")]),
    });

    let service = service_with(repository.clone(), gateway);
    assert!(service.hydrate().await.is_ok());

    let snapshot = match service.login("ops@example.com", "pw").await {
        Ok(snapshot) => snapshot,
        Err(error) => panic!("login failed: {error}"),
    };
    assert!(snapshot.is_authenticated());
    assert_eq!(
        snapshot.identity.map(|claim| claim.subject_id),
        Some(subject)
    );

    let persisted = repository.state.lock().await;
    assert!(persisted.credential.is_some());
    assert!(persisted.permissions.contains(&capability("Employee:manage")));
}

#[tokio::test]
async fn authenticated_iff_identity_and_credential() {
    let gateway = Arc::new(FakeAuthGateway::default());
    *gateway.grant.lock().await = Some(LoginGrant {
        credential: credential_for(SubjectId::new(), "staff"),
        permissions: BTreeSet::new(),
    });
    let service = service_with(Arc::new(FakeSessionRepository::default()), gateway);

    assert!(service.hydrate().await.is_ok());
    let hydrated = service.snapshot();
    assert!(hydrated.identity.is_none() && hydrated.credential.is_none());
    assert!(!hydrated.is_authenticated());

    assert!(service.login("jo@example.com", "pw").await.is_ok());
    let logged_in = service.snapshot();
    assert!(logged_in.identity.is_some() && logged_in.credential.is_some());
    assert!(logged_in.is_authenticated());

    assert!(service.logout().await.is_ok());
    let logged_out = service.snapshot();
    assert!(logged_out.identity.is_none() && logged_out.credential.is_none());
    assert!(!logged_out.is_authenticated());
}

#[tokio::test]
async fn logout_purges_every_persisted_key() {
    let repository = Arc::new(FakeSessionRepository::default());
    let gateway = Arc::new(FakeAuthGateway::default());
    *gateway.grant.lock().await = Some(LoginGrant {
        credential: credential_for(SubjectId::new(), "staff"),
        permissions: BTreeSet::from([capability("Attendance:view")]),
    });

    let service = service_with(repository.clone(), gateway);
    assert!(service.hydrate().await.is_ok());
    assert!(service.login("jo@example.com", "pw").await.is_ok());

    assert!(service.logout().await.is_ok());

    let persisted = repository.state.lock().await;
    assert_eq!(*persisted, PersistedSession::default());
    let snapshot = service.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Unauthenticated);
    assert!(snapshot.permissions.is_empty());
}

#[tokio::test]
async fn credential_swap_bumps_generation_and_epoch() {
    let service = service_with(
        Arc::new(FakeSessionRepository::default()),
        Arc::new(FakeAuthGateway::default()),
    );
    assert!(service.hydrate().await.is_ok());
    let mut epochs = service.subscribe_epochs();
    let before = service.generation();

    let subject = SubjectId::new();
    let credential = credential_for(subject, "staff");
    let claim = crate::credential_codec::decode(credential.as_str())
        .unwrap_or_else(|_| panic!("test claim"));
    assert!(service.set_credentials(claim, credential).await.is_ok());

    assert_eq!(service.generation(), before + 1);
    assert!(epochs.has_changed().unwrap_or(false));
    let epoch = *epochs.borrow_and_update();
    assert_eq!(epoch.subject, Some(subject));
    assert_eq!(epoch.generation, before + 1);
}

#[tokio::test]
async fn set_permissions_does_not_bump_generation() {
    let service = service_with(
        Arc::new(FakeSessionRepository::default()),
        Arc::new(FakeAuthGateway::default()),
    );
    assert!(service.hydrate().await.is_ok());
    let before = service.generation();

    let permissions = BTreeSet::from([capability("Attendance:view")]);
    assert!(service.set_permissions(permissions).await.is_ok());

    assert_eq!(service.generation(), before);
    assert!(
        service
            .snapshot()
            .permissions
            .contains(&capability("Attendance:view"))
    );
}

#[tokio::test]
async fn operations_before_hydration_are_rejected() {
    let service = service_with(
        Arc::new(FakeSessionRepository::default()),
        Arc::new(FakeAuthGateway::default()),
    );

    assert!(matches!(
        service.login("jo@example.com", "pw").await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(service.logout().await, Err(AppError::Conflict(_))));
    assert!(matches!(
        service.set_permissions(BTreeSet::new()).await,
        Err(AppError::Conflict(_))
    ));
}
