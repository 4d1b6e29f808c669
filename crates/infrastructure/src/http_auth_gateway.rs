use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use staffhq_application::{AuthGateway, LoginGrant};
use staffhq_core::{AppError, AppResult, SubjectId};
use staffhq_domain::{Capability, Credential};

/// Reqwest adapter for the credential issuance endpoints.
#[derive(Clone)]
pub struct HttpAuthGateway {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    credential: String,
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImpersonationResponse {
    credential: String,
}

impl HttpAuthGateway {
    /// Creates a gateway against the given API base URL.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|error| AppError::Internal(format!("invalid endpoint '{path}': {error}")))
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn login(&self, email: &str, password: &str) -> AppResult<LoginGrant> {
        let url = self.endpoint("/auth/login")?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({"email": email, "password": password}))
            .send()
            .await
            .map_err(|error| AppError::NetworkFailure(format!("login request failed: {error}")))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AppError::PermissionDenied(
                    "login rejected by the backend".to_owned(),
                ));
            }
            status => {
                return Err(AppError::NetworkFailure(format!(
                    "login failed with HTTP {status}"
                )));
            }
        }

        let payload: LoginResponse = response.json().await.map_err(|error| {
            AppError::NetworkFailure(format!("login response unreadable: {error}"))
        })?;

        let mut permissions = BTreeSet::new();
        for value in payload.permissions {
            permissions.insert(Capability::new(value)?);
        }

        Ok(LoginGrant {
            credential: Credential::new(payload.credential)?,
            permissions,
        })
    }

    async fn impersonate(
        &self,
        credential: &Credential,
        target: SubjectId,
    ) -> AppResult<Credential> {
        let url = self.endpoint(&format!("/impersonation/{target}"))?;
        let response = self
            .client
            .post(url)
            .bearer_auth(credential.as_str())
            .send()
            .await
            .map_err(|error| {
                AppError::NetworkFailure(format!("impersonation request failed: {error}"))
            })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AppError::PermissionDenied(
                    "impersonation rejected by the backend".to_owned(),
                ));
            }
            status => {
                return Err(AppError::NetworkFailure(format!(
                    "impersonation failed with HTTP {status}"
                )));
            }
        }

        let payload: ImpersonationResponse = response.json().await.map_err(|error| {
            AppError::NetworkFailure(format!("impersonation response unreadable: {error}"))
        })?;

        Credential::new(payload.credential)
    }
}
