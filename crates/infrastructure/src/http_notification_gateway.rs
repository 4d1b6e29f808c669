use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use url::Url;

use staffhq_application::{NotificationGateway, NotificationPage, SessionService};
use staffhq_core::{AppError, AppResult};
use staffhq_domain::{Credential, NotificationGroupKey, NotificationId};

use crate::wire::WireUserNotificationBinding;

/// Reqwest adapter for the notification endpoints.
///
/// The bearer credential is read from the live session per call, so the
/// adapter follows credential swaps without rebuilding.
#[derive(Clone)]
pub struct HttpNotificationGateway {
    client: reqwest::Client,
    base_url: Url,
    session: Arc<SessionService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageResponse {
    items: Vec<WireUserNotificationBinding>,
    total_pages: u32,
}

impl HttpNotificationGateway {
    /// Creates a gateway against the given API base URL.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: Url, session: Arc<SessionService>) -> Self {
        Self {
            client,
            base_url,
            session,
        }
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|error| AppError::Internal(format!("invalid endpoint '{path}': {error}")))
    }

    fn bearer(&self) -> AppResult<Credential> {
        self.session
            .snapshot()
            .credential
            .ok_or_else(|| AppError::PermissionDenied("no credential is installed".to_owned()))
    }

    async fn execute(&self, request: RequestBuilder, action: &str) -> AppResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|error| AppError::NetworkFailure(format!("{action} failed: {error}")))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::PermissionDenied(
                format!("{action} rejected by the backend"),
            )),
            status => Err(AppError::NetworkFailure(format!(
                "{action} failed with HTTP {status}"
            ))),
        }
    }
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn fetch_page(&self, page: u32, page_size: u32) -> AppResult<NotificationPage> {
        let mut url = self.endpoint("/notifications/visible")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &page_size.to_string());

        let request = self.client.get(url).bearer_auth(self.bearer()?.as_str());
        let response = self.execute(request, "notification fetch").await?;

        let payload: PageResponse = response.json().await.map_err(|error| {
            AppError::NetworkFailure(format!("notification page unreadable: {error}"))
        })?;

        Ok(NotificationPage {
            bindings: payload
                .items
                .into_iter()
                .map(WireUserNotificationBinding::into_domain)
                .collect(),
            total_pages: payload.total_pages,
        })
    }

    async fn mark_read(&self, id: NotificationId) -> AppResult<()> {
        let url = self.endpoint(&format!("/notifications/{id}/read"))?;
        let request = self.client.patch(url).bearer_auth(self.bearer()?.as_str());
        self.execute(request, "mark read").await.map(|_| ())
    }

    async fn mark_group_read(&self, key: &NotificationGroupKey) -> AppResult<()> {
        let url = self.endpoint("/notifications/mark-group")?;
        let request = self
            .client
            .patch(url)
            .bearer_auth(self.bearer()?.as_str())
            .json(&serde_json::json!({
                "title": key.title,
                "message": key.message,
                "type": key.kind,
            }));
        self.execute(request, "mark group read").await.map(|_| ())
    }

    async fn mark_all_read(&self) -> AppResult<()> {
        let url = self.endpoint("/notifications/all")?;
        let request = self.client.patch(url).bearer_auth(self.bearer()?.as_str());
        self.execute(request, "mark all read").await.map(|_| ())
    }
}
