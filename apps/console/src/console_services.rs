use std::sync::Arc;

use staffhq_application::{
    AccessService, ImpersonationService, NotificationChannel, NotificationFeed, SessionService,
};
use staffhq_core::AppError;
use staffhq_infrastructure::{
    HttpAuthGateway, HttpNotificationGateway, JsonFileSessionRepository, TracingAlertSink,
    WsPushConnector,
};

use crate::console_config::ConsoleConfig;

/// Fully wired application services.
pub struct ConsoleState {
    pub session: Arc<SessionService>,
    pub access: AccessService,
    pub impersonation: ImpersonationService,
    pub feed: Arc<NotificationFeed>,
    pub channel: NotificationChannel,
}

/// Builds every service from the configuration, single instances all around.
pub fn build_console_state(config: &ConsoleConfig) -> Result<ConsoleState, AppError> {
    let client = reqwest::Client::builder()
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let repository = Arc::new(JsonFileSessionRepository::new(&config.state_file));
    let auth_gateway = Arc::new(HttpAuthGateway::new(client.clone(), config.api_url.clone()));
    let session = Arc::new(SessionService::new(
        repository.clone(),
        auth_gateway.clone(),
    ));

    let notification_gateway = Arc::new(HttpNotificationGateway::new(
        client,
        config.api_url.clone(),
        session.clone(),
    ));
    let feed = Arc::new(NotificationFeed::new(
        notification_gateway,
        session.clone(),
    ));

    let channel = NotificationChannel::new(
        Arc::new(WsPushConnector::new(config.push_url.clone())),
        Arc::new(TracingAlertSink::new()),
        feed.clone(),
        session.clone(),
    );

    Ok(ConsoleState {
        access: AccessService::new(session.clone()),
        impersonation: ImpersonationService::new(
            session.clone(),
            repository,
            auth_gateway,
        ),
        feed,
        channel,
        session,
    })
}
