//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_auth_gateway;
mod http_notification_gateway;
mod in_memory_session_repository;
mod json_file_session_repository;
mod tracing_alert_sink;
mod wire;
mod ws_push_connector;

pub use http_auth_gateway::HttpAuthGateway;
pub use http_notification_gateway::HttpNotificationGateway;
pub use in_memory_session_repository::InMemorySessionRepository;
pub use json_file_session_repository::JsonFileSessionRepository;
pub use tracing_alert_sink::TracingAlertSink;
pub use ws_push_connector::WsPushConnector;
