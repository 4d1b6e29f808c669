//! Application services and ports.

#![forbid(unsafe_code)]

mod access_service;
mod credential_codec;
mod impersonation_service;
mod notification_channel;
mod notification_feed;
mod session_service;

pub use access_service::{AccessDecision, AccessRequirement, AccessService, RedirectTarget};
pub use credential_codec::{decode, decode_at};
pub use impersonation_service::ImpersonationService;
pub use notification_channel::{
    AlertSink, NotificationChannel, NotificationEvent, PushConnector, PushSubscription,
};
pub use notification_feed::{NotificationFeed, NotificationGateway, NotificationPage};
pub use session_service::{
    AuthGateway, LoginGrant, PersistedSession, SessionEpoch, SessionPhase, SessionRepository,
    SessionService, SessionSnapshot,
};
