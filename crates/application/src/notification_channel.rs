//! Identity-scoped push channel feeding the notification read-model.
//!
//! The channel joins a per-subject broadcast group only once an
//! authenticated identity is known, and its lifetime is tied 1:1 to that
//! identity: a logout or impersonation swap ends the loop and releases the
//! transport, and no reconnect ever happens under a stale identity.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use staffhq_core::{AppError, AppResult, SubjectId};
use staffhq_domain::UserNotificationBinding;

use crate::notification_feed::NotificationFeed;
use crate::session_service::SessionService;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// One pushed notification delivery.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// The freshly created binding for the subject.
    pub binding: UserNotificationBinding,
    /// Whether the backend requested a user-facing alert.
    pub show_popup: bool,
}

/// Live subscription to a subject's broadcast group.
///
/// Dropping the receiver releases the underlying transport.
pub struct PushSubscription {
    /// Delivered events, in arrival order.
    pub events: mpsc::Receiver<NotificationEvent>,
}

/// Transport port establishing the per-subject push connection.
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// Connects and joins the broadcast group of `subject`.
    async fn connect(&self, subject: SubjectId) -> AppResult<PushSubscription>;
}

/// Best-effort user-facing alert port.
pub trait AlertSink: Send + Sync {
    /// Raises an alert; failures are swallowed by implementations.
    fn notify(&self, title: &str, message: &str);
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Application service pumping push deliveries into the feed.
pub struct NotificationChannel {
    connector: Arc<dyn PushConnector>,
    alerts: Arc<dyn AlertSink>,
    feed: Arc<NotificationFeed>,
    session: Arc<SessionService>,
}

impl NotificationChannel {
    /// Creates a channel bound to the given session and feed.
    #[must_use]
    pub fn new(
        connector: Arc<dyn PushConnector>,
        alerts: Arc<dyn AlertSink>,
        feed: Arc<NotificationFeed>,
        session: Arc<SessionService>,
    ) -> Self {
        Self {
            connector,
            alerts,
            feed,
            session,
        }
    }

    /// Connects and pumps events until the identity changes or the
    /// transport closes.
    ///
    /// Returns `Ok(())` when the session moved on (logout or impersonation
    /// swap) and [`AppError::NetworkFailure`] when the transport dropped
    /// while the identity was still current; the caller decides whether to
    /// reconnect, always under the then-current identity.
    pub async fn run(&self) -> AppResult<()> {
        let snapshot = self.session.snapshot();
        let Some(identity) = snapshot.identity else {
            return Err(AppError::PermissionDenied(
                "push channel requires an authenticated session".to_owned(),
            ));
        };
        let subject = identity.subject_id;

        let mut epochs = self.session.subscribe_epochs();
        if epochs.borrow().generation != snapshot.generation {
            debug!("identity swapped before the push channel connected");
            return Ok(());
        }

        let mut subscription = self.connector.connect(subject).await?;
        info!(%subject, "push channel joined");

        loop {
            tokio::select! {
                changed = epochs.changed() => {
                    let still_current = changed.is_ok()
                        && epochs.borrow_and_update().subject == Some(subject);
                    if !still_current {
                        debug!(%subject, "identity changed; releasing push channel");
                        return Ok(());
                    }
                    // Same subject under a refreshed credential: keep going.
                }
                event = subscription.events.recv() => {
                    let Some(event) = event else {
                        return Err(AppError::NetworkFailure(
                            "push channel closed by transport".to_owned(),
                        ));
                    };
                    self.deliver(event);
                }
            }
        }
    }

    fn deliver(&self, event: NotificationEvent) {
        let title = event.binding.notification.title.clone();
        let message = event.binding.notification.message.clone();

        // Insert first: the feed's id de-duplication decides whether this
        // delivery is new, which also keeps the popup at-most-once.
        let inserted = self.feed.apply_push(event.binding);
        if inserted && event.show_popup {
            self.alerts.notify(&title, &message);
        }
    }
}
