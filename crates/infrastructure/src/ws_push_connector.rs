use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use staffhq_application::{NotificationEvent, PushConnector, PushSubscription};
use staffhq_core::{AppError, AppResult, SubjectId};

use crate::wire::WireUserNotificationBinding;

const EVENT_BUFFER: usize = 32;

/// WebSocket adapter for the per-subject push channel.
///
/// Connects, emits the join message for the subject's broadcast group and
/// pumps `new_notification` frames into the subscription. The pump task ends
/// when the subscription receiver is dropped, releasing the transport.
#[derive(Clone)]
pub struct WsPushConnector {
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    event: String,
    data: WirePushNotification,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePushNotification {
    #[serde(flatten)]
    binding: WireUserNotificationBinding,
    #[serde(default)]
    show_popup: bool,
}

impl WsPushConnector {
    /// Creates a connector against the given websocket endpoint.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl PushConnector for WsPushConnector {
    async fn connect(&self, subject: SubjectId) -> AppResult<PushSubscription> {
        let (stream, _response) = connect_async(self.endpoint.as_str()).await.map_err(|error| {
            AppError::NetworkFailure(format!("push channel connect failed: {error}"))
        })?;
        let (mut sink, mut source) = stream.split();

        let join = serde_json::json!({"event": "join", "subjectId": subject}).to_string();
        sink.send(Message::Text(join)).await.map_err(|error| {
            AppError::NetworkFailure(format!("push channel join failed: {error}"))
        })?;

        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = source.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                let Some(event) = parse_frame(&text) else { continue };
                                if events_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Ping(payload))) => {
                                if sink.send(Message::Pong(payload)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(error)) => {
                                warn!(%error, "push transport error");
                                break;
                            }
                        }
                    }
                    () = events_tx.closed() => break,
                }
            }
            debug!(%subject, "push transport released");
        });

        Ok(PushSubscription { events })
    }
}

fn parse_frame(text: &str) -> Option<NotificationEvent> {
    let frame: WireFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(error) => {
            debug!(%error, "ignoring unparseable push frame");
            return None;
        }
    };

    if frame.event != "new_notification" {
        debug!(event = %frame.event, "ignoring unrelated push frame");
        return None;
    }

    Some(NotificationEvent {
        binding: frame.data.binding.into_domain(),
        show_popup: frame.data.show_popup,
    })
}

#[cfg(test)]
mod tests {
    use super::parse_frame;

    #[test]
    fn new_notification_frame_parses() {
        let text = serde_json::json!({
            "event": "new_notification",
            "data": {
                "id": "5f0c9d47-5bb6-4f02-9a0d-1d58b3dd7c1a",
                "userId": "e742a37c-8f5b-4a3e-9f6d-6a3a1ba9d6ce",
                "read": false,
                "showPopup": true,
                "notification": {
                    "id": "9b1deb4d-3b7d-4bad-9bdd-2b0d7b3dcb6d",
                    "ownerUserId": "1c2e9f74-57a3-4f52-9f52-2f4f1f9dfc55",
                    "title": "Townhall",
                    "message": "Starts at noon",
                    "type": "announcement",
                    "createdAt": "2026-03-01T09:00:00Z"
                }
            }
        })
        .to_string();

        let event = parse_frame(&text);
        let Some(event) = event else {
            panic!("frame did not parse");
        };
        assert!(event.show_popup);
        assert_eq!(event.binding.notification.title, "Townhall");
    }

    #[test]
    fn unrelated_frames_are_ignored() {
        let text = serde_json::json!({
            "event": "heartbeat",
            "data": {
                "id": "5f0c9d47-5bb6-4f02-9a0d-1d58b3dd7c1a",
                "userId": "e742a37c-8f5b-4a3e-9f6d-6a3a1ba9d6ce",
                "read": false,
                "notification": {
                    "id": "9b1deb4d-3b7d-4bad-9bdd-2b0d7b3dcb6d",
                    "ownerUserId": "1c2e9f74-57a3-4f52-9f52-2f4f1f9dfc55",
                    "title": "t",
                    "message": "m",
                    "type": "k",
                    "createdAt": "2026-03-01T09:00:00Z"
                }
            }
        })
        .to_string();

        assert!(parse_frame(&text).is_none());
    }

    #[test]
    fn garbage_frames_are_ignored() {
        assert!(parse_frame("not json").is_none());
    }
}
