//! Notification entities and the display-time grouping derivation.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use staffhq_core::SubjectId;
use uuid::Uuid;

/// Unique identifier of a server-owned notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(Uuid);

impl NotificationId {
    /// Creates a random notification identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a notification identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for NotificationId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Unique identifier of a per-user notification binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingId(Uuid);

impl BindingId {
    /// Creates a random binding identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a binding identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-owned notification content. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Stable notification identifier.
    pub id: NotificationId,
    /// Subject that created the notification.
    pub owner_user_id: SubjectId,
    /// Short headline.
    pub title: String,
    /// Full message body.
    pub message: String,
    /// Backend-defined category string (announcement, shift, payroll, ...).
    pub kind: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Department scope selector, if targeted.
    pub department_id: Option<Uuid>,
    /// Sub-department scope selector, if targeted.
    pub sub_department_id: Option<Uuid>,
    /// Employee scope selector, if targeted.
    pub employee_id: Option<Uuid>,
    /// Visibility level scope selector, if targeted.
    pub visibility_level: Option<i32>,
}

/// Per-user read-state record for one notification.
///
/// The only mutable entity in the notification model; mutation is restricted
/// to the `read`/`read_at` pair and is a one-way latch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotificationBinding {
    /// Stable binding identifier.
    pub id: BindingId,
    /// Subject this binding belongs to.
    pub user_id: SubjectId,
    /// The notification being bound.
    pub notification: Notification,
    /// Whether the subject has read the notification.
    pub read: bool,
    /// When the notification was read, if it has been.
    pub read_at: Option<DateTime<Utc>>,
}

impl UserNotificationBinding {
    /// Returns the bound notification's identifier.
    #[must_use]
    pub fn notification_id(&self) -> NotificationId {
        self.notification.id
    }

    /// Latches the binding to read.
    ///
    /// Idempotent and monotonic: returns `true` only on the `false -> true`
    /// transition; a second call changes nothing, `read_at` included.
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.read {
            return false;
        }

        self.read = true;
        self.read_at = Some(at);
        true
    }
}

/// Grouping key: bindings sharing title, message and kind cluster together
/// for display and batched read transitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationGroupKey {
    /// Shared headline.
    pub title: String,
    /// Shared message body.
    pub message: String,
    /// Shared category string.
    pub kind: String,
}

impl NotificationGroupKey {
    /// Derives the grouping key of a notification.
    #[must_use]
    pub fn of(notification: &Notification) -> Self {
        Self {
            title: notification.title.clone(),
            message: notification.message.clone(),
            kind: notification.kind.clone(),
        }
    }
}

/// Display-time cluster of bindings sharing a grouping key.
///
/// Derived, never persisted; recomputed whenever the underlying binding list
/// changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationGroup {
    /// Shared grouping key.
    pub key: NotificationGroupKey,
    /// Member bindings in list order.
    pub bindings: Vec<UserNotificationBinding>,
}

impl NotificationGroup {
    /// A group is read iff every member is read.
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.bindings.iter().all(|binding| binding.read)
    }

    /// Notification ids of the unread members, in list order.
    #[must_use]
    pub fn unread_notification_ids(&self) -> Vec<NotificationId> {
        self.bindings
            .iter()
            .filter(|binding| !binding.read)
            .map(UserNotificationBinding::notification_id)
            .collect()
    }
}

/// Clusters bindings by `(title, message, kind)` preserving first-seen order
/// of both groups and members.
#[must_use]
pub fn group_bindings(bindings: &[UserNotificationBinding]) -> Vec<NotificationGroup> {
    let mut groups: Vec<NotificationGroup> = Vec::new();

    for binding in bindings {
        let key = NotificationGroupKey::of(&binding.notification);
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.bindings.push(binding.clone()),
            None => groups.push(NotificationGroup {
                key,
                bindings: vec![binding.clone()],
            }),
        }
    }

    groups
}
