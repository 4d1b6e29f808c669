//! Wire DTOs shared by the REST and push adapters.
//!
//! The backend speaks camelCase JSON; everything is converted into domain
//! types at this boundary and never passed through raw.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use staffhq_core::SubjectId;
use staffhq_domain::{BindingId, Notification, NotificationId, UserNotificationBinding};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireNotification {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub sub_department_id: Option<Uuid>,
    #[serde(default)]
    pub employee_id: Option<Uuid>,
    #[serde(default)]
    pub visibility_level: Option<i32>,
}

impl WireNotification {
    pub(crate) fn into_domain(self) -> Notification {
        Notification {
            id: NotificationId::from_uuid(self.id),
            owner_user_id: SubjectId::from_uuid(self.owner_user_id),
            title: self.title,
            message: self.message,
            kind: self.kind,
            created_at: self.created_at,
            department_id: self.department_id,
            sub_department_id: self.sub_department_id,
            employee_id: self.employee_id,
            visibility_level: self.visibility_level,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireUserNotificationBinding {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification: WireNotification,
    pub read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
}

impl WireUserNotificationBinding {
    pub(crate) fn into_domain(self) -> UserNotificationBinding {
        UserNotificationBinding {
            id: BindingId::from_uuid(self.id),
            user_id: SubjectId::from_uuid(self.user_id),
            notification: self.notification.into_domain(),
            read: self.read,
            read_at: self.read_at,
        }
    }
}
