//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod identity;
mod notification;
mod security;

pub use identity::{Credential, IdentityClaim, ImpersonationRecord, Role, SubRole};
pub use notification::{
    BindingId, Notification, NotificationGroup, NotificationGroupKey, NotificationId,
    UserNotificationBinding, group_bindings,
};
pub use security::Capability;
