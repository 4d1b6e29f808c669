//! Paginated notification read-model merged with live push deliveries.
//!
//! The cache is a windowed view of one server page, never an accumulating
//! feed. Read transitions are optimistic one-way latches rolled back only
//! when the paired server call fails; every operation is guarded by the
//! session generation so results issued under a replaced identity are
//! discarded instead of applied.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use staffhq_core::{AppError, AppResult};
use staffhq_domain::{
    NotificationGroup, NotificationGroupKey, NotificationId, UserNotificationBinding,
    group_bindings,
};

use crate::session_service::SessionService;

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// One fetched window of the server-backed notification list.
#[derive(Debug, Clone)]
pub struct NotificationPage {
    /// Bindings visible to the subject, newest first.
    pub bindings: Vec<UserNotificationBinding>,
    /// Total number of pages at the requested page size.
    pub total_pages: u32,
}

/// Backend port for the notification read and mark operations.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Fetches one page of bindings for the current subject.
    async fn fetch_page(&self, page: u32, page_size: u32) -> AppResult<NotificationPage>;

    /// Marks a single binding read.
    async fn mark_read(&self, id: NotificationId) -> AppResult<()>;

    /// Marks every binding matching the group key read, in one request.
    async fn mark_group_read(&self, key: &NotificationGroupKey) -> AppResult<()>;

    /// Marks every binding of the subject read, in one request.
    async fn mark_all_read(&self) -> AppResult<()>;
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

struct FeedState {
    bindings: Vec<UserNotificationBinding>,
    total_pages: u32,
    pushed_since_refresh: u64,
}

/// Application service owning the local notification cache.
pub struct NotificationFeed {
    gateway: Arc<dyn NotificationGateway>,
    session: Arc<SessionService>,
    state: RwLock<FeedState>,
}

impl NotificationFeed {
    /// Creates an empty feed bound to the given session.
    #[must_use]
    pub fn new(gateway: Arc<dyn NotificationGateway>, session: Arc<SessionService>) -> Self {
        Self {
            gateway,
            session,
            state: RwLock::new(FeedState {
                bindings: Vec::new(),
                total_pages: 0,
                pushed_since_refresh: 0,
            }),
        }
    }

    /// Replaces the page cache with a freshly fetched window.
    ///
    /// Resets the pushed-since-refresh counter. A response that lands after
    /// an identity swap is discarded, never applied.
    pub async fn refresh(&self, page: u32, page_size: u32) -> AppResult<()> {
        let generation = self.session.generation();
        let fetched = self.gateway.fetch_page(page, page_size).await?;

        if self.session.generation() != generation {
            debug!("discarding notification page fetched under a replaced identity");
            return Ok(());
        }

        let mut state = self.state.write();
        state.bindings = fetched.bindings;
        state.total_pages = fetched.total_pages;
        state.pushed_since_refresh = 0;
        Ok(())
    }

    /// Latches one binding to read, paired with a server call.
    ///
    /// Idempotent: an already-read binding is a local no-op and no request
    /// is issued. The optimistic transition is rolled back if the server
    /// call fails.
    pub async fn mark_read(&self, id: NotificationId) -> AppResult<()> {
        let generation = self.session.generation();
        {
            let mut state = self.state.write();
            let Some(binding) = state
                .bindings
                .iter_mut()
                .find(|binding| binding.notification_id() == id)
            else {
                return Err(AppError::NotFound(format!(
                    "notification '{id}' is not in the current page"
                )));
            };
            if !binding.mark_read(Utc::now()) {
                return Ok(());
            }
        }

        if let Err(error) = self.gateway.mark_read(id).await {
            self.roll_back(&[id], generation);
            return Err(error);
        }
        Ok(())
    }

    /// Latches every unread member of the group, in one server request.
    ///
    /// Already-read members are untouched; with nothing unread no request
    /// is issued at all.
    pub async fn mark_group_read(&self, key: &NotificationGroupKey) -> AppResult<()> {
        let generation = self.session.generation();
        let now = Utc::now();
        let transitioned: Vec<NotificationId> = {
            let mut state = self.state.write();
            state
                .bindings
                .iter_mut()
                .filter(|binding| NotificationGroupKey::of(&binding.notification) == *key)
                .filter_map(|binding| binding.mark_read(now).then(|| binding.notification_id()))
                .collect()
        };
        if transitioned.is_empty() {
            return Ok(());
        }

        if let Err(error) = self.gateway.mark_group_read(key).await {
            self.roll_back(&transitioned, generation);
            return Err(error);
        }
        Ok(())
    }

    /// Latches every unread binding in the cache, in one server request.
    pub async fn mark_all_read(&self) -> AppResult<()> {
        let generation = self.session.generation();
        let now = Utc::now();
        let transitioned: Vec<NotificationId> = {
            let mut state = self.state.write();
            state
                .bindings
                .iter_mut()
                .filter_map(|binding| binding.mark_read(now).then(|| binding.notification_id()))
                .collect()
        };
        if transitioned.is_empty() {
            return Ok(());
        }

        if let Err(error) = self.gateway.mark_all_read().await {
            self.roll_back(&transitioned, generation);
            return Err(error);
        }
        Ok(())
    }

    /// Marks a displayed group: a single member routes through
    /// [`Self::mark_read`], several members through
    /// [`Self::mark_group_read`].
    pub async fn mark_group(&self, key: &NotificationGroupKey) -> AppResult<()> {
        let members: Vec<NotificationId> = {
            let state = self.state.read();
            state
                .bindings
                .iter()
                .filter(|binding| NotificationGroupKey::of(&binding.notification) == *key)
                .map(UserNotificationBinding::notification_id)
                .collect()
        };

        match members.as_slice() {
            [] => Err(AppError::NotFound(
                "no bindings match the group key".to_owned(),
            )),
            [only] => self.mark_read(*only).await,
            _ => self.mark_group_read(key).await,
        }
    }

    /// Merges a pushed binding into the cache.
    ///
    /// Returns `true` when the binding was inserted; a notification id that
    /// is already cached (reconnect replay) is ignored and does not count.
    pub fn apply_push(&self, binding: UserNotificationBinding) -> bool {
        let mut state = self.state.write();
        let duplicate = state
            .bindings
            .iter()
            .any(|cached| cached.notification_id() == binding.notification_id());
        if duplicate {
            debug!(id = %binding.notification_id(), "duplicate push delivery ignored");
            return false;
        }

        state.bindings.insert(0, binding);
        state.pushed_since_refresh += 1;
        true
    }

    /// Returns the cached window.
    #[must_use]
    pub fn bindings(&self) -> Vec<UserNotificationBinding> {
        self.state.read().bindings.clone()
    }

    /// Recomputes the display groups from the cached window.
    #[must_use]
    pub fn groups(&self) -> Vec<NotificationGroup> {
        group_bindings(&self.state.read().bindings)
    }

    /// Count of unread bindings in the cached window only.
    #[must_use]
    pub fn unread_in_page(&self) -> usize {
        self.state
            .read()
            .bindings
            .iter()
            .filter(|binding| !binding.read)
            .count()
    }

    /// Count of pushes applied since the last successful refresh.
    ///
    /// Kept separate from [`Self::unread_in_page`]; the two counters must
    /// not be conflated.
    #[must_use]
    pub fn pushed_since_refresh(&self) -> u64 {
        self.state.read().pushed_since_refresh
    }

    /// Total pages reported by the last refresh.
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.state.read().total_pages
    }

    /// Drops the cached window and counters, e.g. after an identity swap.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.bindings.clear();
        state.total_pages = 0;
        state.pushed_since_refresh = 0;
    }

    fn roll_back(&self, ids: &[NotificationId], generation: u64) {
        if self.session.generation() != generation {
            debug!("skipping rollback under a replaced identity");
            return;
        }

        let mut state = self.state.write();
        for binding in &mut state.bindings {
            if ids.contains(&binding.notification_id()) {
                binding.read = false;
                binding.read_at = None;
            }
        }
    }
}
