//! The notification store abstraction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use notifyhub_core::result::AppResult;
use notifyhub_core::types::id::{NotificationId, PersonId, UserId};
use notifyhub_core::types::pagination::{PageRequest, PageResponse};
use notifyhub_core::types::sorting::SortDirection;
use notifyhub_entity::notification::{Notification, NotificationKey, NotificationKind};

/// Filters and ordering for list and count queries.
///
/// Built once and handed to the store; every field applies independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationQuery {
    /// Restrict to one kind; `None` means every kind.
    pub kind: Option<NotificationKind>,
    /// Restrict to unread notifications.
    pub unread_only: bool,
    /// Order on `created_at`.
    pub order: SortDirection,
}

impl NotificationQuery {
    /// Unrestricted query, newest first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to `kind` when present.
    pub fn by_type(mut self, kind: Option<NotificationKind>) -> Self {
        self.kind = kind;
        self
    }

    /// Restrict to unread notifications when `flag` is set.
    pub fn unread_only(mut self, flag: bool) -> Self {
        self.unread_only = flag;
        self
    }

    /// Set the `created_at` ordering.
    pub fn order(mut self, order: SortDirection) -> Self {
        self.order = order;
        self
    }

    /// Whether `notification` passes the filters.
    pub fn matches(&self, notification: &Notification) -> bool {
        (!self.unread_only || notification.unread)
            && self.kind.is_none_or(|kind| notification.kind == kind)
    }
}

/// Outcome of a find-or-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// The notification after the operation, with its full actor set.
    pub notification: Notification,
    /// Whether a new notification was created.
    pub created: bool,
    /// Whether the actor was newly linked.
    pub actor_added: bool,
}

/// Persistence for notifications and their actor links.
///
/// Implementations must make [`concatenate_or_create`] atomic per unread
/// key and [`mark_all_read`] a single set-based update.
///
/// [`concatenate_or_create`]: NotificationStore::concatenate_or_create
/// [`mark_all_read`]: NotificationStore::mark_all_read
#[async_trait]
pub trait NotificationStore: Send + Sync + 'static {
    /// Merge `actor` into the unread notification for `key`, or create a
    /// new unread one holding only `actor` when none exists.
    ///
    /// Read notifications are never reused. Fails with `Conflict` when a
    /// concurrent writer makes the decision unsafe; the caller retries.
    async fn concatenate_or_create(
        &self,
        key: &NotificationKey,
        actor: PersonId,
        now: DateTime<Utc>,
    ) -> AppResult<Aggregation>;

    /// Fetch one of the recipient's notifications.
    async fn find_by_id(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> AppResult<Option<Notification>>;

    /// List the recipient's notifications matching `query`, one page at a time.
    async fn list(
        &self,
        recipient: UserId,
        query: &NotificationQuery,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Notification>>;

    /// Count the recipient's notifications matching `query`.
    async fn count(&self, recipient: UserId, query: &NotificationQuery) -> AppResult<u64>;

    /// Count the recipient's unread notifications.
    async fn unread_count(&self, recipient: UserId) -> AppResult<u64> {
        self.count(recipient, &NotificationQuery::new().unread_only(true))
            .await
    }

    /// Count matching notifications per kind. Kinds with no rows are absent.
    async fn count_by_kind(
        &self,
        recipient: UserId,
        query: &NotificationQuery,
    ) -> AppResult<BTreeMap<NotificationKind, u64>>;

    /// Set the `unread` flag of one notification and return it.
    ///
    /// Fails with `NotFound` when the id is unknown or belongs to someone
    /// else, and with `Conflict` when reopening would leave two unread
    /// notifications for the same key.
    async fn set_read_state(
        &self,
        recipient: UserId,
        id: NotificationId,
        unread: bool,
    ) -> AppResult<Notification>;

    /// Mark every unread notification of the recipient (optionally of one
    /// kind) as read in one atomic update. Returns the number of rows changed.
    async fn mark_all_read(
        &self,
        recipient: UserId,
        kind: Option<NotificationKind>,
    ) -> AppResult<u64>;

    /// Delete a notification and its actor links.
    async fn delete(&self, recipient: UserId, id: NotificationId) -> AppResult<()>;

    /// Delete every notification of the recipient. Returns the number removed.
    async fn delete_for_recipient(&self, recipient: UserId) -> AppResult<u64>;

    /// Check that the backing store is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
