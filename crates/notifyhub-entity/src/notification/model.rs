//! Notification entity model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use notifyhub_core::error::AppError;
use notifyhub_core::types::id::{NotificationId, PersonId, UserId};

use super::actor_set::ActorSet;
use super::kind::NotificationKind;
use super::target::TargetRef;

/// Natural key used to find a notification that can absorb a new actor.
///
/// At most one **unread** notification exists per key; read ones may pile up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    /// The user who owns the notification.
    pub recipient_id: UserId,
    /// What the notification is about.
    #[serde(flatten)]
    pub target: TargetRef,
    /// Notification category.
    pub kind: NotificationKind,
}

impl NotificationKey {
    /// Create a new key.
    pub fn new(recipient_id: UserId, target: TargetRef, kind: NotificationKind) -> Self {
        Self {
            recipient_id,
            target,
            kind,
        }
    }

    /// Reject keys with a missing recipient or target.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.recipient_id.is_nil() {
            return Err(AppError::validation("Notification recipient is missing"));
        }
        if !self.target.is_present() {
            return Err(AppError::validation("Notification target is missing"));
        }
        Ok(())
    }
}

/// A notification owned by one recipient about one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// The recipient user. Immutable.
    pub recipient_id: UserId,
    /// The object this notification is about. Immutable.
    #[serde(flatten)]
    pub target: TargetRef,
    /// Notification category. Immutable.
    pub kind: NotificationKind,
    /// Whether the recipient has yet to read this notification.
    pub unread: bool,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
    /// The actors merged into this notification, in arrival order.
    pub actors: ActorSet,
}

impl Notification {
    /// Build a fresh, unread notification for `key` with a single actor.
    pub fn new(key: NotificationKey, actor: PersonId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::new(),
            recipient_id: key.recipient_id,
            target: key.target,
            kind: key.kind,
            unread: true,
            created_at,
            actors: ActorSet::single(actor),
        }
    }

    /// The aggregation key of this notification.
    pub fn key(&self) -> NotificationKey {
        NotificationKey::new(self.recipient_id, self.target, self.kind)
    }

    /// Set `unread` to `mark_unread`.
    ///
    /// Does not persist; the store applies the change.
    pub fn set_read_state(&mut self, mark_unread: bool) {
        self.unread = mark_unread;
    }

    /// Whether the recipient has yet to read this notification.
    pub fn is_unread(&self) -> bool {
        self.unread
    }

    /// Calendar day of creation in UTC, used for display grouping.
    pub fn day_created(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    /// The grouping key for counts by type.
    pub fn type_tag(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Add an actor to the set. Returns `true` if it was not yet present.
    pub fn add_actor(&mut self, actor: PersonId) -> bool {
        self.actors.add(actor)
    }
}
