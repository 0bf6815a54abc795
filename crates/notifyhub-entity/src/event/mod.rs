//! Social events that may notify a recipient.
//!
//! Events come from the event-processing pipeline. Each one says, for a
//! given recipient, which [`NotificationKind`] it resolves to (if any) and
//! what it is about.

pub mod social;

use serde::{Deserialize, Serialize};

use notifyhub_core::types::id::{PersonId, UserId};

use crate::notification::{NotificationKind, TargetRef};

pub use social::SocialEvent;

/// The user a notification is delivered to, with the person they act as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    /// The owning user account.
    pub user_id: UserId,
    /// The person identity of that user, compared against actors.
    pub person_id: PersonId,
}

impl Recipient {
    /// Create a new recipient.
    pub fn new(user_id: UserId, person_id: PersonId) -> Self {
        Self { user_id, person_id }
    }

    /// Whether `actor` is this recipient acting on their own content.
    pub fn is_self(&self, actor: &PersonId) -> bool {
        self.person_id == *actor
    }
}

/// An event that may produce a notification.
pub trait Notifiable {
    /// The notification category this event declares for `recipient`.
    ///
    /// `None` means the event is not notifiable for that recipient.
    fn notification_kind(&self, recipient: &Recipient) -> Option<NotificationKind>;

    /// The object the resulting notification is about.
    fn notification_target(&self) -> TargetRef;
}
