//! Concrete social-network events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use notifyhub_core::types::id::PersonId;

use super::{Notifiable, Recipient};
use crate::notification::{NotificationKind, TargetRef};

/// Events emitted by the social layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SocialEvent {
    /// A comment was posted on a post.
    Comment {
        /// The new comment.
        comment_id: Uuid,
        /// The post being commented on.
        post_id: Uuid,
        /// Author of that post.
        post_author: PersonId,
    },
    /// A post was liked.
    Like {
        /// The post being liked.
        post_id: Uuid,
        /// Author of that post.
        post_author: PersonId,
    },
    /// A post was reshared.
    Reshare {
        /// The original post.
        root_post_id: Uuid,
        /// Author of the original post.
        root_author: PersonId,
    },
    /// Someone was mentioned in a post.
    Mention {
        /// The post containing the mention.
        post_id: Uuid,
        /// The mentioned person.
        mentioned: PersonId,
    },
    /// A private message was sent in a conversation.
    Message {
        /// The conversation.
        conversation_id: Uuid,
    },
    /// Someone started sharing with the recipient.
    StartedSharing {
        /// The person who started sharing.
        sharer: PersonId,
    },
    /// Content was retracted. Never notifies.
    Retraction {
        /// The retracted object.
        target: TargetRef,
    },
    /// A profile was updated. Never notifies.
    ProfileUpdated {
        /// The person whose profile changed.
        person: PersonId,
    },
}

impl Notifiable for SocialEvent {
    fn notification_kind(&self, recipient: &Recipient) -> Option<NotificationKind> {
        match self {
            Self::Comment { post_author, .. } => {
                if recipient.person_id == *post_author {
                    Some(NotificationKind::CommentOnPost)
                } else {
                    Some(NotificationKind::AlsoCommented)
                }
            }
            Self::Like { post_author, .. } => {
                (recipient.person_id == *post_author).then_some(NotificationKind::Liked)
            }
            Self::Reshare { root_author, .. } => {
                (recipient.person_id == *root_author).then_some(NotificationKind::Reshared)
            }
            Self::Mention { mentioned, .. } => {
                (recipient.person_id == *mentioned).then_some(NotificationKind::Mentioned)
            }
            Self::Message { .. } => Some(NotificationKind::PrivateMessage),
            Self::StartedSharing { .. } => Some(NotificationKind::StartedSharing),
            Self::Retraction { .. } | Self::ProfileUpdated { .. } => None,
        }
    }

    fn notification_target(&self) -> TargetRef {
        match self {
            Self::Comment { post_id, .. }
            | Self::Like { post_id, .. }
            | Self::Mention { post_id, .. } => TargetRef::post(*post_id),
            Self::Reshare { root_post_id, .. } => TargetRef::post(*root_post_id),
            Self::Message { conversation_id } => TargetRef::conversation(*conversation_id),
            Self::StartedSharing { sharer } => TargetRef::person(sharer.into_uuid()),
            Self::Retraction { target } => *target,
            Self::ProfileUpdated { person } => TargetRef::person(person.into_uuid()),
        }
    }
}
