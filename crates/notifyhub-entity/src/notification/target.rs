//! Polymorphic reference to the object a notification is about.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use notifyhub_core::error::AppError;

/// Type of the object a notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    /// A status message or reshare.
    Post,
    /// A comment.
    Comment,
    /// A person (e.g. someone who started sharing).
    Person,
    /// A private conversation.
    Conversation,
}

impl TargetType {
    /// Return the stored name of the target type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "Post",
            Self::Comment => "Comment",
            Self::Person => "Person",
            Self::Conversation => "Conversation",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Post" => Ok(Self::Post),
            "Comment" => Ok(Self::Comment),
            "Person" => Ok(Self::Person),
            "Conversation" => Ok(Self::Conversation),
            other => Err(AppError::validation(format!("Unknown target type '{other}'"))),
        }
    }
}

/// `(target_type, target_id)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    /// Type of the referenced object.
    pub target_type: TargetType,
    /// Identifier of the referenced object.
    pub target_id: Uuid,
}

impl TargetRef {
    /// Create a new target reference.
    pub fn new(target_type: TargetType, target_id: Uuid) -> Self {
        Self {
            target_type,
            target_id,
        }
    }

    /// Reference a post.
    pub fn post(id: Uuid) -> Self {
        Self::new(TargetType::Post, id)
    }

    /// Reference a person.
    pub fn person(id: Uuid) -> Self {
        Self::new(TargetType::Person, id)
    }

    /// Reference a conversation.
    pub fn conversation(id: Uuid) -> Self {
        Self::new(TargetType::Conversation, id)
    }

    /// Whether the reference points at something.
    pub fn is_present(&self) -> bool {
        !self.target_id.is_nil()
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_type, self.target_id)
    }
}
