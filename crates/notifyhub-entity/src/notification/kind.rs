//! Notification kinds, their type tags, and the per-kind policy table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use notifyhub_core::error::AppError;

/// Category of a notifiable event.
///
/// Variants are declared in type-tag order so that `Ord` and the tag order
/// used for grouped counts agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone commented on a post the recipient also commented on.
    AlsoCommented,
    /// Someone commented on the recipient's post.
    CommentOnPost,
    /// Someone liked the recipient's post.
    Liked,
    /// The recipient was mentioned in a post.
    Mentioned,
    /// The recipient received a private message.
    PrivateMessage,
    /// Someone reshared the recipient's post.
    Reshared,
    /// Someone started sharing with the recipient.
    StartedSharing,
}

/// Behaviour attached to a [`NotificationKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPolicy {
    /// Key of the display template used by the presentation layer.
    pub template: &'static str,
    /// Whether events performed by the recipient themself are dropped.
    pub suppress_self: bool,
    /// Mail template for fresh notifications, `None` disables mail.
    pub mail_template: Option<&'static str>,
}

const POLICIES: [KindPolicy; 7] = [
    KindPolicy {
        template: "notifications.also_commented",
        suppress_self: true,
        mail_template: Some("also_commented"),
    },
    KindPolicy {
        template: "notifications.comment_on_post",
        suppress_self: true,
        mail_template: Some("comment_on_post"),
    },
    KindPolicy {
        template: "notifications.liked",
        suppress_self: true,
        mail_template: Some("liked"),
    },
    KindPolicy {
        template: "notifications.mentioned",
        suppress_self: true,
        mail_template: Some("mentioned"),
    },
    KindPolicy {
        template: "notifications.private_message",
        suppress_self: true,
        mail_template: Some("private_message"),
    },
    KindPolicy {
        template: "notifications.reshared",
        suppress_self: true,
        mail_template: Some("reshared"),
    },
    KindPolicy {
        template: "notifications.started_sharing",
        suppress_self: false,
        mail_template: Some("started_sharing"),
    },
];

impl NotificationKind {
    /// Every declared kind, in tag order.
    pub const ALL: [NotificationKind; 7] = [
        Self::AlsoCommented,
        Self::CommentOnPost,
        Self::Liked,
        Self::Mentioned,
        Self::PrivateMessage,
        Self::Reshared,
        Self::StartedSharing,
    ];

    /// The type tag used for filtering and grouped counts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlsoCommented => "also_commented",
            Self::CommentOnPost => "comment_on_post",
            Self::Liked => "liked",
            Self::Mentioned => "mentioned",
            Self::PrivateMessage => "private_message",
            Self::Reshared => "reshared",
            Self::StartedSharing => "started_sharing",
        }
    }

    /// Class-style name, e.g. `CommentOnPost`.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::AlsoCommented => "AlsoCommented",
            Self::CommentOnPost => "CommentOnPost",
            Self::Liked => "Liked",
            Self::Mentioned => "Mentioned",
            Self::PrivateMessage => "PrivateMessage",
            Self::Reshared => "Reshared",
            Self::StartedSharing => "StartedSharing",
        }
    }

    /// Look up the policy row for this kind.
    pub fn policy(&self) -> &'static KindPolicy {
        &POLICIES[*self as usize]
    }
}

/// A type-tag filter as supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    /// Blank or absent tag: no restriction.
    Any,
    /// Restrict to one declared kind.
    Only(NotificationKind),
    /// A tag no declared kind carries; matches nothing.
    Unmatched,
}

impl KindFilter {
    /// Parse an optional type tag. Never fails: unknown tags select nothing.
    pub fn parse(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            None | Some("") => Self::Any,
            Some(tag) => tag.parse().map_or(Self::Unmatched, Self::Only),
        }
    }

    /// The kind to restrict to, if any.
    pub fn kind(&self) -> Option<NotificationKind> {
        match self {
            Self::Only(kind) => Some(*kind),
            Self::Any | Self::Unmatched => None,
        }
    }

    /// Whether no notification can pass this filter.
    pub fn is_unmatched(&self) -> bool {
        matches!(self, Self::Unmatched)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    /// Accepts the tag (`comment_on_post`), the class name
    /// (`CommentOnPost`) or a namespaced name (`Notifications::CommentOnPost`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = type_tag_for(s);
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| AppError::validation(format!("Unknown notification type '{s}'")))
    }
}

/// Derive a type tag from a type name: strip any `::` or `.` namespace and
/// convert the remainder to snake_case.
pub fn type_tag_for(type_name: &str) -> String {
    let base = type_name
        .rsplit("::")
        .next()
        .unwrap_or(type_name)
        .rsplit('.')
        .next()
        .unwrap_or(type_name)
        .trim();

    let chars: Vec<char> = base.chars().collect();
    let mut tag = String::with_capacity(base.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '_' {
            if !tag.is_empty() && !tag.ends_with('_') {
                tag.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !tag.ends_with('_') {
                tag.push('_');
            }
            tag.extend(c.to_lowercase());
        } else {
            tag.push(c);
        }
    }
    tag
}
