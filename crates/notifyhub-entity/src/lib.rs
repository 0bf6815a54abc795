//! # notifyhub-entity
//!
//! Domain entity models for NotifyHub: the [`Notification`] aggregate with
//! its read/unread state and [`ActorSet`], the declared
//! [`NotificationKind`]s with their policy table, and the social events
//! that can resolve to a notification.
//!
//! [`Notification`]: notification::Notification
//! [`ActorSet`]: notification::ActorSet
//! [`NotificationKind`]: notification::NotificationKind

pub mod event;
pub mod notification;
