//! # notifyhub-service
//!
//! Business logic for NotifyHub. [`NotificationService`] turns incoming
//! social events into notifications, merging actors into an existing unread
//! notification when one exists for the same recipient, target and kind,
//! and serves the list, count and read-state operations used by the
//! presentation layer.
//!
//! Services follow constructor injection: the store and the mail delivery
//! collaborator are provided as `Arc<dyn ...>` at construction time.

pub mod delivery;
pub mod notification;

pub use delivery::{DeliveryRequest, LogMailer, NoopMailer, NotificationMailer};
pub use notification::{
    ListParams, NotificationIndex, NotificationService, ReadAllOutcome, ReadStateChange,
};
