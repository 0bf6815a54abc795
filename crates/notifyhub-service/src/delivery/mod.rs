//! Outbound delivery collaborator for freshly created notifications.

pub mod mailer;

pub use mailer::{DeliveryRequest, LogMailer, NoopMailer, NotificationMailer};
