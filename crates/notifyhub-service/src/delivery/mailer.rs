//! Mail delivery trait and built-in implementations.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use notifyhub_core::result::AppResult;
use notifyhub_core::types::id::PersonId;
use notifyhub_entity::event::Recipient;
use notifyhub_entity::notification::Notification;

/// Everything a mailer needs to notify a recipient about a new notification.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryRequest {
    /// Who receives the mail.
    pub recipient: Recipient,
    /// The freshly created notification.
    pub notification: Notification,
    /// The actor whose event created it.
    pub actor: PersonId,
    /// Mail template from the kind's policy.
    pub template: &'static str,
}

/// Sends notification mail.
///
/// Invoked only for freshly created notifications. Errors are logged by the
/// caller and never undo the notification.
#[async_trait]
pub trait NotificationMailer: Send + Sync + 'static {
    /// Deliver one notification mail.
    async fn send_notification_email(&self, request: &DeliveryRequest) -> AppResult<()>;
}

/// Mailer that only records the delivery in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl NotificationMailer for LogMailer {
    async fn send_notification_email(&self, request: &DeliveryRequest) -> AppResult<()> {
        info!(
            recipient = %request.recipient.user_id,
            notification_id = %request.notification.id,
            actor = %request.actor,
            template = request.template,
            "Notification mail queued"
        );
        Ok(())
    }
}

/// Mailer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMailer;

#[async_trait]
impl NotificationMailer for NoopMailer {
    async fn send_notification_email(&self, _request: &DeliveryRequest) -> AppResult<()> {
        Ok(())
    }
}
