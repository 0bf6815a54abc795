//! Notification engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Settings for aggregation, conflict retries, delivery and listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Drop events whose acting actor is the recipient.
    #[serde(default = "default_true")]
    pub suppress_self_notifications: bool,
    /// Master switch for the mail delivery collaborator.
    #[serde(default = "default_true")]
    pub email_enabled: bool,
    /// How many times a contended find-or-create is retried.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    /// Base backoff between retries, multiplied by the attempt number.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Page size used when the caller does not ask for one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// Upper bound on a requested page size.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

impl NotificationsConfig {
    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(AppError::configuration(
                "notifications page sizes must be positive",
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(AppError::configuration(
                "notifications.default_page_size exceeds notifications.max_page_size",
            ));
        }
        Ok(())
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            suppress_self_notifications: true,
            email_enabled: true,
            max_conflict_retries: default_max_conflict_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    25
}

fn default_page_size() -> u64 {
    25
}

fn default_max_page_size() -> u64 {
    100
}
