//! Inputs and outputs of the presentation-facing operations.

use serde::{Deserialize, Serialize};

use notifyhub_core::types::id::NotificationId;
use notifyhub_core::types::pagination::PageResponse;
use notifyhub_core::types::sorting::SortDirection;
use notifyhub_entity::notification::{DayGroup, Notification, TypeCounts};

/// List filters as they arrive from the presentation layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    /// Type tag filter; blank means every kind.
    #[serde(default, rename = "type")]
    pub type_tag: Option<String>,
    /// Only unread notifications.
    #[serde(default)]
    pub unread_only: bool,
    /// Page number (1-based).
    #[serde(default)]
    pub page: Option<u64>,
    /// Page size; falls back to the configured default.
    #[serde(default)]
    pub per_page: Option<u64>,
    /// Order on `created_at`.
    #[serde(default)]
    pub order: SortDirection,
}

impl ListParams {
    /// Filter on a type tag.
    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.type_tag = Some(tag.into());
        self
    }

    /// Only unread notifications.
    pub fn unread(mut self) -> Self {
        self.unread_only = true;
        self
    }

    /// Request a specific page.
    pub fn page(mut self, page: u64, per_page: u64) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }
}

/// Everything the notifications index page needs in one call.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationIndex {
    /// The requested page.
    pub notifications: PageResponse<Notification>,
    /// Unread notifications of the recipient, unfiltered.
    pub unread_count: u64,
    /// Unread counts per type tag, covering every declared kind.
    pub grouped_unread_counts: TypeCounts,
    /// The page's notifications bucketed by creation day.
    pub days: Vec<DayGroup>,
}

/// Result of toggling one notification's read state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStateChange {
    /// The toggled notification.
    pub id: NotificationId,
    /// Its new state.
    pub unread: bool,
}

/// Result of a bulk mark-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadAllOutcome {
    /// Notifications flipped to read.
    pub marked: u64,
    /// Unread notifications the recipient still has (other kinds).
    pub remaining_unread: u64,
}
