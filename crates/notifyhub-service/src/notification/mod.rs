//! Notification aggregation and query service.

pub mod params;
pub mod service;

pub use params::{ListParams, NotificationIndex, ReadAllOutcome, ReadStateChange};
pub use service::NotificationService;
