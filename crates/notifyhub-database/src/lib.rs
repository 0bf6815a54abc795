//! # notifyhub-database
//!
//! Persistence for notifications. [`NotificationStore`] is the query and
//! mutation surface used by the service layer; it is implemented by
//! [`PgNotificationStore`] for PostgreSQL and by
//! [`MemoryNotificationStore`] for single-process use and tests.

pub mod connection;
pub mod error;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryNotificationStore;
pub use repositories::PgNotificationStore;
pub use store::{Aggregation, NotificationQuery, NotificationStore};
