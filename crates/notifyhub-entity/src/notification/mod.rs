//! Notification domain entities.

pub mod actor_set;
pub mod grouping;
pub mod kind;
pub mod model;
pub mod target;

pub use actor_set::ActorSet;
pub use grouping::{DayGroup, TypeCounts, group_by_day, group_by_type, type_counts_from};
pub use kind::{KindFilter, KindPolicy, NotificationKind, type_tag_for};
pub use model::{Notification, NotificationKey};
pub use target::{TargetRef, TargetType};
