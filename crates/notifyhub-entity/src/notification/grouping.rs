//! Display grouping: counts per type tag and buckets per creation day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::kind::NotificationKind;
use super::model::Notification;

/// Count per type tag. Always holds every declared kind.
pub type TypeCounts = BTreeMap<&'static str, u64>;

/// Count `items` by type tag, reporting zero for kinds that do not occur.
pub fn group_by_type<'a, I>(items: I) -> TypeCounts
where
    I: IntoIterator<Item = &'a Notification>,
{
    type_counts_from(items.into_iter().map(|n| (n.kind, 1)))
}

/// Fold observed `(kind, count)` pairs into full coverage of declared kinds.
pub fn type_counts_from<I>(observed: I) -> TypeCounts
where
    I: IntoIterator<Item = (NotificationKind, u64)>,
{
    let mut counts: TypeCounts = NotificationKind::ALL
        .iter()
        .map(|kind| (kind.as_str(), 0))
        .collect();
    for (kind, count) in observed {
        *counts.entry(kind.as_str()).or_insert(0) += count;
    }
    counts
}

/// Notifications created on the same UTC calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayGroup {
    /// The day shared by every notification in the group.
    pub day: NaiveDate,
    /// The notifications, in the order they were given.
    pub notifications: Vec<Notification>,
}

/// Bucket `items` by [`Notification::day_created`].
///
/// Groups appear in order of first occurrence so a page sorted by
/// `created_at` yields days in the same direction.
pub fn group_by_day(items: &[Notification]) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();
    for n in items {
        let day = n.day_created();
        match groups.iter_mut().find(|g| g.day == day) {
            Some(group) => group.notifications.push(n.clone()),
            None => groups.push(DayGroup {
                day,
                notifications: vec![n.clone()],
            }),
        }
    }
    groups
}
