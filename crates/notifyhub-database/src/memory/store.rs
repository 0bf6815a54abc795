//! In-memory notification store using a Tokio mutex.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use notifyhub_core::error::AppError;
use notifyhub_core::result::AppResult;
use notifyhub_core::types::id::{NotificationId, PersonId, UserId};
use notifyhub_core::types::pagination::{PageRequest, PageResponse};
use notifyhub_core::types::sorting::SortDirection;
use notifyhub_entity::notification::{ActorSet, Notification, NotificationKey, NotificationKind};

use crate::store::{Aggregation, NotificationQuery, NotificationStore};

/// One actor-link row.
#[derive(Debug, Clone, Copy)]
struct ActorLink {
    notification_id: NotificationId,
    person_id: PersonId,
}

/// Internal state: notification rows (with empty actor sets) and link rows.
#[derive(Debug, Default)]
struct InnerState {
    rows: HashMap<NotificationId, Notification>,
    links: Vec<ActorLink>,
}

impl InnerState {
    fn hydrate(&self, row: &Notification) -> Notification {
        let mut n = row.clone();
        n.actors = self
            .links
            .iter()
            .filter(|link| link.notification_id == row.id)
            .map(|link| link.person_id)
            .collect::<ActorSet>();
        n
    }

    fn unread_for_key(&self, key: &NotificationKey) -> Option<NotificationId> {
        self.rows
            .values()
            .find(|n| n.unread && n.key() == *key)
            .map(|n| n.id)
    }

    fn owned(&self, recipient: UserId, id: NotificationId) -> Option<&Notification> {
        self.rows.get(&id).filter(|n| n.recipient_id == recipient)
    }

    fn link(&mut self, notification_id: NotificationId, person_id: PersonId) -> bool {
        let exists = self
            .links
            .iter()
            .any(|l| l.notification_id == notification_id && l.person_id == person_id);
        if exists {
            return false;
        }
        self.links.push(ActorLink {
            notification_id,
            person_id,
        });
        true
    }

    fn remove(&mut self, id: NotificationId) {
        self.rows.remove(&id);
        self.links.retain(|l| l.notification_id != id);
    }

    fn matching(&self, recipient: UserId, query: &NotificationQuery) -> Vec<&Notification> {
        self.rows
            .values()
            .filter(|n| n.recipient_id == recipient && query.matches(n))
            .collect()
    }
}

/// In-memory [`NotificationStore`] guarded by a single Tokio mutex.
///
/// Every operation holds the lock for its whole duration, which makes
/// find-or-create and bulk updates atomic. Suitable for single-process use.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationStore {
    state: Arc<Mutex<InnerState>>,
}

impl MemoryNotificationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actor-link rows currently stored.
    pub async fn actor_link_count(&self) -> usize {
        self.state.lock().await.links.len()
    }

    /// Number of notification rows currently stored, across all recipients.
    pub async fn len(&self) -> usize {
        self.state.lock().await.rows.len()
    }

    /// Whether the store holds no notifications.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.rows.is_empty()
    }

    /// Insert a fully-formed notification, bypassing aggregation.
    ///
    /// Used to seed state, including read notifications.
    pub async fn insert(&self, notification: Notification) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if notification.unread {
            if let Some(existing) = state.unread_for_key(&notification.key()) {
                return Err(AppError::conflict(format!(
                    "Unread notification {existing} already exists for {}",
                    notification.target
                )));
            }
        }
        let id = notification.id;
        let actors: Vec<PersonId> = notification.actors.iter().copied().collect();
        let mut row = notification;
        row.actors = ActorSet::new();
        state.rows.insert(id, row);
        for actor in actors {
            state.link(id, actor);
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn concatenate_or_create(
        &self,
        key: &NotificationKey,
        actor: PersonId,
        now: DateTime<Utc>,
    ) -> AppResult<Aggregation> {
        let mut state = self.state.lock().await;

        let (id, created) = match state.unread_for_key(key) {
            Some(id) => (id, false),
            None => {
                let mut row = Notification::new(*key, actor, now);
                row.actors = ActorSet::new();
                let id = row.id;
                state.rows.insert(id, row);
                (id, true)
            }
        };
        let actor_added = state.link(id, actor);

        debug!(notification_id = %id, created, actor_added, "Concatenate-or-create applied");

        let row = state
            .rows
            .get(&id)
            .ok_or_else(|| AppError::internal("Notification vanished while locked"))?;
        Ok(Aggregation {
            notification: state.hydrate(row),
            created,
            actor_added,
        })
    }

    async fn find_by_id(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> AppResult<Option<Notification>> {
        let state = self.state.lock().await;
        Ok(state.owned(recipient, id).map(|row| state.hydrate(row)))
    }

    async fn list(
        &self,
        recipient: UserId,
        query: &NotificationQuery,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Notification>> {
        let state = self.state.lock().await;
        let mut rows = state.matching(recipient, query);
        rows.sort_by_key(|n| (n.created_at, n.id));
        if query.order == SortDirection::Desc {
            rows.reverse();
        }

        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|row| state.hydrate(row))
            .collect();
        Ok(PageResponse::new(items, page.page, page.page_size, total))
    }

    async fn count(&self, recipient: UserId, query: &NotificationQuery) -> AppResult<u64> {
        let state = self.state.lock().await;
        Ok(state.matching(recipient, query).len() as u64)
    }

    async fn count_by_kind(
        &self,
        recipient: UserId,
        query: &NotificationQuery,
    ) -> AppResult<BTreeMap<NotificationKind, u64>> {
        let state = self.state.lock().await;
        let mut counts = BTreeMap::new();
        for n in state.matching(recipient, query) {
            *counts.entry(n.kind).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn set_read_state(
        &self,
        recipient: UserId,
        id: NotificationId,
        unread: bool,
    ) -> AppResult<Notification> {
        let mut state = self.state.lock().await;
        let key = state
            .owned(recipient, id)
            .map(|n| n.key())
            .ok_or_else(|| AppError::not_found(format!("Notification {id} not found")))?;

        if unread {
            if let Some(other) = state.unread_for_key(&key).filter(|other| *other != id) {
                return Err(AppError::conflict(format!(
                    "Notification {other} is already unread for {}",
                    key.target
                )));
            }
        }

        let row = state
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Notification {id} not found")))?;
        row.set_read_state(unread);
        let row = row.clone();
        Ok(state.hydrate(&row))
    }

    async fn mark_all_read(
        &self,
        recipient: UserId,
        kind: Option<NotificationKind>,
    ) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let query = NotificationQuery::new().unread_only(true).by_type(kind);
        let mut affected = 0;
        for row in state.rows.values_mut() {
            if row.recipient_id == recipient && query.matches(row) {
                row.set_read_state(false);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete(&self, recipient: UserId, id: NotificationId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.owned(recipient, id).is_none() {
            return Err(AppError::not_found(format!("Notification {id} not found")));
        }
        state.remove(id);
        Ok(())
    }

    async fn delete_for_recipient(&self, recipient: UserId) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let ids: Vec<NotificationId> = state
            .rows
            .values()
            .filter(|n| n.recipient_id == recipient)
            .map(|n| n.id)
            .collect();
        for id in &ids {
            state.remove(*id);
        }
        Ok(ids.len() as u64)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
