//! PostgreSQL notification store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use notifyhub_core::error::AppError;
use notifyhub_core::result::AppResult;
use notifyhub_core::types::id::{NotificationId, PersonId, UserId};
use notifyhub_core::types::pagination::{PageRequest, PageResponse};
use notifyhub_entity::notification::{
    ActorSet, Notification, NotificationKey, NotificationKind, TargetRef, TargetType,
};

use crate::error::db_error;
use crate::store::{Aggregation, NotificationQuery, NotificationStore};

const COLUMNS: &str = "id, recipient_id, target_type, target_id, kind, unread, created_at";

/// A `notifications` row before its actors are attached.
#[derive(Debug, Clone, FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    target_type: String,
    target_id: Uuid,
    kind: String,
    unread: bool,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_entity(self, actors: ActorSet) -> AppResult<Notification> {
        let target_type: TargetType = self.target_type.parse().map_err(|e: AppError| {
            AppError::database(format!("Corrupt notification {}: {}", self.id, e.message))
        })?;
        let kind: NotificationKind = self.kind.parse().map_err(|e: AppError| {
            AppError::database(format!("Corrupt notification {}: {}", self.id, e.message))
        })?;
        Ok(Notification {
            id: NotificationId::from_uuid(self.id),
            recipient_id: UserId::from_uuid(self.recipient_id),
            target: TargetRef::new(target_type, self.target_id),
            kind,
            unread: self.unread,
            created_at: self.created_at,
            actors,
        })
    }
}

/// [`NotificationStore`] backed by PostgreSQL.
///
/// The partial unique index on `(recipient_id, target_type, target_id, kind)
/// WHERE unread` makes the find-or-create race-free; actor links are removed
/// by `ON DELETE CASCADE`.
#[derive(Debug, Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    /// Create a new notification store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach actor sets to rows, keeping row order.
    async fn hydrate(&self, rows: Vec<NotificationRow>) -> AppResult<Vec<Notification>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let actors = load_actors(&self.pool, &ids).await?;
        attach_actors(rows, actors)
    }
}

fn attach_actors(
    rows: Vec<NotificationRow>,
    mut actors: HashMap<Uuid, ActorSet>,
) -> AppResult<Vec<Notification>> {
    rows.into_iter()
        .map(|row| {
            let set = actors.remove(&row.id).unwrap_or_default();
            row.into_entity(set)
        })
        .collect()
}

/// Clamp a page bound into the `BIGINT` range Postgres accepts.
fn to_bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Count the recipient's notifications matching `query`.
async fn count_matching<'e, E>(
    executor: E,
    recipient: UserId,
    query: &NotificationQuery,
) -> AppResult<u64>
where
    E: PgExecutor<'e>,
{
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications");
    push_filters(&mut qb, recipient, query);

    let count: i64 = qb
        .build_query_scalar::<i64>()
        .fetch_one(executor)
        .await
        .map_err(|e| db_error("Failed to count notifications", e))?;
    Ok(count.max(0) as u64)
}

/// Load the actor sets of `ids`, in link insertion order.
async fn load_actors<'e, E>(executor: E, ids: &[Uuid]) -> AppResult<HashMap<Uuid, ActorSet>>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let links: Vec<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT notification_id, person_id FROM notification_actors \
         WHERE notification_id = ANY($1) ORDER BY id",
    )
    .bind(ids)
    .fetch_all(executor)
    .await
    .map_err(|e| db_error("Failed to load notification actors", e))?;

    let mut sets: HashMap<Uuid, ActorSet> = HashMap::new();
    for (notification_id, person_id) in links {
        sets.entry(notification_id)
            .or_default()
            .add(PersonId::from_uuid(person_id));
    }
    Ok(sets)
}

/// Append the recipient and filter predicates to `qb`.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, recipient: UserId, query: &NotificationQuery) {
    qb.push(" WHERE recipient_id = ");
    qb.push_bind(recipient.into_uuid());
    if query.unread_only {
        qb.push(" AND unread");
    }
    if let Some(kind) = query.kind {
        qb.push(" AND kind = ");
        qb.push_bind(kind.as_str());
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn concatenate_or_create(
        &self,
        key: &NotificationKey,
        actor: PersonId,
        now: DateTime<Utc>,
    ) -> AppResult<Aggregation> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let inserted = sqlx::query_as::<_, NotificationRow>(&format!(
            "INSERT INTO notifications (id, recipient_id, target_type, target_id, kind, unread, created_at) \
             VALUES ($1, $2, $3, $4, $5, TRUE, $6) \
             ON CONFLICT (recipient_id, target_type, target_id, kind) WHERE unread DO NOTHING \
             RETURNING {COLUMNS}"
        ))
        .bind(NotificationId::new().into_uuid())
        .bind(key.recipient_id.into_uuid())
        .bind(key.target.target_type.as_str())
        .bind(key.target.target_id)
        .bind(key.kind.as_str())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to create notification", e))?;

        let (row, created) = match inserted {
            Some(row) => (row, true),
            None => {
                let existing = sqlx::query_as::<_, NotificationRow>(&format!(
                    "SELECT {COLUMNS} FROM notifications \
                     WHERE recipient_id = $1 AND target_type = $2 AND target_id = $3 \
                     AND kind = $4 AND unread FOR UPDATE"
                ))
                .bind(key.recipient_id.into_uuid())
                .bind(key.target.target_type.as_str())
                .bind(key.target.target_id)
                .bind(key.kind.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("Failed to lock unread notification", e))?;

                match existing {
                    Some(row) => (row, false),
                    None => {
                        // Read between our insert attempt and the lock.
                        return Err(AppError::conflict(format!(
                            "Unread notification for {} changed concurrently",
                            key.target
                        )));
                    }
                }
            }
        };

        let linked = sqlx::query(
            "INSERT INTO notification_actors (notification_id, person_id, created_at) \
             VALUES ($1, $2, $3) ON CONFLICT (notification_id, person_id) DO NOTHING",
        )
        .bind(row.id)
        .bind(actor.into_uuid())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to link notification actor", e))?;
        let actor_added = linked.rows_affected() > 0;

        let mut actors = load_actors(&mut *tx, &[row.id]).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit notification", e))?;

        debug!(
            notification_id = %row.id,
            created,
            actor_added,
            "Concatenate-or-create applied"
        );

        let set = actors.remove(&row.id).unwrap_or_default();
        Ok(Aggregation {
            notification: row.into_entity(set)?,
            created,
            actor_added,
        })
    }

    async fn find_by_id(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> AppResult<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE id = $1 AND recipient_id = $2"
        ))
        .bind(id.into_uuid())
        .bind(recipient.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find notification", e))?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        recipient: UserId,
        query: &NotificationQuery,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Notification>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;
        // Total and page must come from the same snapshot.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to set isolation level", e))?;

        let total = count_matching(&mut *tx, recipient, query).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM notifications"));
        push_filters(&mut qb, recipient, query);
        let direction = query.order.as_sql();
        qb.push(format!(" ORDER BY created_at {direction}, id {direction} LIMIT "));
        qb.push_bind(to_bigint(page.limit()));
        qb.push(" OFFSET ");
        qb.push_bind(to_bigint(page.offset()));

        let rows = qb
            .build_query_as::<NotificationRow>()
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to list notifications", e))?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let actors = load_actors(&mut *tx, &ids).await?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to finish list transaction", e))?;

        let items = attach_actors(rows, actors)?;
        Ok(PageResponse::new(items, page.page, page.page_size, total))
    }

    async fn count(&self, recipient: UserId, query: &NotificationQuery) -> AppResult<u64> {
        count_matching(&self.pool, recipient, query).await
    }

    async fn count_by_kind(
        &self,
        recipient: UserId,
        query: &NotificationQuery,
    ) -> AppResult<BTreeMap<NotificationKind, u64>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT kind, COUNT(*) FROM notifications");
        push_filters(&mut qb, recipient, query);
        qb.push(" GROUP BY kind");

        let rows = qb
            .build_query_as::<(String, i64)>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count notifications by kind", e))?;

        let mut counts = BTreeMap::new();
        for (kind, count) in rows {
            let kind: NotificationKind = kind.parse()?;
            counts.insert(kind, count.max(0) as u64);
        }
        Ok(counts)
    }

    async fn set_read_state(
        &self,
        recipient: UserId,
        id: NotificationId,
        unread: bool,
    ) -> AppResult<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "UPDATE notifications SET unread = $3, updated_at = NOW() \
             WHERE id = $1 AND recipient_id = $2 RETURNING {COLUMNS}"
        ))
        .bind(id.into_uuid())
        .bind(recipient.into_uuid())
        .bind(unread)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update notification read state", e))?
        .ok_or_else(|| AppError::not_found(format!("Notification {id} not found")))?;

        self.hydrate(vec![row])
            .await?
            .pop()
            .ok_or_else(|| AppError::internal("Hydrated notification vanished"))
    }

    async fn mark_all_read(
        &self,
        recipient: UserId,
        kind: Option<NotificationKind>,
    ) -> AppResult<u64> {
        let mut qb =
            QueryBuilder::<Postgres>::new("UPDATE notifications SET unread = FALSE, updated_at = NOW()");
        let query = NotificationQuery::new().unread_only(true).by_type(kind);
        push_filters(&mut qb, recipient, &query);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to mark all read", e))?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, recipient: UserId, id: NotificationId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id.into_uuid())
            .bind(recipient.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete notification", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Notification {id} not found")));
        }
        Ok(())
    }

    async fn delete_for_recipient(&self, recipient: UserId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE recipient_id = $1")
            .bind(recipient.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete recipient notifications", e))?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| db_error("Health check failed", e))
    }
}
