//! Notification aggregation, listing, and read-state management.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use notifyhub_core::config::NotificationsConfig;
use notifyhub_core::error::AppError;
use notifyhub_core::types::id::{NotificationId, PersonId, UserId};
use notifyhub_core::types::pagination::{PageRequest, PageResponse};
use notifyhub_database::store::{Aggregation, NotificationQuery, NotificationStore};
use notifyhub_entity::event::{Notifiable, Recipient};
use notifyhub_entity::notification::{
    KindFilter, Notification, NotificationKey, TypeCounts, group_by_day, type_counts_from,
};

use super::params::{ListParams, NotificationIndex, ReadAllOutcome, ReadStateChange};
use crate::delivery::{DeliveryRequest, NotificationMailer};

/// Creates, merges, lists and updates notifications.
#[derive(Clone)]
pub struct NotificationService {
    /// Notification persistence.
    store: Arc<dyn NotificationStore>,
    /// Mail delivery for fresh notifications.
    mailer: Arc<dyn NotificationMailer>,
    /// Engine settings.
    config: NotificationsConfig,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NotificationService {
    /// Creates a new notification service.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        mailer: Arc<dyn NotificationMailer>,
        config: NotificationsConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    /// Notify `recipient` that `actor` performed `event`.
    ///
    /// Returns `None` when the event is not notifiable for this recipient or
    /// is the recipient's own action. Otherwise the actor is merged into the
    /// unread notification for the same target and kind, or a new unread
    /// notification is created. Mail goes out for new notifications only.
    pub async fn notify<E>(
        &self,
        recipient: &Recipient,
        event: &E,
        actor: PersonId,
    ) -> Result<Option<Notification>, AppError>
    where
        E: Notifiable + ?Sized,
    {
        let Some(kind) = event.notification_kind(recipient) else {
            debug!(recipient = %recipient.user_id, "Event is not notifiable for recipient");
            return Ok(None);
        };

        if self.config.suppress_self_notifications
            && kind.policy().suppress_self
            && recipient.is_self(&actor)
        {
            debug!(recipient = %recipient.user_id, kind = %kind, "Self notification suppressed");
            return Ok(None);
        }

        let key = NotificationKey::new(recipient.user_id, event.notification_target(), kind);
        key.validate()?;
        if actor.is_nil() {
            return Err(AppError::validation("Notification actor is missing"));
        }

        let aggregation = self.concatenate_or_create(&key, actor).await?;
        let notification = aggregation.notification;

        if aggregation.created {
            info!(
                notification_id = %notification.id,
                recipient = %recipient.user_id,
                kind = %kind,
                target = %key.target,
                "Notification created"
            );
            self.deliver(recipient, &notification, actor).await;
        } else {
            debug!(
                notification_id = %notification.id,
                actor = %actor,
                actor_added = aggregation.actor_added,
                actors = notification.actors.count(),
                "Actor merged into unread notification"
            );
        }

        Ok(Some(notification))
    }

    /// Find-or-create with bounded retries on contention.
    async fn concatenate_or_create(
        &self,
        key: &NotificationKey,
        actor: PersonId,
    ) -> Result<Aggregation, AppError> {
        let max_retries = self.config.max_conflict_retries;
        let mut attempt: u32 = 0;
        loop {
            match self.store.concatenate_or_create(key, actor, Utc::now()).await {
                Ok(aggregation) => return Ok(aggregation),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    debug!(attempt, error = %e, "Retrying contended notification write");
                    let backoff = self.config.retry_backoff_ms * u64::from(attempt);
                    if backoff > 0 {
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempts = attempt + 1, error = %e, "Notification write still contended");
                    return Err(AppError::conflict(format!(
                        "Notification for {} is contended, gave up after {} attempts",
                        key.target,
                        attempt + 1
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Hand a fresh notification to the mailer; failures are only logged.
    async fn deliver(&self, recipient: &Recipient, notification: &Notification, actor: PersonId) {
        if !self.config.email_enabled {
            return;
        }
        let Some(template) = notification.kind.policy().mail_template else {
            return;
        };

        let request = DeliveryRequest {
            recipient: *recipient,
            notification: notification.clone(),
            actor,
            template,
        };
        if let Err(e) = self.mailer.send_notification_email(&request).await {
            warn!(
                notification_id = %notification.id,
                recipient = %recipient.user_id,
                error = %e,
                "Notification mail delivery failed"
            );
        }
    }

    /// Lists the recipient's notifications.
    ///
    /// A type tag no kind carries selects nothing and yields an empty page.
    pub async fn list(
        &self,
        recipient: UserId,
        params: &ListParams,
    ) -> Result<PageResponse<Notification>, AppError> {
        let filter = KindFilter::parse(params.type_tag.as_deref());
        let page = self.page_for(params);
        if filter.is_unmatched() {
            debug!(recipient = %recipient, type_tag = ?params.type_tag, "Type filter matches no kind");
            return Ok(PageResponse::empty(&page));
        }
        let query = Self::query_for(filter, params);
        self.store.list(recipient, &query, &page).await
    }

    /// Gathers the page, counts and day buckets for the index view.
    pub async fn index(
        &self,
        recipient: UserId,
        params: &ListParams,
    ) -> Result<NotificationIndex, AppError> {
        let notifications = self.list(recipient, params).await?;
        let unread_count = self.unread_count(recipient).await?;
        let grouped_unread_counts = self
            .group_by_type(recipient, &NotificationQuery::new().unread_only(true))
            .await?;
        let days = group_by_day(&notifications.items);

        Ok(NotificationIndex {
            notifications,
            unread_count,
            grouped_unread_counts,
            days,
        })
    }

    /// Gets one of the recipient's notifications.
    pub async fn find(
        &self,
        recipient: UserId,
        id: NotificationId,
    ) -> Result<Option<Notification>, AppError> {
        self.store.find_by_id(recipient, id).await
    }

    /// Gets the unread notification count.
    pub async fn unread_count(&self, recipient: UserId) -> Result<u64, AppError> {
        self.store.unread_count(recipient).await
    }

    /// Counts the notifications selected by `query` per type tag.
    ///
    /// Every declared kind is present, with zero when nothing matches.
    pub async fn group_by_type(
        &self,
        recipient: UserId,
        query: &NotificationQuery,
    ) -> Result<TypeCounts, AppError> {
        let observed = self.store.count_by_kind(recipient, query).await?;
        Ok(type_counts_from(observed))
    }

    /// Sets one notification's read state.
    ///
    /// Returns `None` when the notification does not exist or belongs to
    /// someone else.
    pub async fn toggle_read_state(
        &self,
        recipient: UserId,
        id: NotificationId,
        mark_unread: bool,
    ) -> Result<Option<ReadStateChange>, AppError> {
        match self.store.set_read_state(recipient, id, mark_unread).await {
            Ok(n) => {
                debug!(notification_id = %n.id, unread = n.unread, "Read state updated");
                Ok(Some(ReadStateChange {
                    id: n.id,
                    unread: n.unread,
                }))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Marks all unread notifications as read, optionally for one type tag.
    ///
    /// An unknown type tag marks nothing.
    pub async fn mark_all_read(
        &self,
        recipient: UserId,
        type_tag: Option<&str>,
    ) -> Result<ReadAllOutcome, AppError> {
        let filter = KindFilter::parse(type_tag);
        let marked = if filter.is_unmatched() {
            0
        } else {
            self.store.mark_all_read(recipient, filter.kind()).await?
        };
        let remaining_unread = self.store.unread_count(recipient).await?;

        info!(
            recipient = %recipient,
            type_tag = ?type_tag,
            marked,
            remaining_unread,
            "Notifications marked read"
        );
        Ok(ReadAllOutcome {
            marked,
            remaining_unread,
        })
    }

    /// Deletes one notification. Returns `false` if it did not exist.
    pub async fn delete(&self, recipient: UserId, id: NotificationId) -> Result<bool, AppError> {
        match self.store.delete(recipient, id).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deletes every notification of a recipient (account removal).
    pub async fn purge_recipient(&self, recipient: UserId) -> Result<u64, AppError> {
        let removed = self.store.delete_for_recipient(recipient).await?;
        info!(recipient = %recipient, removed, "Recipient notifications purged");
        Ok(removed)
    }

    /// Checks that the store is reachable.
    pub async fn health_check(&self) -> Result<bool, AppError> {
        self.store.health_check().await
    }

    fn query_for(filter: KindFilter, params: &ListParams) -> NotificationQuery {
        NotificationQuery::new()
            .by_type(filter.kind())
            .unread_only(params.unread_only)
            .order(params.order)
    }

    fn page_for(&self, params: &ListParams) -> PageRequest {
        PageRequest::bounded(
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(self.config.default_page_size),
            self.config.max_page_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use notifyhub_core::config::NotificationsConfig;
    use notifyhub_core::error::{AppError, ErrorKind};
    use notifyhub_core::result::AppResult;
    use notifyhub_core::types::id::{NotificationId, PersonId, UserId};
    use notifyhub_core::types::pagination::{PageRequest, PageResponse};
    use notifyhub_database::memory::MemoryNotificationStore;
    use notifyhub_database::store::{Aggregation, NotificationQuery, NotificationStore};
    use notifyhub_entity::event::{Recipient, SocialEvent};
    use notifyhub_entity::notification::{
        Notification, NotificationKey, NotificationKind, TargetRef,
    };

    use super::{ListParams, NotificationService};
    use crate::delivery::{DeliveryRequest, NoopMailer, NotificationMailer};

    /// Records every delivery request.
    #[derive(Debug, Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<DeliveryRequest>>,
    }

    impl RecordingMailer {
        async fn sent(&self) -> usize {
            self.sent.lock().await.len()
        }
    }

    #[async_trait]
    impl NotificationMailer for RecordingMailer {
        async fn send_notification_email(&self, request: &DeliveryRequest) -> AppResult<()> {
            self.sent.lock().await.push(request.clone());
            Ok(())
        }
    }

    /// Always fails to deliver.
    #[derive(Debug, Default)]
    struct FailingMailer;

    #[async_trait]
    impl NotificationMailer for FailingMailer {
        async fn send_notification_email(&self, _request: &DeliveryRequest) -> AppResult<()> {
            Err(AppError::external_service("SMTP relay refused connection"))
        }
    }

    /// Fails the first `failures` find-or-create calls with a conflict or outage.
    #[derive(Debug)]
    struct FlakyStore {
        inner: MemoryNotificationStore,
        failures: AtomicU32,
        kind: ErrorKind,
        calls: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32, kind: ErrorKind) -> Self {
            Self {
                inner: MemoryNotificationStore::new(),
                failures: AtomicU32::new(failures),
                kind,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl NotificationStore for FlakyStore {
        async fn concatenate_or_create(
            &self,
            key: &NotificationKey,
            actor: PersonId,
            now: DateTime<Utc>,
        ) -> AppResult<Aggregation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(AppError::new(self.kind, "injected failure"));
            }
            self.inner.concatenate_or_create(key, actor, now).await
        }

        async fn find_by_id(
            &self,
            recipient: UserId,
            id: NotificationId,
        ) -> AppResult<Option<Notification>> {
            self.inner.find_by_id(recipient, id).await
        }

        async fn list(
            &self,
            recipient: UserId,
            query: &NotificationQuery,
            page: &PageRequest,
        ) -> AppResult<PageResponse<Notification>> {
            self.inner.list(recipient, query, page).await
        }

        async fn count(&self, recipient: UserId, query: &NotificationQuery) -> AppResult<u64> {
            self.inner.count(recipient, query).await
        }

        async fn count_by_kind(
            &self,
            recipient: UserId,
            query: &NotificationQuery,
        ) -> AppResult<BTreeMap<NotificationKind, u64>> {
            self.inner.count_by_kind(recipient, query).await
        }

        async fn set_read_state(
            &self,
            recipient: UserId,
            id: NotificationId,
            unread: bool,
        ) -> AppResult<Notification> {
            self.inner.set_read_state(recipient, id, unread).await
        }

        async fn mark_all_read(
            &self,
            recipient: UserId,
            kind: Option<NotificationKind>,
        ) -> AppResult<u64> {
            self.inner.mark_all_read(recipient, kind).await
        }

        async fn delete(&self, recipient: UserId, id: NotificationId) -> AppResult<()> {
            self.inner.delete(recipient, id).await
        }

        async fn delete_for_recipient(&self, recipient: UserId) -> AppResult<u64> {
            self.inner.delete_for_recipient(recipient).await
        }

        async fn health_check(&self) -> AppResult<bool> {
            self.inner.health_check().await
        }
    }

    fn test_config() -> NotificationsConfig {
        NotificationsConfig {
            retry_backoff_ms: 0,
            ..NotificationsConfig::default()
        }
    }

    struct Harness {
        service: NotificationService,
        store: MemoryNotificationStore,
        mailer: Arc<RecordingMailer>,
    }

    fn harness() -> Harness {
        let store = MemoryNotificationStore::new();
        let mailer = Arc::new(RecordingMailer::default());
        let service = NotificationService::new(
            Arc::new(store.clone()),
            Arc::clone(&mailer) as Arc<dyn NotificationMailer>,
            test_config(),
        );
        Harness {
            service,
            store,
            mailer,
        }
    }

    fn recipient() -> Recipient {
        Recipient::new(UserId::new(), PersonId::new())
    }

    fn comment_on(post_id: Uuid, author: &Recipient) -> SocialEvent {
        SocialEvent::Comment {
            comment_id: Uuid::new_v4(),
            post_id,
            post_author: author.person_id,
        }
    }

    #[tokio::test]
    async fn test_same_actor_twice_is_idempotent() {
        let h = harness();
        let r = recipient();
        let post = Uuid::new_v4();
        let actor = PersonId::new();

        let first = h.service.notify(&r, &comment_on(post, &r), actor).await.unwrap().unwrap();
        let second = h.service.notify(&r, &comment_on(post, &r), actor).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.actors.count(), 1);
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_actors_accumulate_without_duplicates() {
        let h = harness();
        let r = recipient();
        let post = Uuid::new_v4();
        let (a, b) = (PersonId::new(), PersonId::new());

        h.service.notify(&r, &comment_on(post, &r), a).await.unwrap();
        h.service.notify(&r, &comment_on(post, &r), b).await.unwrap();
        let n = h.service.notify(&r, &comment_on(post, &r), a).await.unwrap().unwrap();

        assert_eq!(n.actors.count(), 2);
        assert_eq!(n.actors.as_slice(), &[a, b]);
    }

    #[tokio::test]
    async fn test_multiple_likes_concatenate() {
        let h = harness();
        let r = recipient();
        let like = SocialEvent::Like {
            post_id: Uuid::new_v4(),
            post_author: r.person_id,
        };

        let first = h.service.notify(&r, &like, PersonId::new()).await.unwrap().unwrap();
        let second = h.service.notify(&r, &like, PersonId::new()).await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.kind, NotificationKind::Liked);
    }

    #[tokio::test]
    async fn test_read_is_sticky_against_merge() {
        let h = harness();
        let r = recipient();
        let post = Uuid::new_v4();

        let old = h
            .service
            .notify(&r, &comment_on(post, &r), PersonId::new())
            .await
            .unwrap()
            .unwrap();
        h.service.toggle_read_state(r.user_id, old.id, false).await.unwrap();

        let fresh = h
            .service
            .notify(&r, &comment_on(post, &r), PersonId::new())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(fresh.id, old.id);
        assert!(fresh.unread);

        let old = h.service.find(r.user_id, old.id).await.unwrap().unwrap();
        assert!(!old.unread);
        assert_eq!(old.actors.count(), 1);

        let all = h.service.list(r.user_id, &ListParams::default()).await.unwrap();
        assert_eq!(all.total_items, 2);
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let h = harness();
        let r = recipient();
        let post = Uuid::new_v4();
        let (a, b, c) = (PersonId::new(), PersonId::new(), PersonId::new());

        let n1 = h.service.notify(&r, &comment_on(post, &r), a).await.unwrap().unwrap();
        assert!(n1.unread);
        assert_eq!(n1.actors.as_slice(), &[a]);
        assert_eq!(n1.kind, NotificationKind::CommentOnPost);

        let merged = h.service.notify(&r, &comment_on(post, &r), b).await.unwrap().unwrap();
        assert_eq!(merged.id, n1.id);
        assert_eq!(merged.actors.as_slice(), &[a, b]);

        let change = h
            .service
            .toggle_read_state(r.user_id, n1.id, false)
            .await
            .unwrap()
            .unwrap();
        assert!(!change.unread);

        let n2 = h.service.notify(&r, &comment_on(post, &r), c).await.unwrap().unwrap();
        assert_ne!(n2.id, n1.id);
        assert_eq!(n2.actors.as_slice(), &[c]);

        let all = h.service.list(r.user_id, &ListParams::default()).await.unwrap();
        assert_eq!(all.total_items, 2);
        let read: Vec<_> = all.items.iter().filter(|n| !n.unread).collect();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].actors.as_slice(), &[a, b]);
        assert_eq!(h.service.unread_count(r.user_id).await.unwrap(), 1);

        // Two fresh notifications, one merge: two mails.
        assert_eq!(h.mailer.sent().await, 2);
    }

    #[tokio::test]
    async fn test_merge_does_not_send_mail() {
        let h = harness();
        let r = recipient();
        let post = Uuid::new_v4();

        h.service.notify(&r, &comment_on(post, &r), PersonId::new()).await.unwrap();
        h.service.notify(&r, &comment_on(post, &r), PersonId::new()).await.unwrap();
        h.service.notify(&r, &comment_on(post, &r), PersonId::new()).await.unwrap();

        assert_eq!(h.mailer.sent().await, 1);
        let sent = h.mailer.sent.lock().await;
        assert_eq!(sent[0].template, "comment_on_post");
    }

    #[tokio::test]
    async fn test_mail_disabled_by_config() {
        let store = MemoryNotificationStore::new();
        let mailer = Arc::new(RecordingMailer::default());
        let service = NotificationService::new(
            Arc::new(store),
            Arc::clone(&mailer) as Arc<dyn NotificationMailer>,
            NotificationsConfig {
                email_enabled: false,
                ..test_config()
            },
        );
        let r = recipient();
        service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap();
        assert_eq!(mailer.sent().await, 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_notification() {
        let store = MemoryNotificationStore::new();
        let service = NotificationService::new(
            Arc::new(store.clone()),
            Arc::new(FailingMailer),
            test_config(),
        );
        let r = recipient();

        let n = service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap()
            .unwrap();
        assert!(service.find(r.user_id, n.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_non_notifiable_event_returns_none() {
        let h = harness();
        let r = recipient();
        let event = SocialEvent::Retraction {
            target: TargetRef::post(Uuid::new_v4()),
        };

        let result = h.service.notify(&r, &event, PersonId::new()).await.unwrap();
        assert!(result.is_none());
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_like_on_someone_elses_post_is_ignored() {
        let h = harness();
        let r = recipient();
        let like = SocialEvent::Like {
            post_id: Uuid::new_v4(),
            post_author: PersonId::new(),
        };
        assert!(h.service.notify(&r, &like, PersonId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_self_notification_suppressed() {
        let h = harness();
        let r = recipient();

        let result = h
            .service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), r.person_id)
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(h.mailer.sent().await, 0);
    }

    #[tokio::test]
    async fn test_self_notification_allowed_when_disabled() {
        let store = MemoryNotificationStore::new();
        let service = NotificationService::new(
            Arc::new(store),
            Arc::new(NoopMailer),
            NotificationsConfig {
                suppress_self_notifications: false,
                ..test_config()
            },
        );
        let r = recipient();
        let result = service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), r.person_id)
            .await
            .unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_missing_target_is_rejected_without_side_effects() {
        let h = harness();
        let r = recipient();

        let err = h
            .service
            .notify(&r, &comment_on(Uuid::nil(), &r), PersonId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(h.store.is_empty().await);
        assert_eq!(h.mailer.sent().await, 0);
    }

    #[tokio::test]
    async fn test_missing_recipient_is_rejected() {
        let h = harness();
        let r = Recipient::new(UserId::from_uuid(Uuid::nil()), PersonId::new());
        let event = SocialEvent::Message {
            conversation_id: Uuid::new_v4(),
        };

        let err = h.service.notify(&r, &event, PersonId::new()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_conflicts_are_retried() {
        let store = Arc::new(FlakyStore::new(2, ErrorKind::Conflict));
        let service = NotificationService::new(
            Arc::clone(&store) as Arc<dyn NotificationStore>,
            Arc::new(RecordingMailer::default()),
            test_config(),
        );
        let r = recipient();

        let n = service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap();
        assert!(n.is_some());
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_conflict() {
        let store = Arc::new(FlakyStore::new(10, ErrorKind::Conflict));
        let service = NotificationService::new(
            Arc::clone(&store) as Arc<dyn NotificationStore>,
            Arc::new(RecordingMailer::default()),
            test_config(),
        );
        let r = recipient();

        let err = service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        // One initial attempt plus the configured retries.
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_store_outage_is_not_retried() {
        let store = Arc::new(FlakyStore::new(1, ErrorKind::ServiceUnavailable));
        let service = NotificationService::new(
            Arc::clone(&store) as Arc<dyn NotificationStore>,
            Arc::new(RecordingMailer::default()),
            test_config(),
        );
        let r = recipient();

        let err = service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_notify_creates_one_notification() {
        let h = harness();
        let service = Arc::new(h.service);
        let r = recipient();
        let post = Uuid::new_v4();
        let actors: Vec<PersonId> = (0..16).map(|_| PersonId::new()).collect();

        let tasks = actors.iter().map(|actor| {
            let service = Arc::clone(&service);
            let event = comment_on(post, &r);
            let actor = *actor;
            tokio::spawn(async move { service.notify(&r, &event, actor).await })
        });
        let results = futures::future::join_all(tasks).await;

        let ids: Vec<NotificationId> = results
            .into_iter()
            .map(|joined| joined.unwrap().unwrap().unwrap().id)
            .collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));

        assert_eq!(h.store.len().await, 1);
        let n = service.find(r.user_id, ids[0]).await.unwrap().unwrap();
        assert_eq!(n.actors.count(), actors.len());
        assert!(actors.iter().all(|a| n.actors.contains(a)));
        assert_eq!(h.mailer.sent().await, 1);
    }

    #[tokio::test]
    async fn test_unread_only_listing() {
        let h = harness();
        let r = recipient();

        let read = h
            .service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap()
            .unwrap();
        let unread = h
            .service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap()
            .unwrap();
        h.service.toggle_read_state(r.user_id, read.id, false).await.unwrap();

        let only_unread = h
            .service
            .list(r.user_id, &ListParams::default().unread())
            .await
            .unwrap();
        let ids: Vec<_> = only_unread.items.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![unread.id]);

        let everything = h.service.list(r.user_id, &ListParams::default()).await.unwrap();
        assert_eq!(everything.total_items, 2);
    }

    #[tokio::test]
    async fn test_list_by_type_tag() {
        let h = harness();
        let r = recipient();
        let other = recipient();
        let post = Uuid::new_v4();

        // `r` commented on someone else's post: also_commented.
        h.service.notify(&r, &comment_on(post, &other), PersonId::new()).await.unwrap();
        // Comment on `r`'s own post: comment_on_post.
        h.service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap();

        let also = h
            .service
            .list(r.user_id, &ListParams::default().with_type("also_commented"))
            .await
            .unwrap();
        assert_eq!(also.total_items, 1);
        assert_eq!(also.items[0].kind, NotificationKind::AlsoCommented);

        let blank = h
            .service
            .list(r.user_id, &ListParams::default().with_type(""))
            .await
            .unwrap();
        assert_eq!(blank.total_items, 2);

        let spaces = h
            .service
            .list(r.user_id, &ListParams::default().with_type("  "))
            .await
            .unwrap();
        assert_eq!(spaces.total_items, 2);

        let unknown = h
            .service
            .list(r.user_id, &ListParams::default().with_type("poked"))
            .await
            .unwrap();
        assert!(unknown.items.is_empty());
        assert_eq!(unknown.total_items, 0);
    }

    #[tokio::test]
    async fn test_unknown_type_tag_selects_nothing() {
        let h = harness();
        let r = recipient();
        h.service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap();

        let index = h
            .service
            .index(r.user_id, &ListParams::default().with_type("poked"))
            .await
            .unwrap();
        assert!(index.notifications.items.is_empty());
        assert!(index.days.is_empty());
        assert_eq!(index.unread_count, 1);

        let outcome = h.service.mark_all_read(r.user_id, Some("poked")).await.unwrap();
        assert_eq!(outcome.marked, 0);
        assert_eq!(outcome.remaining_unread, 1);
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_recipient() {
        let h = harness();
        let r = recipient();
        let someone = recipient();
        for _ in 0..4 {
            h.service
                .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
                .await
                .unwrap();
        }
        h.service
            .notify(&someone, &comment_on(Uuid::new_v4(), &someone), PersonId::new())
            .await
            .unwrap();

        let page = h.service.list(r.user_id, &ListParams::default()).await.unwrap();
        assert_eq!(page.total_items, 4);
    }

    #[tokio::test]
    async fn test_pagination_uses_configured_bounds() {
        let h = harness();
        let r = recipient();
        for _ in 0..30 {
            h.service
                .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
                .await
                .unwrap();
        }

        let first = h.service.list(r.user_id, &ListParams::default()).await.unwrap();
        assert_eq!(first.page_size, 25);
        assert_eq!(first.items.len(), 25);
        assert_eq!(first.total_pages, 2);

        let second = h
            .service
            .list(r.user_id, &ListParams::default().page(2, 25))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 5);

        let huge = h
            .service
            .list(r.user_id, &ListParams::default().page(1, 10_000))
            .await
            .unwrap();
        assert_eq!(huge.page_size, 100);
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let h = harness();
        let r = recipient();
        h.service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap();

        let page = h
            .service
            .list(r.user_id, &ListParams::default().page(u64::MAX, 25))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_items, 1);
        assert!(!page.has_next);
    }

    #[tokio::test]
    async fn test_group_by_type_covers_all_kinds() {
        let h = harness();
        let r = recipient();

        let empty = h
            .service
            .group_by_type(r.user_id, &NotificationQuery::new())
            .await
            .unwrap();
        assert_eq!(empty.len(), NotificationKind::ALL.len());
        assert!(empty.values().all(|c| *c == 0));

        let other = recipient();
        h.service
            .notify(&r, &comment_on(Uuid::new_v4(), &other), PersonId::new())
            .await
            .unwrap();
        h.service
            .notify(&r, &comment_on(Uuid::new_v4(), &other), PersonId::new())
            .await
            .unwrap();

        let grouped = h
            .service
            .group_by_type(r.user_id, &NotificationQuery::new())
            .await
            .unwrap();
        assert_eq!(grouped["also_commented"], 2);
        assert_eq!(grouped["comment_on_post"], 0);
    }

    #[tokio::test]
    async fn test_index_bundles_counts_and_days() {
        let h = harness();
        let r = recipient();
        h.service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap();
        h.service
            .notify(
                &r,
                &SocialEvent::StartedSharing {
                    sharer: PersonId::new(),
                },
                PersonId::new(),
            )
            .await
            .unwrap();

        let index = h.service.index(r.user_id, &ListParams::default()).await.unwrap();
        assert_eq!(index.notifications.total_items, 2);
        assert_eq!(index.unread_count, 2);
        assert_eq!(index.grouped_unread_counts["comment_on_post"], 1);
        assert_eq!(index.grouped_unread_counts["started_sharing"], 1);
        assert_eq!(index.grouped_unread_counts["liked"], 0);
        let bucketed: usize = index.days.iter().map(|d| d.notifications.len()).sum();
        assert_eq!(bucketed, 2);
    }

    #[tokio::test]
    async fn test_empty_recipient_gets_zero_counts() {
        let h = harness();
        let r = recipient();
        let index = h.service.index(r.user_id, &ListParams::default()).await.unwrap();
        assert!(index.notifications.items.is_empty());
        assert_eq!(index.unread_count, 0);
        assert!(index.grouped_unread_counts.values().all(|c| *c == 0));
        assert!(index.days.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_missing_or_foreign_is_noop() {
        let h = harness();
        let r = recipient();
        let n = h
            .service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap()
            .unwrap();

        let stranger = UserId::new();
        assert!(h.service.toggle_read_state(stranger, n.id, false).await.unwrap().is_none());
        assert!(
            h.service
                .toggle_read_state(r.user_id, NotificationId::new(), false)
                .await
                .unwrap()
                .is_none()
        );

        let still = h.service.find(r.user_id, n.id).await.unwrap().unwrap();
        assert!(still.unread);
    }

    #[tokio::test]
    async fn test_toggle_back_to_unread() {
        let h = harness();
        let r = recipient();
        let n = h
            .service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap()
            .unwrap();

        let read = h.service.toggle_read_state(r.user_id, n.id, false).await.unwrap().unwrap();
        assert!(!read.unread);
        let reopened = h.service.toggle_read_state(r.user_id, n.id, true).await.unwrap().unwrap();
        assert!(reopened.unread);
        assert_eq!(reopened.id, n.id);
    }

    #[tokio::test]
    async fn test_mark_all_read_with_type_filter() {
        let h = harness();
        let r = recipient();
        let other = recipient();
        h.service
            .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
            .await
            .unwrap();
        h.service
            .notify(&r, &comment_on(Uuid::new_v4(), &other), PersonId::new())
            .await
            .unwrap();

        let outcome = h.service.mark_all_read(r.user_id, Some("comment_on_post")).await.unwrap();
        assert_eq!(outcome.marked, 1);
        assert_eq!(outcome.remaining_unread, 1);

        let outcome = h.service.mark_all_read(r.user_id, None).await.unwrap();
        assert_eq!(outcome.marked, 1);
        assert_eq!(outcome.remaining_unread, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mark_all_read_is_atomic_for_readers() {
        let h = harness();
        let service = Arc::new(h.service);
        let r = recipient();
        const TOTAL: u64 = 50;
        for _ in 0..TOTAL {
            service
                .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
                .await
                .unwrap();
        }

        let reader = {
            let service = Arc::clone(&service);
            let user = r.user_id;
            tokio::spawn(async move {
                let mut observed = Vec::new();
                for _ in 0..200 {
                    observed.push(service.unread_count(user).await.unwrap());
                    tokio::task::yield_now().await;
                }
                observed
            })
        };
        let outcome = service.mark_all_read(r.user_id, None).await.unwrap();
        let observed = reader.await.unwrap();

        assert_eq!(outcome.marked, TOTAL);
        assert!(observed.iter().all(|c| *c == TOTAL || *c == 0));
    }

    #[tokio::test]
    async fn test_delete_cascades_actor_links() {
        let h = harness();
        let r = recipient();
        let post = Uuid::new_v4();
        let n = h
            .service
            .notify(&r, &comment_on(post, &r), PersonId::new())
            .await
            .unwrap()
            .unwrap();
        h.service.notify(&r, &comment_on(post, &r), PersonId::new()).await.unwrap();
        assert_eq!(h.store.actor_link_count().await, 2);

        assert!(h.service.delete(r.user_id, n.id).await.unwrap());
        assert_eq!(h.store.actor_link_count().await, 0);
        assert!(!h.service.delete(r.user_id, n.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_recipient_leaves_others() {
        let h = harness();
        let r = recipient();
        let other = recipient();
        for _ in 0..3 {
            h.service
                .notify(&r, &comment_on(Uuid::new_v4(), &r), PersonId::new())
                .await
                .unwrap();
        }
        h.service
            .notify(&other, &comment_on(Uuid::new_v4(), &other), PersonId::new())
            .await
            .unwrap();

        assert_eq!(h.service.purge_recipient(r.user_id).await.unwrap(), 3);
        assert_eq!(h.store.len().await, 1);
        assert_eq!(h.store.actor_link_count().await, 1);
    }
}
