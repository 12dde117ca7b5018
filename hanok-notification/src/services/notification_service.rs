use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use hanok_shared::errors::{AppError, AppResult, ErrorCode};
use hanok_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::{NewNotification, Notification, PushEnvelope};
use crate::registry::ConnectionRegistry;
use crate::services::store::NotificationStore;

/// Orchestrates the durable store and the live registry. The HTTP layer
/// and the event dispatcher never touch either leaf directly.
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    registry: Arc<ConnectionRegistry>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Persist one notification, then push it to the recipient's open
    /// streams. The push is best-effort; a disconnected recipient still
    /// gets the durable record.
    pub async fn create(&self, user_id: i64, content: &str) -> AppResult<Notification> {
        let record = self.store.create(user_id, content).await?;

        let batch = std::slice::from_ref(&record);
        self.registry.send_to_user(user_id, &PushEnvelope::alarm(batch));

        Ok(record)
    }

    /// Persist a batch in one store call, then push each recipient exactly
    /// one envelope holding that recipient's subset of the created records.
    pub async fn create_many(&self, entries: Vec<NewNotification>) -> AppResult<Vec<Notification>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let created = self.store.create_many(entries).await?;

        let mut by_user: BTreeMap<i64, Vec<Notification>> = BTreeMap::new();
        for record in &created {
            by_user.entry(record.user_id).or_default().push(record.clone());
        }
        for (user_id, batch) in &by_user {
            self.registry.send_to_user(*user_id, &PushEnvelope::alarm(batch));
        }

        Ok(created)
    }

    /// Flip a notification to read on behalf of its owner.
    ///
    /// Absent id -> NotificationNotFound. Wrong owner ->
    /// NotificationForbidden. Zero affected rows after the record was just
    /// found -> NotificationUpdateConflict, surfaced as an internal error
    /// because it means a concurrent state change, not user error.
    pub async fn mark_as_read(&self, notification_id: i64, requester_id: i64) -> AppResult<()> {
        let record = self
            .store
            .find_simple(notification_id)
            .await?
            .ok_or_else(|| {
                AppError::new(ErrorCode::NotificationNotFound, "notification not found")
            })?;

        if record.user_id != requester_id {
            return Err(AppError::new(
                ErrorCode::NotificationForbidden,
                "notification belongs to another user",
            ));
        }

        let affected = self.store.mark_as_read(notification_id, requester_id).await?;
        if affected == 0 {
            tracing::error!(
                notification_id = %notification_id,
                requester_id = %requester_id,
                "mark-as-read affected zero rows after a successful existence check"
            );
            return Err(AppError::new(
                ErrorCode::NotificationUpdateConflict,
                "notification state changed concurrently",
            ));
        }

        Ok(())
    }

    pub async fn mark_all_as_read(&self, user_id: i64) -> AppResult<usize> {
        self.store.mark_all_as_read(user_id).await
    }

    pub async fn find_all(&self, user_id: i64, params: &PaginationParams)
        -> AppResult<Paginated<Notification>>
    {
        let limit = params.limit() as i64;
        let offset = params.offset() as i64;

        let (items, total) = self.store.find_page(user_id, limit, offset).await?;
        Ok(Paginated::new(items, total as u64, params))
    }

    /// Unread backlog, used by the stream route on (re)connect.
    pub async fn find_unread(&self, user_id: i64, since: Option<DateTime<Utc>>)
        -> AppResult<Vec<Notification>>
    {
        self.store.find_unread(user_id, since).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Frame;
    use crate::services::store::testing::MemoryStore;
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn service() -> (NotificationService, Arc<MemoryStore>, Arc<ConnectionRegistry>) {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let service = NotificationService::new(store.clone(), registry.clone());
        (service, store, registry)
    }

    fn entries(user_ids: &[i64]) -> Vec<NewNotification> {
        user_ids
            .iter()
            .map(|&user_id| NewNotification {
                user_id,
                content: "A new poll is open".into(),
            })
            .collect()
    }

    fn alarm_batch_len(rx: &mut UnboundedReceiver<Frame>) -> usize {
        match rx.try_recv().expect("expected one push") {
            Frame::Alarm(json) => {
                let value: serde_json::Value = serde_json::from_str(&json).unwrap();
                assert_eq!(value["type"], "alarm");
                value["data"].as_array().unwrap().len()
            }
            Frame::Close => panic!("unexpected close frame"),
        }
    }

    #[tokio::test]
    async fn create_persists_unread_record_for_owner() {
        let (service, _, _) = service();
        let record = service.create(9, "Your complaint status changed").await.unwrap();
        assert_eq!(record.user_id, 9);
        assert!(!record.is_checked);
    }

    #[tokio::test]
    async fn create_pushes_to_connected_owner_only() {
        let (service, _, registry) = service();
        let (_, mut rx_owner) = registry.open(1);
        let (_, mut rx_other) = registry.open(2);

        service.create(1, "hello").await.unwrap();

        assert_eq!(alarm_batch_len(&mut rx_owner), 1);
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn create_many_groups_pushes_per_user() {
        let (service, _, registry) = service();
        let (_, mut rx1) = registry.open(1);
        let (_, mut rx2) = registry.open(2);
        let (_, mut rx3) = registry.open(3);

        let created = service.create_many(entries(&[1, 1, 2, 3, 2])).await.unwrap();
        assert_eq!(created.len(), 5);

        // exactly one push per distinct user, holding exactly their subset
        assert_eq!(alarm_batch_len(&mut rx1), 2);
        assert_eq!(alarm_batch_len(&mut rx2), 2);
        assert_eq!(alarm_batch_len(&mut rx3), 1);
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
        assert!(rx3.try_recv().is_err());

        // the grouping partitioned the created set with no dup or omission
        let mut ids: Vec<i64> = created.iter().map(|n| n.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn create_without_connection_still_persists() {
        let (service, _, _) = service();
        service.create(4, "offline user").await.unwrap();

        let unread = service.find_unread(4, None).await.unwrap();
        assert_eq!(unread.len(), 1);

        let page = service.find_all(4, &PaginationParams::default()).await.unwrap();
        assert_eq!(page.total_count, 1);
    }

    #[tokio::test]
    async fn mark_as_read_flips_the_flag_for_the_owner() {
        let (service, store, _) = service();
        let record = service.create(1, "unread").await.unwrap();

        service.mark_as_read(record.id, 1).await.unwrap();
        assert!(store.rows()[0].is_checked);
    }

    #[tokio::test]
    async fn mark_as_read_rejects_non_owner() {
        let (service, store, _) = service();
        let record = service.create(1, "mine").await.unwrap();

        let err = service.mark_as_read(record.id, 2).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::NotificationForbidden));
        assert!(!store.rows()[0].is_checked);
    }

    #[tokio::test]
    async fn mark_as_read_missing_id_is_not_found() {
        let (service, _, _) = service();
        let err = service.mark_as_read(999, 1).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::NotificationNotFound));
    }

    #[tokio::test]
    async fn mark_as_read_zero_rows_after_lookup_is_a_conflict() {
        let (service, store, _) = service();
        let record = service.create(1, "racy").await.unwrap();

        store.force_mark_zero.store(true, Ordering::Relaxed);
        let err = service.mark_as_read(record.id, 1).await.unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::NotificationUpdateConflict));
    }

    #[tokio::test]
    async fn find_all_reports_has_next() {
        let (service, _, _) = service();
        for _ in 0..15 {
            service.create(1, "n").await.unwrap();
        }

        let params = PaginationParams { page: 1, limit: 10 };
        let page = service.find_all(1, &params).await.unwrap();
        assert_eq!(page.total_count, 15);
        assert_eq!(page.data.len(), 10);
        assert!(page.has_next);

        let params = PaginationParams { page: 2, limit: 10 };
        let page = service.find_all(1, &params).await.unwrap();
        assert_eq!(page.data.len(), 5);
        assert!(!page.has_next);
    }

    #[tokio::test]
    async fn find_all_under_limit_has_no_next_page() {
        let (service, _, _) = service();
        for _ in 0..10 {
            service.create(1, "n").await.unwrap();
        }

        let page = service
            .find_all(1, &PaginationParams { page: 1, limit: 10 })
            .await
            .unwrap();
        assert!(!page.has_next);
    }

    #[tokio::test]
    async fn mark_all_as_read_counts_unread_only() {
        let (service, _, _) = service();
        let first = service.create(1, "a").await.unwrap();
        service.create(1, "b").await.unwrap();
        service.create(2, "other user").await.unwrap();
        service.mark_as_read(first.id, 1).await.unwrap();

        let updated = service.mark_all_as_read(1).await.unwrap();
        assert_eq!(updated, 1);
        assert!(service.find_unread(1, None).await.unwrap().is_empty());
    }
}
