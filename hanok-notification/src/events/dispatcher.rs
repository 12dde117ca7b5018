use std::sync::Arc;

use hanok_shared::errors::AppResult;

use crate::events::queries::DirectoryQueries;
use crate::models::NewNotification;
use crate::services::notification_service::NotificationService;

/// Upper bound on one persistence batch (and therefore one round of live
/// pushes) during a large fanout, independent of total recipient count.
pub const FANOUT_CHUNK_SIZE: usize = 100;

/// Maps domain events to recipient sets and rendered messages, then hands
/// them to the notification service.
///
/// Every method is fire-and-forget from the caller's point of view: the
/// triggering business action has already committed, so failures here are
/// logged and dropped, never propagated. The methods are still async and
/// awaitable so tests can observe completion; production callers spawn
/// them.
#[derive(Clone)]
pub struct EventDispatcher {
    notifications: Arc<NotificationService>,
    directory: Arc<dyn DirectoryQueries>,
}

impl EventDispatcher {
    pub fn new(
        notifications: Arc<NotificationService>,
        directory: Arc<dyn DirectoryQueries>,
    ) -> Self {
        Self { notifications, directory }
    }

    /// A prospective apartment admin signed up: notify active super admins.
    pub async fn admin_signup_requested(&self, applicant_name: &str) {
        let outcome = async {
            let recipients = self.directory.active_super_admin_ids().await?;
            let content = format!("New admin signup request from {applicant_name} is awaiting approval");
            self.fanout("admin.signup_requested", &recipients, &content).await
        }
        .await;

        log_outcome("admin.signup_requested", outcome);
    }

    /// A resident signed up: notify their apartment's admin plus super admins.
    pub async fn resident_signup_requested(&self, resident_id: i64, applicant_name: &str) {
        let outcome = async {
            let Some(apartment_id) = self.directory.apartment_of_resident(resident_id).await? else {
                tracing::warn!(
                    resident_id = %resident_id,
                    "resident not found, skipping signup notifications"
                );
                return Ok(());
            };

            let recipients = self.apartment_staff(apartment_id).await?;
            let content = format!("New resident signup request from {applicant_name} is awaiting approval");
            self.fanout("resident.signup_requested", &recipients, &content).await
        }
        .await;

        log_outcome("resident.signup_requested", outcome);
    }

    /// A complaint was filed: notify the apartment's admin plus super admins.
    pub async fn complaint_created(&self, complaint_id: i64, title: &str) {
        let outcome = async {
            let Some(summary) = self.directory.complaint_summary(complaint_id).await? else {
                tracing::warn!(
                    complaint_id = %complaint_id,
                    "complaint not found, skipping creation notifications"
                );
                return Ok(());
            };

            let recipients = self.apartment_staff(summary.apartment_id).await?;
            let content = format!("A new complaint has been filed: {title}");
            self.fanout("complaint.created", &recipients, &content).await
        }
        .await;

        log_outcome("complaint.created", outcome);
    }

    /// A complaint's status changed: notify its author. Single recipient,
    /// single-create path.
    pub async fn complaint_status_changed(&self, complaint_id: i64, status: &str) {
        let outcome = async {
            let Some(summary) = self.directory.complaint_summary(complaint_id).await? else {
                tracing::warn!(
                    complaint_id = %complaint_id,
                    "complaint not found, skipping status notification"
                );
                return Ok(());
            };

            let content = format!("Your complaint status has changed to {status}");
            self.notifications.create(summary.author_id, &content).await?;
            Ok(())
        }
        .await;

        log_outcome("complaint.status_changed", outcome);
    }

    /// A notice was posted: notify every registered resident of the apartment.
    pub async fn notice_created(&self, apartment_id: i64, title: &str) {
        let outcome = async {
            let recipients = self.directory.registered_resident_user_ids(apartment_id).await?;
            let content = format!("A new announcement has been posted: {title}");
            self.fanout("notice.created", &recipients, &content).await
        }
        .await;

        log_outcome("notice.created", outcome);
    }

    /// A poll opened: same recipients as notices.
    pub async fn poll_created(&self, apartment_id: i64, title: &str) {
        let outcome = async {
            let recipients = self.directory.registered_resident_user_ids(apartment_id).await?;
            let content = format!("A new poll is open: {title}");
            self.fanout("poll.created", &recipients, &content).await
        }
        .await;

        log_outcome("poll.created", outcome);
    }

    /// Apartment admin (when assigned) plus active super admins, deduplicated.
    async fn apartment_staff(&self, apartment_id: i64) -> AppResult<Vec<i64>> {
        let mut recipients = Vec::new();
        if let Some(admin_id) = self.directory.apartment_admin_id(apartment_id).await? {
            recipients.push(admin_id);
        }
        for id in self.directory.active_super_admin_ids().await? {
            if !recipients.contains(&id) {
                recipients.push(id);
            }
        }
        Ok(recipients)
    }

    /// Persist and push in chunks so no single batch exceeds
    /// FANOUT_CHUNK_SIZE recipients.
    async fn fanout(&self, event: &str, recipients: &[i64], content: &str) -> AppResult<()> {
        if recipients.is_empty() {
            tracing::info!(event = %event, "no recipients resolved, nothing to send");
            return Ok(());
        }

        for chunk in recipients.chunks(FANOUT_CHUNK_SIZE) {
            let entries = chunk
                .iter()
                .map(|&user_id| NewNotification {
                    user_id,
                    content: content.to_string(),
                })
                .collect();
            self.notifications.create_many(entries).await?;
        }

        tracing::debug!(event = %event, recipients = recipients.len(), "notification fanout complete");
        Ok(())
    }
}

fn log_outcome(event: &str, outcome: AppResult<()>) {
    if let Err(e) = outcome {
        tracing::error!(event = %event, error = %e, "notification round skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::queries::ComplaintSummary;
    use crate::registry::{ConnectionRegistry, Frame};
    use crate::services::store::testing::MemoryStore;
    use async_trait::async_trait;
    use hanok_shared::errors::AppResult;

    #[derive(Default)]
    struct FakeDirectory {
        super_admins: Vec<i64>,
        apartment_admin: Option<i64>,
        resident_apartment: Option<i64>,
        complaint: Option<ComplaintSummary>,
        residents: Vec<i64>,
    }

    #[async_trait]
    impl DirectoryQueries for FakeDirectory {
        async fn active_super_admin_ids(&self) -> AppResult<Vec<i64>> {
            Ok(self.super_admins.clone())
        }

        async fn apartment_admin_id(&self, _apartment_id: i64) -> AppResult<Option<i64>> {
            Ok(self.apartment_admin)
        }

        async fn apartment_of_resident(&self, _resident_id: i64) -> AppResult<Option<i64>> {
            Ok(self.resident_apartment)
        }

        async fn complaint_summary(&self, _complaint_id: i64) -> AppResult<Option<ComplaintSummary>> {
            Ok(self.complaint)
        }

        async fn registered_resident_user_ids(&self, _apartment_id: i64) -> AppResult<Vec<i64>> {
            Ok(self.residents.clone())
        }
    }

    fn dispatcher(directory: FakeDirectory)
        -> (EventDispatcher, Arc<MemoryStore>, Arc<ConnectionRegistry>)
    {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let notifications = Arc::new(NotificationService::new(store.clone(), registry.clone()));
        let dispatcher = EventDispatcher::new(notifications, Arc::new(directory));
        (dispatcher, store, registry)
    }

    #[tokio::test]
    async fn large_fanout_is_chunked_in_batches_of_100() {
        let directory = FakeDirectory {
            residents: (1..=250).collect(),
            ..Default::default()
        };
        let (dispatcher, store, _) = dispatcher(directory);

        dispatcher.notice_created(1, "Elevator maintenance").await;

        assert_eq!(store.batch_sizes(), vec![100, 100, 50]);
        assert_eq!(store.rows().len(), 250);
    }

    #[tokio::test]
    async fn apartment_staff_is_deduplicated() {
        // the apartment admin also appears in the super admin list
        let directory = FakeDirectory {
            super_admins: vec![7, 8],
            apartment_admin: Some(7),
            complaint: Some(ComplaintSummary { apartment_id: 1, author_id: 99 }),
            ..Default::default()
        };
        let (dispatcher, store, _) = dispatcher(directory);

        dispatcher.complaint_created(1, "Broken intercom").await;

        let mut recipients: Vec<i64> = store.rows().iter().map(|r| r.user_id).collect();
        recipients.sort_unstable();
        assert_eq!(recipients, vec![7, 8]);
    }

    #[tokio::test]
    async fn resident_signup_notifies_admin_and_super_admins() {
        let directory = FakeDirectory {
            super_admins: vec![2, 3],
            apartment_admin: Some(5),
            resident_apartment: Some(1),
            ..Default::default()
        };
        let (dispatcher, store, _) = dispatcher(directory);

        dispatcher.resident_signup_requested(11, "Kim").await;

        let mut recipients: Vec<i64> = store.rows().iter().map(|r| r.user_id).collect();
        recipients.sort_unstable();
        assert_eq!(recipients, vec![2, 3, 5]);
    }

    #[tokio::test]
    async fn admin_signup_notifies_super_admins_only() {
        let directory = FakeDirectory {
            super_admins: vec![1, 2],
            ..Default::default()
        };
        let (dispatcher, store, _) = dispatcher(directory);

        dispatcher.admin_signup_requested("Lee").await;

        assert_eq!(store.rows().len(), 2);
        assert!(store.rows().iter().all(|r| r.content.contains("Lee")));
    }

    #[tokio::test]
    async fn status_change_goes_to_the_author_alone() {
        let directory = FakeDirectory {
            super_admins: vec![1],
            apartment_admin: Some(2),
            complaint: Some(ComplaintSummary { apartment_id: 1, author_id: 42 }),
            ..Default::default()
        };
        let (dispatcher, store, registry) = dispatcher(directory);
        let (_, mut rx) = registry.open(42);

        dispatcher.complaint_status_changed(9, "resolved").await;

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, 42);

        match rx.try_recv().unwrap() {
            Frame::Alarm(json) => {
                let value: serde_json::Value = serde_json::from_str(&json).unwrap();
                assert_eq!(value["data"].as_array().unwrap().len(), 1);
            }
            Frame::Close => panic!("unexpected close frame"),
        }
    }

    #[tokio::test]
    async fn missing_complaint_is_a_logged_no_op() {
        let (dispatcher, store, _) = dispatcher(FakeDirectory::default());

        dispatcher.complaint_created(404, "gone").await;
        dispatcher.complaint_status_changed(404, "resolved").await;

        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn missing_resident_is_a_logged_no_op() {
        let (dispatcher, store, _) = dispatcher(FakeDirectory::default());

        dispatcher.resident_signup_requested(404, "Park").await;
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn empty_recipient_set_is_a_logged_no_op() {
        let (dispatcher, store, _) = dispatcher(FakeDirectory::default());

        dispatcher.notice_created(1, "nobody home").await;
        dispatcher.poll_created(1, "nobody votes").await;
        dispatcher.admin_signup_requested("Choi").await;

        assert!(store.rows().is_empty());
    }
}
