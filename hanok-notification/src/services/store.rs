use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};

use hanok_shared::clients::db::DbPool;
use hanok_shared::errors::{AppError, AppResult};

use crate::models::{NewNotification, Notification, NotificationSimple};
use crate::schema::notifications;

/// Persistence port for notification records. The service and dispatcher
/// only ever talk to this trait; production wires `PgNotificationStore`.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, user_id: i64, content: &str) -> AppResult<Notification>;

    /// Batch insert. Every returned record carries its assigned id and
    /// timestamp; ordering is not significant.
    async fn create_many(&self, entries: Vec<NewNotification>) -> AppResult<Vec<Notification>>;

    /// One page of a user's notifications, newest first, plus the total count.
    async fn find_page(&self, user_id: i64, limit: i64, offset: i64)
        -> AppResult<(Vec<Notification>, i64)>;

    /// Unread records for a user, optionally only those created after `since`.
    async fn find_unread(&self, user_id: i64, since: Option<DateTime<Utc>>)
        -> AppResult<Vec<Notification>>;

    /// Minimal `{id, user_id}` projection for ownership checks.
    async fn find_simple(&self, id: i64) -> AppResult<Option<NotificationSimple>>;

    /// Conditional update scoped by both id and owning user. Returns the
    /// affected row count (0 or 1); the caller decides what 0 means.
    async fn mark_as_read(&self, id: i64, user_id: i64) -> AppResult<usize>;

    async fn mark_all_as_read(&self, user_id: i64) -> AppResult<usize>;
}

pub struct PgNotificationStore {
    pool: DbPool,
}

impl PgNotificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<PooledConnection<ConnectionManager<PgConnection>>> {
        self.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection");
            AppError::internal("database connection error")
        })
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, user_id: i64, content: &str) -> AppResult<Notification> {
        let mut conn = self.conn()?;

        let new_notification = NewNotification {
            user_id,
            content: content.to_string(),
        };

        let notification = diesel::insert_into(notifications::table)
            .values(&new_notification)
            .get_result::<Notification>(&mut conn)?;

        tracing::debug!(
            notification_id = %notification.id,
            user_id = %user_id,
            "notification created"
        );

        Ok(notification)
    }

    async fn create_many(&self, entries: Vec<NewNotification>) -> AppResult<Vec<Notification>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;

        let created = diesel::insert_into(notifications::table)
            .values(&entries)
            .get_results::<Notification>(&mut conn)?;

        tracing::debug!(count = created.len(), "notification batch created");
        Ok(created)
    }

    async fn find_page(&self, user_id: i64, limit: i64, offset: i64)
        -> AppResult<(Vec<Notification>, i64)>
    {
        let mut conn = self.conn()?;

        let total: i64 = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .count()
            .get_result(&mut conn)?;

        let items = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order(notifications::created_at.desc())
            .limit(limit)
            .offset(offset)
            .load::<Notification>(&mut conn)?;

        Ok((items, total))
    }

    async fn find_unread(&self, user_id: i64, since: Option<DateTime<Utc>>)
        -> AppResult<Vec<Notification>>
    {
        let mut conn = self.conn()?;

        let mut query = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_checked.eq(false))
            .into_boxed();

        if let Some(since) = since {
            query = query.filter(notifications::created_at.gt(since));
        }

        let items = query
            .order(notifications::created_at.asc())
            .load::<Notification>(&mut conn)?;

        Ok(items)
    }

    async fn find_simple(&self, id: i64) -> AppResult<Option<NotificationSimple>> {
        let mut conn = self.conn()?;

        let record = notifications::table
            .find(id)
            .select((notifications::id, notifications::user_id))
            .first::<NotificationSimple>(&mut conn)
            .optional()?;

        Ok(record)
    }

    async fn mark_as_read(&self, id: i64, user_id: i64) -> AppResult<usize> {
        let mut conn = self.conn()?;

        let affected = diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(notifications::is_checked.eq(true))
        .execute(&mut conn)?;

        Ok(affected)
    }

    async fn mark_all_as_read(&self, user_id: i64) -> AppResult<usize> {
        let mut conn = self.conn()?;

        let affected = diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::is_checked.eq(false)),
        )
        .set(notifications::is_checked.eq(true))
        .execute(&mut conn)?;

        Ok(affected)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory store used by service and dispatcher tests. Records the
    /// size of every `create_many` batch so fanout chunking is observable.
    #[derive(Default)]
    pub struct MemoryStore {
        state: Mutex<State>,
        pub force_mark_zero: AtomicBool,
    }

    #[derive(Default)]
    struct State {
        next_id: i64,
        rows: Vec<Notification>,
        batch_sizes: Vec<usize>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn batch_sizes(&self) -> Vec<usize> {
            self.state.lock().unwrap().batch_sizes.clone()
        }

        pub fn rows(&self) -> Vec<Notification> {
            self.state.lock().unwrap().rows.clone()
        }

        fn insert(state: &mut State, user_id: i64, content: &str) -> Notification {
            state.next_id += 1;
            let row = Notification {
                id: state.next_id,
                user_id,
                content: content.to_string(),
                is_checked: false,
                created_at: Utc::now(),
            };
            state.rows.push(row.clone());
            row
        }
    }

    #[async_trait]
    impl NotificationStore for MemoryStore {
        async fn create(&self, user_id: i64, content: &str) -> AppResult<Notification> {
            let mut state = self.state.lock().unwrap();
            Ok(Self::insert(&mut state, user_id, content))
        }

        async fn create_many(&self, entries: Vec<NewNotification>) -> AppResult<Vec<Notification>> {
            let mut state = self.state.lock().unwrap();
            state.batch_sizes.push(entries.len());
            Ok(entries
                .iter()
                .map(|e| Self::insert(&mut state, e.user_id, &e.content))
                .collect())
        }

        async fn find_page(&self, user_id: i64, limit: i64, offset: i64)
            -> AppResult<(Vec<Notification>, i64)>
        {
            let state = self.state.lock().unwrap();
            let mut mine: Vec<Notification> = state
                .rows
                .iter()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            let total = mine.len() as i64;
            mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            let page = mine
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect();
            Ok((page, total))
        }

        async fn find_unread(&self, user_id: i64, since: Option<DateTime<Utc>>)
            -> AppResult<Vec<Notification>>
        {
            let state = self.state.lock().unwrap();
            Ok(state
                .rows
                .iter()
                .filter(|r| r.user_id == user_id && !r.is_checked)
                .filter(|r| since.map(|s| r.created_at > s).unwrap_or(true))
                .cloned()
                .collect())
        }

        async fn find_simple(&self, id: i64) -> AppResult<Option<NotificationSimple>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .rows
                .iter()
                .find(|r| r.id == id)
                .map(|r| NotificationSimple { id: r.id, user_id: r.user_id }))
        }

        async fn mark_as_read(&self, id: i64, user_id: i64) -> AppResult<usize> {
            if self.force_mark_zero.load(Ordering::Relaxed) {
                return Ok(0);
            }
            let mut state = self.state.lock().unwrap();
            let mut affected = 0;
            for row in state.rows.iter_mut() {
                if row.id == id && row.user_id == user_id {
                    row.is_checked = true;
                    affected += 1;
                }
            }
            Ok(affected)
        }

        async fn mark_all_as_read(&self, user_id: i64) -> AppResult<usize> {
            let mut state = self.state.lock().unwrap();
            let mut affected = 0;
            for row in state.rows.iter_mut() {
                if row.user_id == user_id && !row.is_checked {
                    row.is_checked = true;
                    affected += 1;
                }
            }
            Ok(affected)
        }
    }
}
