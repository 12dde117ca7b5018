use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};

use hanok_shared::clients::db::DbPool;
use hanok_shared::errors::{AppError, AppResult};

use crate::schema::{apartments, complaints, residents, users};

#[derive(Debug, Clone, Copy)]
pub struct ComplaintSummary {
    pub apartment_id: i64,
    pub author_id: i64,
}

/// Read-only lookups against the directory data owned by other modules
/// (users, apartments, residents, complaints). The dispatcher resolves
/// recipient sets exclusively through this port.
#[async_trait]
pub trait DirectoryQueries: Send + Sync {
    /// User ids of every currently active super administrator.
    async fn active_super_admin_ids(&self) -> AppResult<Vec<i64>>;

    /// The administrator user of an apartment, if one is assigned.
    async fn apartment_admin_id(&self, apartment_id: i64) -> AppResult<Option<i64>>;

    async fn apartment_of_resident(&self, resident_id: i64) -> AppResult<Option<i64>>;

    async fn complaint_summary(&self, complaint_id: i64) -> AppResult<Option<ComplaintSummary>>;

    /// User ids of an apartment's registered residents: resident rows with
    /// a linked, active user account. Unlinked rows are excluded.
    async fn registered_resident_user_ids(&self, apartment_id: i64) -> AppResult<Vec<i64>>;
}

pub struct PgDirectoryQueries {
    pool: DbPool,
}

impl PgDirectoryQueries {
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
impl DirectoryQueries for PgDirectoryQueries {
    async fn active_super_admin_ids(&self) -> AppResult<Vec<i64>> {
        let mut conn = self.conn()?;

        let ids = users::table
            .filter(users::role.eq("super_admin"))
            .filter(users::is_active.eq(true))
            .select(users::id)
            .load::<i64>(&mut conn)?;

        Ok(ids)
    }

    async fn apartment_admin_id(&self, apartment_id: i64) -> AppResult<Option<i64>> {
        let mut conn = self.conn()?;

        let admin_id = apartments::table
            .find(apartment_id)
            .select(apartments::admin_user_id)
            .first::<Option<i64>>(&mut conn)
            .optional()?;

        Ok(admin_id.flatten())
    }

    async fn apartment_of_resident(&self, resident_id: i64) -> AppResult<Option<i64>> {
        let mut conn = self.conn()?;

        let apartment_id = residents::table
            .find(resident_id)
            .select(residents::apartment_id)
            .first::<i64>(&mut conn)
            .optional()?;

        Ok(apartment_id)
    }

    async fn complaint_summary(&self, complaint_id: i64) -> AppResult<Option<ComplaintSummary>> {
        let mut conn = self.conn()?;

        let row = complaints::table
            .find(complaint_id)
            .select((complaints::apartment_id, complaints::author_id))
            .first::<(i64, i64)>(&mut conn)
            .optional()?;

        Ok(row.map(|(apartment_id, author_id)| ComplaintSummary { apartment_id, author_id }))
    }

    async fn registered_resident_user_ids(&self, apartment_id: i64) -> AppResult<Vec<i64>> {
        let mut conn = self.conn()?;

        let ids = residents::table
            .inner_join(users::table)
            .filter(residents::apartment_id.eq(apartment_id))
            .filter(users::is_active.eq(true))
            .select(users::id)
            .load::<i64>(&mut conn)?;

        Ok(ids)
    }
}
