//! User directory backed by the shared `users` table

use carrent_core::{traits::UserDirectory, AppError, AppResult};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, instrument};

/// PostgreSQL implementation of UserDirectory
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[instrument(skip(self))]
    async fn admin_ids(&self) -> AppResult<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM users WHERE role = 'admin' AND is_active ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    error!("Database error listing admins: {}", e);
                    AppError::Database(format!("Failed to list admins: {}", e))
                })?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
