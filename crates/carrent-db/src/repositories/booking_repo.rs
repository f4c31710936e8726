//! Booking repository implementation
//!
//! Pool-level reads of bookings and their payments. Writes go through
//! [`crate::PgUnitOfWork`].

use super::rows::{convert_all, BookingRow, BOOKING_COLUMNS};
use carrent_core::{
    models::Booking,
    traits::BookingRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of BookingRepository
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Booking>> {
        debug!("Finding booking by id: {}", id);

        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding booking {}: {}", id, e);
                AppError::Database(format!("Failed to find booking: {}", e))
            })?;

        row.map(Booking::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_by_renter(
        &self,
        renter_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Booking>, i64)> {
        debug!(
            "Listing bookings for renter {} (limit {}, offset {})",
            renter_id, limit, offset
        );

        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE renter_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(renter_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing bookings for renter {}: {}", renter_id, e);
                AppError::Database(format!("Failed to list bookings: {}", e))
            })?;

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings WHERE renter_id = $1 AND deleted_at IS NULL",
        )
        .bind(renter_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error counting bookings: {}", e);
            AppError::Database(format!("Failed to count bookings: {}", e))
        })?;

        Ok((convert_all(rows)?, total.0))
    }

    #[instrument(skip(self))]
    async fn list_due_for_start(&self, today: NaiveDate) -> AppResult<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE status = 'confirmed' AND start_date <= $1 AND deleted_at IS NULL
            ORDER BY start_date, id
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(today)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing bookings due to start: {}", e);
                AppError::Database(format!("Failed to list bookings due to start: {}", e))
            })?;

        convert_all(rows)
    }

    #[instrument(skip(self))]
    async fn list_due_for_completion(&self, today: NaiveDate) -> AppResult<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {} FROM bookings
            WHERE status = 'ongoing' AND end_date < $1 AND deleted_at IS NULL
            ORDER BY end_date, id
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(today)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error listing bookings due to complete: {}", e);
                AppError::Database(format!("Failed to list bookings due to complete: {}", e))
            })?;

        convert_all(rows)
    }
}
