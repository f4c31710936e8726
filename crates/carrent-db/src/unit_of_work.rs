//! PostgreSQL unit of work
//!
//! Wraps one sqlx transaction. The vehicle row is locked with `SELECT ... FOR UPDATE`
//! so concurrent bookings of the same vehicle serialize; the `bookings_no_overlap`
//! exclusion constraint rejects anything that slips past. Dropping the unit of work
//! without committing rolls the transaction back.

use crate::repositories::rows::{
    BookingRow, PaymentRow, VehicleRow, BOOKING_COLUMNS, PAYMENT_COLUMNS,
    VEHICLE_COLUMNS,
};
use async_trait::async_trait;
use carrent_core::{
    models::{
        BookedRange, Booking, BookingStatus, DateRange, NewBooking, NewPayment, Payment,
        PaymentStatus, Vehicle,
    },
    traits::{BookingStore, TransactionManager, UnitOfWork, VehicleStore},
    AppError, AppResult,
};
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, instrument, warn};

/// SQLSTATE raised by exclusion constraint violations
const EXCLUSION_VIOLATION: &str = "23P01";

/// Opens [`PgUnitOfWork`]s on a pool
#[derive(Clone)]
pub struct PgTransactionManager {
    pool: PgPool,
}

impl PgTransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionManager for PgTransactionManager {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }
}

pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    fn tx(&mut self) -> AppResult<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| AppError::Transaction("Unit of work already finished".to_string()))
    }
}

#[derive(sqlx::FromRow)]
struct BookedRangeRow {
    id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
}

#[async_trait]
impl VehicleStore for PgUnitOfWork {
    #[instrument(skip(self))]
    async fn get_vehicle(&mut self, id: i64) -> AppResult<Option<Vehicle>> {
        let sql = format!("SELECT {} FROM vehicles WHERE id = $1", VEHICLE_COLUMNS);
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| {
                error!("Failed to load vehicle {}: {}", id, e);
                AppError::Database(format!("Failed to load vehicle: {}", e))
            })?;

        row.map(Vehicle::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_overlapping_bookings(
        &mut self,
        vehicle_id: i64,
        range: DateRange,
    ) -> AppResult<Vec<BookedRange>> {
        let tx = self.tx()?;
        let rows = sqlx::query_as::<_, BookedRangeRow>(
            r#"
            SELECT id, start_date, end_date, status
            FROM bookings
            WHERE vehicle_id = $1
              AND status <> 'cancelled'
              AND start_date <= $3
              AND end_date >= $2
            ORDER BY start_date
            "#,
        )
        .bind(vehicle_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| {
            error!("Failed to query overlapping bookings: {}", e);
            AppError::Database(format!("Failed to query overlapping bookings: {}", e))
        })?;

        rows.into_iter()
            .map(|row| {
                let status = BookingStatus::from_str(&row.status).ok_or_else(|| {
                    AppError::Database(format!("Unknown booking status: {}", row.status))
                })?;
                Ok(BookedRange {
                    booking_id: row.id,
                    range: DateRange::new(row.start_date, row.end_date),
                    status,
                })
            })
            .collect()
    }
}

#[async_trait]
impl BookingStore for PgUnitOfWork {
    #[instrument(skip(self, booking), fields(vehicle_id = booking.vehicle_id))]
    async fn insert_booking(&mut self, booking: &NewBooking) -> AppResult<Booking> {
        debug!("Inserting booking for {}", booking.range);

        let sql = format!(
            r#"
            INSERT INTO bookings (
                renter_id, vehicle_id, start_date, end_date, total_amount,
                status, payment_method, payment_status,
                pickup_location, dropoff_location, special_requests
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking.renter_id)
            .bind(booking.vehicle_id)
            .bind(booking.range.start)
            .bind(booking.range.end)
            .bind(booking.total_amount)
            .bind(booking.status.as_str())
            .bind(booking.payment_method.as_str())
            .bind(booking.payment_status.as_str())
            .bind(&booking.pickup_location)
            .bind(&booking.dropoff_location)
            .bind(&booking.special_requests)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.code().as_deref() == Some(EXCLUSION_VIOLATION) => {
                    warn!(
                        "Exclusion constraint rejected booking for vehicle {}",
                        booking.vehicle_id
                    );
                    AppError::BookingOverlap(booking.vehicle_id)
                }
                _ => {
                    error!("Failed to insert booking: {}", e);
                    AppError::Database(format!("Failed to insert booking: {}", e))
                }
            })?;

        Booking::try_from(row)
    }

    #[instrument(skip(self))]
    async fn update_booking_status(
        &mut self,
        id: i64,
        status: BookingStatus,
        payment_status: PaymentStatus,
    ) -> AppResult<()> {
        let tx = self.tx()?;
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, payment_status = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(payment_status.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            error!("Failed to update booking {}: {}", id, e);
            AppError::Database(format!("Failed to update booking: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::BookingNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self, payment), fields(booking_id = payment.booking_id))]
    async fn insert_payment(&mut self, payment: &NewPayment) -> AppResult<Payment> {
        let sql = format!(
            r#"
            INSERT INTO payments (
                booking_id, amount, method, status,
                transaction_reference, gateway_response, processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(payment.booking_id)
            .bind(payment.amount)
            .bind(payment.method.as_str())
            .bind(payment.status.as_str())
            .bind(&payment.transaction_reference)
            .bind(&payment.gateway_response)
            .bind(payment.processed_at)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                error!("Failed to insert payment: {}", e);
                AppError::Database(format!("Failed to insert payment: {}", e))
            })?;

        Payment::try_from(row)
    }

    #[instrument(skip(self))]
    async fn get_booking_for_update(&mut self, id: i64) -> AppResult<Option<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        );
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| {
                error!("Failed to lock booking {}: {}", id, e);
                AppError::Database(format!("Failed to lock booking: {}", e))
            })?;

        row.map(Booking::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn soft_delete_booking(&mut self, id: i64) -> AppResult<bool> {
        let tx = self.tx()?;
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            error!("Failed to soft delete booking {}: {}", id, e);
            AppError::Database(format!("Failed to delete booking: {}", e))
        })?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    #[instrument(skip(self))]
    async fn lock_vehicle(&mut self, vehicle_id: i64) -> AppResult<()> {
        let tx = self.tx()?;
        sqlx::query("SELECT id FROM vehicles WHERE id = $1 FOR UPDATE")
            .bind(vehicle_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| {
                error!("Failed to lock vehicle {}: {}", vehicle_id, e);
                AppError::Database(format!("Failed to lock vehicle: {}", e))
            })?;

        Ok(())
    }

    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Transaction("Unit of work already finished".to_string()))?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })
    }

    async fn rollback(&mut self) -> AppResult<()> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(|e| {
                error!("Failed to roll back transaction: {}", e);
                AppError::Transaction(format!("Failed to roll back transaction: {}", e))
            }),
            None => Ok(()),
        }
    }
}

