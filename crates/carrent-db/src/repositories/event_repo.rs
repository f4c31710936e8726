//! Durable booking event log
//!
//! Every published domain event is appended to `booking_events`, giving an
//! audit trail of state changes per booking.

use carrent_core::{events::BookingEvent, traits::EventSink, AppError, AppResult};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of EventSink
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventSink for PgEventLog {
    #[instrument(skip(self, event), fields(booking_id = event.booking_id(), event_type = event.event_type()))]
    async fn publish(&self, event: &BookingEvent) -> AppResult<()> {
        debug!("Appending booking event");

        let payload = serde_json::to_value(event)?;
        sqlx::query(
            "INSERT INTO booking_events (booking_id, event_type, payload) VALUES ($1, $2, $3)",
        )
        .bind(event.booking_id())
        .bind(event.event_type())
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error appending booking event: {}", e);
            AppError::Database(format!("Failed to append booking event: {}", e))
        })?;

        Ok(())
    }
}
