//! Time-driven booking transitions
//!
//! Confirmed bookings start on their first rental day and ongoing bookings
//! complete the day after their last. Each booking moves in its own unit of
//! work; one failure does not stop the batch.

use carrent_core::{
    events::BookingEvent,
    models::{Booking, BookingStatus},
    traits::{BookingRepository, EventSink, TransactionManager},
    AppError, AppResult,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::booking_service::{abort, apply_transition, lock_live_booking};
use crate::notifications::publish_all;
use crate::state_machine::BookingTrigger;

/// Counts from one [`LifecycleService::advance`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    pub started: usize,
    pub completed: usize,
    /// Bookings that errored or changed underneath the pass
    pub skipped: usize,
}

pub struct LifecycleService {
    transactions: Arc<dyn TransactionManager>,
    bookings: Arc<dyn BookingRepository>,
    events: Arc<dyn EventSink>,
}

impl LifecycleService {
    pub fn new(
        transactions: Arc<dyn TransactionManager>,
        bookings: Arc<dyn BookingRepository>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transactions,
            bookings,
            events,
        }
    }

    #[instrument(skip(self))]
    pub async fn advance(&self, today: NaiveDate) -> AppResult<LifecycleReport> {
        let mut report = LifecycleReport::default();

        for booking in self.bookings.list_due_for_start(today).await? {
            match self.step(booking.id, BookingTrigger::Start, today).await {
                Ok(true) => report.started += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(booking_id = booking.id, error = %e, "Failed to start booking");
                    report.skipped += 1;
                }
            }
        }

        for booking in self.bookings.list_due_for_completion(today).await? {
            match self.step(booking.id, BookingTrigger::Complete, today).await {
                Ok(true) => report.completed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(booking_id = booking.id, error = %e, "Failed to complete booking");
                    report.skipped += 1;
                }
            }
        }

        if report.started + report.completed > 0 {
            info!(
                "Lifecycle pass for {}: {} started, {} completed, {} skipped",
                today, report.started, report.completed, report.skipped
            );
        }
        Ok(report)
    }

    /// Re-check the locked row; returns false when it is no longer due
    async fn step(&self, booking_id: i64, trigger: BookingTrigger, today: NaiveDate) -> AppResult<bool> {
        let mut uow = self.transactions.begin().await?;

        let result = async {
            let booking = lock_live_booking(uow.as_mut(), booking_id).await?;
            if !is_due(&booking, trigger, today) {
                debug!(booking_id, status = %booking.status, "Booking no longer due");
                return Ok(None);
            }
            let (_, event) = apply_transition(uow.as_mut(), booking, trigger, None).await?;
            Ok::<_, AppError>(Some(event))
        }
        .await;

        let event: Option<BookingEvent> = match result {
            Ok(event) => event,
            Err(e) => return abort(uow, e).await,
        };

        match event {
            Some(event) => {
                uow.commit().await?;
                publish_all(self.events.as_ref(), std::slice::from_ref(&event)).await;
                Ok(true)
            }
            None => {
                uow.rollback().await?;
                Ok(false)
            }
        }
    }
}

fn is_due(booking: &Booking, trigger: BookingTrigger, today: NaiveDate) -> bool {
    match trigger {
        BookingTrigger::Start => booking.status == BookingStatus::Confirmed && booking.start_date <= today,
        BookingTrigger::Complete => booking.status == BookingStatus::Ongoing && booking.end_date < today,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrent_core::models::{DateRange, NewBooking, PaymentMethod, PaymentStatus};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn booking(status: BookingStatus, start: u32, end: u32) -> Booking {
        NewBooking {
            renter_id: 1,
            vehicle_id: 1,
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2025, 4, start).unwrap(),
                NaiveDate::from_ymd_opt(2025, 4, end).unwrap(),
            ),
            total_amount: Decimal::ZERO,
            status,
            payment_method: PaymentMethod::Visa,
            payment_status: PaymentStatus::Paid,
            pickup_location: String::new(),
            dropoff_location: String::new(),
            special_requests: None,
        }
        .into_booking(1, Utc::now())
    }

    #[test]
    fn test_is_due() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();

        assert!(is_due(&booking(BookingStatus::Confirmed, 10, 12), BookingTrigger::Start, today));
        assert!(!is_due(&booking(BookingStatus::Confirmed, 11, 12), BookingTrigger::Start, today));
        assert!(!is_due(&booking(BookingStatus::Pending, 9, 12), BookingTrigger::Start, today));

        assert!(is_due(&booking(BookingStatus::Ongoing, 5, 9), BookingTrigger::Complete, today));
        // Last rental day is still in progress
        assert!(!is_due(&booking(BookingStatus::Ongoing, 5, 10), BookingTrigger::Complete, today));
    }
}
