//! Availability checker
//!
//! A vehicle can take a booking for an inclusive date range when it is
//! bookable today and no non-cancelled booking of it shares a calendar day
//! with the range.

use carrent_core::{
    models::{DateRange, UnavailableReason, Vehicle},
    traits::{TransactionManager, VehicleStore},
    AppError, AppResult,
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Verify the vehicle is bookable and the range is free
///
/// Run this inside the unit of work that will insert the booking, after the
/// vehicle lock is held.
pub async fn assert_available<S>(
    store: &mut S,
    vehicle_id: i64,
    range: DateRange,
    today: NaiveDate,
) -> AppResult<Vehicle>
where
    S: VehicleStore + ?Sized,
{
    let vehicle = store
        .get_vehicle(vehicle_id)
        .await?
        .ok_or(AppError::VehicleUnavailable {
            vehicle_id,
            reason: UnavailableReason::NotFound,
        })?;

    if let Some(reason) = vehicle.unavailable_reason(today) {
        debug!(vehicle_id, reason = %reason, "Vehicle not bookable");
        return Err(AppError::VehicleUnavailable { vehicle_id, reason });
    }

    let overlapping = store.list_overlapping_bookings(vehicle_id, range).await?;
    // Stores may return a superset of the overlapping rows
    if let Some(existing) = overlapping
        .iter()
        .find(|b| b.status.blocks_availability() && b.range.overlaps(&range))
    {
        debug!(
            vehicle_id,
            conflicting_booking = existing.booking_id,
            "Requested range {} overlaps {}",
            range,
            existing.range
        );
        return Err(AppError::DateConflict {
            vehicle_id,
            start_date: range.start,
            end_date: range.end,
        });
    }

    Ok(vehicle)
}

/// Read-only availability queries
pub struct AvailabilityChecker {
    transactions: Arc<dyn TransactionManager>,
}

impl AvailabilityChecker {
    pub fn new(transactions: Arc<dyn TransactionManager>) -> Self {
        Self { transactions }
    }

    /// Whether the vehicle could be booked for the range as of today
    pub async fn is_available(
        &self,
        vehicle_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AppResult<bool> {
        self.is_available_on(vehicle_id, DateRange::new(start, end), Utc::now().date_naive())
            .await
    }

    /// Same as [`Self::is_available`] with an explicit "today"
    ///
    /// Runs in a unit of work that is always rolled back, so it has no effects.
    #[instrument(skip(self))]
    pub async fn is_available_on(
        &self,
        vehicle_id: i64,
        range: DateRange,
        today: NaiveDate,
    ) -> AppResult<bool> {
        let mut uow = self.transactions.begin().await?;
        let result = assert_available(uow.as_mut(), vehicle_id, range, today).await;
        uow.rollback().await?;

        match result {
            Ok(_) => Ok(true),
            Err(AppError::VehicleUnavailable { .. } | AppError::DateConflict { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
