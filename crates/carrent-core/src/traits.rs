//! Collaborator traits for storage, payment and notification
//!
//! Writes that must be atomic go through a [`UnitOfWork`] obtained from a
//! [`TransactionManager`]; plain reads use the repository traits against the pool.

use crate::error::AppError;
use crate::events::BookingEvent;
use crate::models::{
    BookedRange, Booking, BookingStatus, DateRange, NewBooking, NewPayment, NotificationKind,
    Payment, PaymentMethod, PaymentStatus, Vehicle,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Vehicle reads inside a unit of work
#[async_trait]
pub trait VehicleStore: Send {
    async fn get_vehicle(&mut self, id: i64) -> Result<Option<Vehicle>, AppError>;

    /// Non-cancelled bookings of the vehicle whose range overlaps `range`
    ///
    /// Soft-deleted bookings are included unless they are cancelled.
    async fn list_overlapping_bookings(
        &mut self,
        vehicle_id: i64,
        range: DateRange,
    ) -> Result<Vec<BookedRange>, AppError>;
}

/// Booking and payment writes inside a unit of work
#[async_trait]
pub trait BookingStore: Send {
    /// Insert a booking row
    ///
    /// Returns `AppError::BookingOverlap` when the store's overlap constraint rejects it.
    async fn insert_booking(&mut self, booking: &NewBooking) -> Result<Booking, AppError>;

    async fn update_booking_status(
        &mut self,
        id: i64,
        status: BookingStatus,
        payment_status: PaymentStatus,
    ) -> Result<(), AppError>;

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<Payment, AppError>;

    /// Load a booking and lock it for the rest of the unit of work
    async fn get_booking_for_update(&mut self, id: i64) -> Result<Option<Booking>, AppError>;

    /// Mark a booking deleted; returns false when it was already deleted
    async fn soft_delete_booking(&mut self, id: i64) -> Result<bool, AppError>;
}

/// A scoped transaction over vehicles, bookings and payments
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] discards its writes.
#[async_trait]
pub trait UnitOfWork: VehicleStore + BookingStore + Send {
    /// Acquire the exclusive per-vehicle lock, held until commit or rollback
    async fn lock_vehicle(&mut self, vehicle_id: i64) -> Result<(), AppError>;

    async fn commit(&mut self) -> Result<(), AppError>;

    async fn rollback(&mut self) -> Result<(), AppError>;
}

#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError>;
}

/// Booking reads outside a transaction
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Find a booking, including soft-deleted ones
    async fn find_by_id(&self, id: i64) -> Result<Option<Booking>, AppError>;

    /// Non-deleted bookings of a renter, newest first, with the total count
    async fn list_by_renter(
        &self,
        renter_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Booking>, i64), AppError>;

    /// Confirmed, non-deleted bookings whose rental period has begun
    async fn list_due_for_start(&self, today: NaiveDate) -> Result<Vec<Booking>, AppError>;

    /// Ongoing, non-deleted bookings whose rental period has ended
    async fn list_due_for_completion(&self, today: NaiveDate) -> Result<Vec<Booking>, AppError>;
}

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Vehicle>, AppError>;
}

/// Read access to the external user directory
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Ids of all active administrators
    async fn admin_ids(&self) -> Result<Vec<i64>, AppError>;
}

/// Charge request sent to the payment gateway
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub booking_id: i64,
    pub method: PaymentMethod,
    /// Gateway token or card reference supplied by the renter
    pub method_ref: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Gateway verdict
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub success: bool,
    pub reference: Option<String>,
    pub message: Option<String>,
    /// Response body as returned by the gateway
    pub raw: Option<JsonValue>,
}

impl ChargeOutcome {
    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            reference: None,
            message: Some(message.into()),
            raw: None,
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Attempt a charge
    ///
    /// A decline is `Ok` with `success == false`; `Err` means the call itself failed.
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, AppError>;
}

/// Enqueues a notification for delivery by an external worker
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: i64,
        kind: NotificationKind,
        payload: JsonValue,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &BookingEvent) -> Result<(), AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination() {
        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn test_pagination_bounds() {
        assert_eq!(Pagination::new(0, 10).page, 1);
        assert_eq!(Pagination::new(1, 500).per_page, 100);
        assert_eq!(Pagination::new(1, 0).per_page, 1);
    }

    #[test]
    fn test_pagination_meta() {
        assert_eq!(PaginationMeta::new(0, 1, 20).total_pages, 0);
        assert_eq!(PaginationMeta::new(41, 1, 20).total_pages, 3);
    }
}
