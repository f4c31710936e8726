//! Booking model
//!
//! Bookings reserve a vehicle for an inclusive range of calendar days.
//! Status and payment status are independent axes; the allowed combinations
//! are enforced by the booking state machine in `carrent-services`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, awaiting payment confirmation or manual approval
    #[default]
    Pending,
    /// Paid and confirmed
    Confirmed,
    /// Digital charge declined or timed out
    PaymentFailed,
    /// Rental period in progress
    Ongoing,
    /// Rental period finished
    Completed,
    /// Cancelled by renter or administrator
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::PaymentFailed => "payment_failed",
            BookingStatus::Ongoing => "ongoing",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "payment_failed" => Some(BookingStatus::PaymentFailed),
            "ongoing" => Some(BookingStatus::Ongoing),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether a booking in this status holds its date range against others
    ///
    /// Only cancelled bookings release the vehicle.
    #[inline]
    pub fn blocks_availability(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

/// Payment status of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Refunded,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            "refunded" => Some(PaymentStatus::Refunded),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// Payment method chosen at booking time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Settled in person, confirmed manually by an administrator
    Cash,
    /// Settled by wire transfer, confirmed manually
    BankTransfer,
    Visa,
    Mastercard,
    Amex,
    Stripe,
    Paypal,
    ApplePay,
    GooglePay,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Visa => "visa",
            PaymentMethod::Mastercard => "mastercard",
            PaymentMethod::Amex => "amex",
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::ApplePay => "apple_pay",
            PaymentMethod::GooglePay => "google_pay",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cash" => Some(PaymentMethod::Cash),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "visa" => Some(PaymentMethod::Visa),
            "mastercard" => Some(PaymentMethod::Mastercard),
            "amex" => Some(PaymentMethod::Amex),
            "stripe" => Some(PaymentMethod::Stripe),
            "paypal" => Some(PaymentMethod::Paypal),
            "apple_pay" => Some(PaymentMethod::ApplePay),
            "google_pay" => Some(PaymentMethod::GooglePay),
            _ => None,
        }
    }

    /// Digital methods are charged synchronously through the payment gateway
    pub fn is_digital(&self) -> bool {
        !matches!(self, PaymentMethod::Cash | PaymentMethod::BankTransfer)
    }

    /// Digital methods need a gateway token or card reference
    #[inline]
    pub fn requires_reference(&self) -> bool {
        self.is_digital()
    }
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of rental days, counting both boundary days
    ///
    /// Zero or negative when `end` precedes `start`.
    #[inline]
    pub fn total_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Two ranges overlap when they share at least one calendar day
    #[inline]
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    #[inline]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Date range held by an existing booking, as returned by overlap queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedRange {
    pub booking_id: i64,
    pub range: DateRange,
    pub status: BookingStatus,
}

/// Booking entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,

    /// Renting user
    pub renter_id: i64,

    pub vehicle_id: i64,

    /// First rental day (inclusive)
    pub start_date: NaiveDate,

    /// Last rental day (inclusive)
    pub end_date: NaiveDate,

    /// Grand total from the pricing breakdown
    pub total_amount: Decimal,

    pub status: BookingStatus,

    pub payment_method: PaymentMethod,

    pub payment_status: PaymentStatus,

    pub pickup_location: String,

    pub dropoff_location: String,

    pub special_requests: Option<String>,

    /// Soft-deletion marker
    pub deleted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[inline]
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Booking row to insert, before an id is assigned
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub renter_id: i64,
    pub vehicle_id: i64,
    pub range: DateRange,
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub special_requests: Option<String>,
}

impl NewBooking {
    /// Materialize the row once the store has assigned an id
    pub fn into_booking(self, id: i64, now: DateTime<Utc>) -> Booking {
        Booking {
            id,
            renter_id: self.renter_id,
            vehicle_id: self.vehicle_id,
            start_date: self.range.start,
            end_date: self.range.end,
            total_amount: self.total_amount,
            status: self.status,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            pickup_location: self.pickup_location,
            dropoff_location: self.dropoff_location,
            special_requests: self.special_requests,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_total_days_is_inclusive() {
        assert_eq!(DateRange::new(day(1), day(3)).total_days(), 3);
        assert_eq!(DateRange::new(day(5), day(5)).total_days(), 1);
        assert_eq!(DateRange::new(day(5), day(4)).total_days(), 0);
    }

    #[test]
    fn test_overlap_shares_boundary_day() {
        let existing = DateRange::new(day(10), day(15));
        assert!(existing.overlaps(&DateRange::new(day(15), day(20))));
        assert!(!existing.overlaps(&DateRange::new(day(16), day(20))));
        assert!(existing.overlaps(&DateRange::new(day(5), day(10))));
        assert!(!existing.overlaps(&DateRange::new(day(5), day(9))));
        assert!(existing.overlaps(&DateRange::new(day(1), day(31))));
    }

    #[test]
    fn test_only_cancelled_releases_availability() {
        assert!(BookingStatus::Pending.blocks_availability());
        assert!(BookingStatus::PaymentFailed.blocks_availability());
        assert!(BookingStatus::Completed.blocks_availability());
        assert!(!BookingStatus::Cancelled.blocks_availability());
    }

    #[test]
    fn test_payment_method_classification() {
        assert!(!PaymentMethod::Cash.is_digital());
        assert!(!PaymentMethod::BankTransfer.is_digital());
        assert!(PaymentMethod::Visa.is_digital());
        assert!(PaymentMethod::ApplePay.requires_reference());
        assert_eq!(PaymentMethod::from_str("Google_Pay"), Some(PaymentMethod::GooglePay));
        assert_eq!(PaymentMethod::from_str("bitcoin"), None);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&BookingStatus::PaymentFailed).unwrap();
        assert_eq!(json, "\"payment_failed\"");
        let json = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "\"bank_transfer\"");
    }
}
