//! Booking domain events
//!
//! Events are collected while a unit of work is open and published only after it
//! commits, so subscribers never observe a booking that was rolled back.

use crate::models::{BookingStatus, DateRange, PaymentMethod, PaymentStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    BookingCreated {
        booking_id: i64,
        vehicle_id: i64,
        renter_id: i64,
        range: DateRange,
        total_amount: Decimal,
        payment_method: PaymentMethod,
        at: DateTime<Utc>,
    },
    PaymentAttempted {
        booking_id: i64,
        amount: Decimal,
        method: PaymentMethod,
        success: bool,
        reference: Option<String>,
        message: Option<String>,
        at: DateTime<Utc>,
    },
    BookingStateChanged {
        booking_id: i64,
        from: BookingStatus,
        to: BookingStatus,
        payment_status: PaymentStatus,
        trigger: String,
        actor_id: Option<i64>,
        at: DateTime<Utc>,
    },
}

impl BookingEvent {
    pub fn booking_id(&self) -> i64 {
        match self {
            BookingEvent::BookingCreated { booking_id, .. }
            | BookingEvent::PaymentAttempted { booking_id, .. }
            | BookingEvent::BookingStateChanged { booking_id, .. } => *booking_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingCreated { .. } => "booking_created",
            BookingEvent::PaymentAttempted { .. } => "payment_attempted",
            BookingEvent::BookingStateChanged { .. } => "booking_state_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = BookingEvent::BookingCreated {
            booking_id: 9,
            vehicle_id: 3,
            renter_id: 5,
            range: DateRange::new(
                NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            ),
            total_amount: dec!(178.20),
            payment_method: PaymentMethod::Cash,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "booking_created");
        assert_eq!(json["payment_method"], "cash");
        assert_eq!(event.booking_id(), 9);
        assert_eq!(event.event_type(), "booking_created");
    }
}
