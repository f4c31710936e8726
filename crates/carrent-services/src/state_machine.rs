//! Booking state machine
//!
//! | from                | trigger          | to                      |
//! |---------------------|------------------|-------------------------|
//! | pending / unpaid    | PaymentSucceeded | confirmed / paid        |
//! | pending / unpaid    | PaymentFailed    | payment_failed / unpaid |
//! | pending / unpaid    | MarkPaid         | confirmed / paid        |
//! | pending, confirmed  | Cancel           | cancelled / unchanged   |
//! | confirmed / paid    | Start            | ongoing / paid          |
//! | ongoing / paid      | Complete         | completed / paid        |
//!
//! Every other pair is rejected with `InvalidTransition`.

use carrent_core::models::{BookingStatus, PaymentStatus};
use carrent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingTrigger {
    /// Gateway captured the charge
    PaymentSucceeded,
    /// Gateway declined, errored or timed out
    PaymentFailed,
    /// Administrator recorded a manual settlement
    MarkPaid,
    Cancel,
    /// Rental period began
    Start,
    /// Rental period ended
    Complete,
}

impl BookingTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingTrigger::PaymentSucceeded => "payment_succeeded",
            BookingTrigger::PaymentFailed => "payment_failed",
            BookingTrigger::MarkPaid => "mark_paid",
            BookingTrigger::Cancel => "cancel",
            BookingTrigger::Start => "start",
            BookingTrigger::Complete => "complete",
        }
    }
}

impl fmt::Display for BookingTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a booking on both status axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingState {
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
}

impl BookingState {
    pub fn new(status: BookingStatus, payment_status: PaymentStatus) -> Self {
        Self {
            status,
            payment_status,
        }
    }

    /// Every booking starts pending and unpaid, whatever the payment method
    pub fn initial() -> Self {
        Self::new(BookingStatus::Pending, PaymentStatus::Unpaid)
    }

    /// Apply a trigger, returning the next state
    ///
    /// `booking_id` is only used to build the error.
    pub fn apply(self, booking_id: i64, trigger: BookingTrigger) -> AppResult<Self> {
        use BookingStatus as S;
        use BookingTrigger as T;
        use PaymentStatus as P;

        let next = match (self.status, self.payment_status, trigger) {
            (S::Pending, P::Unpaid, T::PaymentSucceeded | T::MarkPaid) => {
                Self::new(S::Confirmed, P::Paid)
            }
            (S::Pending, P::Unpaid, T::PaymentFailed) => Self::new(S::PaymentFailed, P::Unpaid),
            (S::Pending | S::Confirmed, payment, T::Cancel) => Self::new(S::Cancelled, payment),
            (S::Confirmed, P::Paid, T::Start) => Self::new(S::Ongoing, P::Paid),
            (S::Ongoing, P::Paid, T::Complete) => Self::new(S::Completed, P::Paid),
            (from, _, trigger) => {
                return Err(AppError::InvalidTransition {
                    booking_id,
                    from,
                    trigger: trigger.to_string(),
                })
            }
        };

        Ok(next)
    }

    pub fn can_apply(self, trigger: BookingTrigger) -> bool {
        self.apply(0, trigger).is_ok()
    }
}
