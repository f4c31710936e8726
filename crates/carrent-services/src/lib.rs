//! Business logic services for the Carrent booking core
//!
//! # Services
//!
//! - [`pricing`] - pure pricing calculator and the configured `PricingPolicy`
//! - [`availability`] - vehicle bookability and date-overlap checks
//! - [`state_machine`] - the booking status transition table
//! - [`BookingService`] - transactional booking orchestration
//! - [`LifecycleService`] - time-driven start/complete transitions
//! - [`gateway`] - payment gateway adapters (HTTP and mock)
//! - [`notifications`] - post-commit notification dispatch and event sinks
//!
//! Services hold their collaborators as `Arc<dyn Trait>` and are shared across
//! actix workers behind `web::Data`.

pub mod availability;
pub mod booking_service;
pub mod gateway;
pub mod lifecycle;
pub mod notifications;
pub mod policy;
pub mod pricing;
pub mod state_machine;

pub use availability::AvailabilityChecker;
pub use booking_service::{BookingReceipt, BookingService, BookingServiceSettings, CreateBookingCommand};
pub use gateway::{gateway_from_config, HttpPaymentGateway, MockBehavior, MockPaymentGateway};
pub use lifecycle::{LifecycleReport, LifecycleService};
pub use notifications::{FanoutEventSink, NotificationDispatcher, TracingEventSink};
pub use policy::BookingPolicy;
pub use pricing::PricingPolicy;
pub use state_machine::{BookingState, BookingTrigger};

/// Business logic constants
pub mod constants {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Insurance fee as a fraction of the subtotal
    pub const DEFAULT_INSURANCE_RATE: Decimal = dec!(0.10);

    /// Tax as a fraction of subtotal plus insurance
    pub const DEFAULT_TAX_RATE: Decimal = dec!(0.08);

    pub const DEFAULT_CURRENCY: &str = "USD";

    /// Gateway charge timeout in seconds
    pub const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 15;

    /// Maximum length of free-text special requests
    pub const MAX_SPECIAL_REQUESTS_LEN: usize = 1000;

    /// Attempts at the check-then-insert step when the store reports a racing overlap
    pub const BOOKING_INSERT_ATTEMPTS: usize = 2;
}

#[cfg(test)]
mod tests {
    use super::constants::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_default_rates() {
        assert_eq!(DEFAULT_INSURANCE_RATE, Decimal::new(10, 2));
        assert_eq!(DEFAULT_TAX_RATE, Decimal::new(8, 2));
        assert!(BOOKING_INSERT_ATTEMPTS >= 2);
    }
}
