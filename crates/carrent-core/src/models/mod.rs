//! Domain models for the Carrent marketplace
//!
//! This module contains all the core domain models used throughout the application.

pub mod booking;
pub mod payment;
pub mod pricing;
pub mod user;
pub mod vehicle;

pub use booking::{
    BookedRange, Booking, BookingStatus, DateRange, NewBooking, PaymentMethod, PaymentStatus,
};
pub use payment::{ChargeStatus, NewPayment, Payment};
pub use pricing::PricingBreakdown;
pub use user::{Actor, NotificationKind, UserRole};
pub use vehicle::{UnavailableReason, Vehicle, VehicleStatus};
