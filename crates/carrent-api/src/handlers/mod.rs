//! HTTP request handlers

pub mod availability;
pub mod booking;
pub mod health;

pub use availability::configure as configure_availability;
pub use booking::configure as configure_bookings;
pub use health::health_check;
