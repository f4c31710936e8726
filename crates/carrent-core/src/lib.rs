//! Carrent Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Carrent marketplace booking core. It includes:
//!
//! - Domain models (Vehicle, Booking, Payment, PricingBreakdown, ...)
//! - Collaborator traits (stores, unit of work, gateway, notifier, event sink)
//! - Domain events emitted by the booking orchestrator
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
