//! Marketplace actors
//!
//! Users are managed by the external identity service. The booking core only
//! needs the acting user's id and role, passed explicitly into every operation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marketplace role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Books vehicles
    #[default]
    Renter,
    /// Lists vehicles
    Owner,
    /// Moderates the marketplace
    Admin,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Renter => write!(f, "renter"),
            UserRole::Owner => write!(f, "owner"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl UserRole {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "renter" => Some(UserRole::Renter),
            "owner" => Some(UserRole::Owner),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// The user on whose behalf an operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: i64, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn renter(id: i64) -> Self {
        Self::new(id, UserRole::Renter)
    }

    pub fn admin(id: i64) -> Self {
        Self::new(id, UserRole::Admin)
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Message template used for booking notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Renter: booking placed, awaiting payment or approval
    BookingPending,
    /// Renter: booking paid and confirmed
    BookingConfirmed,
    /// Owner: a vehicle of theirs was booked
    VehicleBooked,
    /// Admins: cash booking needs manual settlement
    CashBookingReview,
    /// Renter and owner: booking cancelled
    BookingCancelled,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingPending => "booking_pending",
            NotificationKind::BookingConfirmed => "booking_confirmed",
            NotificationKind::VehicleBooked => "vehicle_booked",
            NotificationKind::CashBookingReview => "cash_booking_review",
            NotificationKind::BookingCancelled => "booking_cancelled",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
