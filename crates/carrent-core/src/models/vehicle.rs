//! Vehicle model
//!
//! Vehicles are owned and managed outside the booking core; the core only
//! reads them to decide whether a booking may be placed.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Publication status of a vehicle listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    /// Submitted by the owner, awaiting moderation
    #[default]
    Pending,
    /// Approved by an administrator but not yet listed
    Approved,
    /// Rejected during moderation
    Rejected,
    /// Listed on the marketplace and bookable
    Published,
    /// Temporarily withdrawn for maintenance
    Maintenance,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleStatus::Pending => write!(f, "pending"),
            VehicleStatus::Approved => write!(f, "approved"),
            VehicleStatus::Rejected => write!(f, "rejected"),
            VehicleStatus::Published => write!(f, "published"),
            VehicleStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

impl VehicleStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(VehicleStatus::Pending),
            "approved" => Some(VehicleStatus::Approved),
            "rejected" => Some(VehicleStatus::Rejected),
            "published" => Some(VehicleStatus::Published),
            "maintenance" => Some(VehicleStatus::Maintenance),
            _ => None,
        }
    }
}

/// Reason a vehicle cannot be booked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    /// No vehicle with the requested id
    NotFound,
    /// Owner or admin switched the availability flag off
    FlaggedUnavailable,
    /// Listing is not in the published state
    NotPublished,
    /// Insurance expired before today
    InsuranceExpired,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnavailableReason::NotFound => "not_found",
            UnavailableReason::FlaggedUnavailable => "flagged_unavailable",
            UnavailableReason::NotPublished => "not_published",
            UnavailableReason::InsuranceExpired => "insurance_expired",
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vehicle entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    /// Unique identifier
    pub id: i64,

    /// Owning user
    pub owner_id: i64,

    pub make: String,

    pub model: String,

    /// Price per rental day
    pub daily_rate: Decimal,

    /// Availability flag controlled by the owner
    pub is_available: bool,

    /// Publication status
    pub status: VehicleStatus,

    /// Last day the insurance policy is valid (inclusive)
    pub insurance_expiry: Option<NaiveDate>,

    /// Registered pickup location
    pub location: String,
}

impl Vehicle {
    /// Check whether the vehicle may take a booking as of `today`
    ///
    /// Returns the first failing condition, if any.
    pub fn unavailable_reason(&self, today: NaiveDate) -> Option<UnavailableReason> {
        if !self.is_available {
            return Some(UnavailableReason::FlaggedUnavailable);
        }
        if self.status != VehicleStatus::Published {
            return Some(UnavailableReason::NotPublished);
        }
        match self.insurance_expiry {
            Some(expiry) if expiry < today => Some(UnavailableReason::InsuranceExpired),
            _ => None,
        }
    }

    #[inline]
    pub fn is_bookable(&self, today: NaiveDate) -> bool {
        self.unavailable_reason(today).is_none()
    }
}

impl Default for Vehicle {
    fn default() -> Self {
        Self {
            id: 0,
            owner_id: 0,
            make: String::new(),
            model: String::new(),
            daily_rate: Decimal::ZERO,
            is_available: true,
            status: VehicleStatus::Published,
            insurance_expiry: None,
            location: String::new(),
        }
    }
}
