//! Who may do what to a booking

use carrent_core::models::{Actor, Booking};
use carrent_core::{AppError, AppResult};
use tracing::warn;

pub struct BookingPolicy;

impl BookingPolicy {
    /// Renter, owner of the booked vehicle, or an administrator
    pub fn can_view(actor: &Actor, booking: &Booking, vehicle_owner_id: Option<i64>) -> bool {
        actor.is_admin() || actor.id == booking.renter_id || vehicle_owner_id == Some(actor.id)
    }

    pub fn can_cancel(actor: &Actor, booking: &Booking) -> bool {
        actor.is_admin() || actor.id == booking.renter_id
    }

    pub fn ensure_view(actor: &Actor, booking: &Booking, vehicle_owner_id: Option<i64>) -> AppResult<()> {
        if Self::can_view(actor, booking, vehicle_owner_id) {
            return Ok(());
        }
        Err(Self::deny(actor, booking.id, "view"))
    }

    pub fn ensure_cancel(actor: &Actor, booking: &Booking) -> AppResult<()> {
        if Self::can_cancel(actor, booking) {
            return Ok(());
        }
        Err(Self::deny(actor, booking.id, "cancel"))
    }

    /// Manual settlement and deletion are administrator actions
    pub fn ensure_admin(actor: &Actor, booking_id: i64, action: &str) -> AppResult<()> {
        if actor.is_admin() {
            return Ok(());
        }
        Err(Self::deny(actor, booking_id, action))
    }

    fn deny(actor: &Actor, booking_id: i64, action: &str) -> AppError {
        warn!(
            user_id = actor.id,
            role = %actor.role,
            booking_id,
            action,
            "Booking access denied"
        );
        AppError::Unauthorized(format!("Not allowed to {} booking {}", action, booking_id))
    }
}
