//! Booking handlers
//!
//! HTTP handlers for booking creation and the renter/admin booking actions.

use crate::dto::{
    ActionResponse, BookingResponse, CreateBookingRequest, MarkPaidRequest, PageQuery,
};
use actix_web::{web, HttpResponse};
use carrent_auth::{AdminUser, AuthenticatedUser};
use carrent_core::traits::{PaginatedResponse, Pagination};
use carrent_core::AppError;
use carrent_services::BookingService;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Create a booking for the authenticated user
///
/// POST /api/v1/bookings
#[instrument(skip(service, user, req), fields(user_id = user.actor.id))]
pub async fn create_booking(
    service: web::Data<BookingService>,
    user: AuthenticatedUser,
    req: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Booking validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let command = req.into_inner().into_command()?;
    debug!(
        vehicle_id = command.vehicle_id,
        method = %command.payment_method,
        "Creating booking"
    );

    let receipt = service.create_booking(user.actor.id, command).await?;

    info!(
        booking_id = receipt.booking.id,
        status = %receipt.booking.status,
        "Booking created"
    );

    Ok(HttpResponse::Created().json(BookingResponse::from(receipt)))
}

/// List the authenticated user's bookings
///
/// GET /api/v1/bookings
#[instrument(skip(service, user))]
pub async fn list_bookings(
    service: web::Data<BookingService>,
    user: AuthenticatedUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let page = service
        .list_renter_bookings(user.actor(), Pagination::from(&*query))
        .await?;

    let currency = &service.settings().pricing.currency;
    let response = PaginatedResponse {
        data: page
            .data
            .into_iter()
            .map(|b| BookingResponse::new(b, currency))
            .collect::<Vec<_>>(),
        pagination: page.pagination,
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Get a booking
///
/// GET /api/v1/bookings/{id}
#[instrument(skip(service, user))]
pub async fn get_booking(
    service: web::Data<BookingService>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let booking = service.get_booking(user.actor(), path.into_inner()).await?;
    let currency = &service.settings().pricing.currency;

    Ok(HttpResponse::Ok().json(BookingResponse::new(booking, currency)))
}

/// Cancel a booking (renter or admin)
///
/// POST /api/v1/bookings/{id}/cancel
#[instrument(skip(service, user))]
pub async fn cancel_booking(
    service: web::Data<BookingService>,
    user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let booking = service.cancel_booking(user.actor(), path.into_inner()).await?;
    let currency = &service.settings().pricing.currency;

    Ok(HttpResponse::Ok().json(ActionResponse::new(
        BookingResponse::new(booking, currency),
        "Booking cancelled",
    )))
}

/// Record a manual settlement (admin)
///
/// POST /api/v1/bookings/{id}/mark-paid
#[instrument(skip(service, admin, req))]
pub async fn mark_paid(
    service: web::Data<BookingService>,
    admin: AdminUser,
    path: web::Path<i64>,
    req: Option<web::Json<MarkPaidRequest>>,
) -> Result<HttpResponse, AppError> {
    let req = req.map(web::Json::into_inner).unwrap_or_default();
    req.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let booking = service
        .mark_paid(admin.actor(), path.into_inner(), req.reference)
        .await?;
    let currency = &service.settings().pricing.currency;

    Ok(HttpResponse::Ok().json(ActionResponse::new(
        BookingResponse::new(booking, currency),
        "Booking marked as paid",
    )))
}

/// Soft-delete a booking (admin)
///
/// DELETE /api/v1/bookings/{id}
#[instrument(skip(service, admin))]
pub async fn delete_booking(
    service: web::Data<BookingService>,
    admin: AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let booking_id = path.into_inner();
    service.delete_booking(admin.actor(), booking_id).await?;

    info!(booking_id, admin_id = admin.actor.id, "Booking deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// Configure booking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .route("", web::get().to(list_bookings))
            .route("", web::post().to(create_booking))
            .route("/{id}", web::get().to(get_booking))
            .route("/{id}", web::delete().to(delete_booking))
            .route("/{id}/cancel", web::post().to(cancel_booking))
            .route("/{id}/mark-paid", web::post().to(mark_paid)),
    );
}
