//! Vehicle availability handler

use crate::dto::{AvailabilityQuery, AvailabilityResponse};
use actix_web::{web, HttpResponse};
use carrent_core::AppError;
use carrent_services::AvailabilityChecker;
use tracing::{debug, instrument};

/// Whether a vehicle can be booked for an inclusive date range
///
/// GET /api/v1/vehicles/{id}/availability?start_date=2025-06-01&end_date=2025-06-03
#[instrument(skip(checker))]
pub async fn check_availability(
    checker: web::Data<AvailabilityChecker>,
    path: web::Path<i64>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, AppError> {
    let vehicle_id = path.into_inner();
    if query.end_date < query.start_date {
        return Err(AppError::Validation(
            "end_date must not be before start_date".to_string(),
        ));
    }

    let available = checker
        .is_available(vehicle_id, query.start_date, query.end_date)
        .await?;
    debug!(vehicle_id, available, "Availability checked");

    Ok(HttpResponse::Ok().json(AvailabilityResponse {
        vehicle_id,
        start_date: query.start_date,
        end_date: query.end_date,
        available,
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/vehicles/{id}/availability",
        web::get().to(check_availability),
    );
}
