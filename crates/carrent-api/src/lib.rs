//! API layer for the Carrent booking core
//!
//! Handlers expect `web::Data<BookingService>`, `web::Data<AvailabilityChecker>`
//! and `web::Data<JwtService>` registered on the app.

#![forbid(unsafe_code)]

pub mod dto;
pub mod extractors;
pub mod handlers;

use actix_web::web;

pub use dto::{ActionResponse, PageQuery};
pub use handlers::{configure_availability, configure_bookings, health_check};

/// Mount every route under `/api/v1`
///
/// Also installs the JSON and query extractor configs for the scope.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .app_data(extractors::json_config())
            .app_data(extractors::query_config())
            .route("/health", web::get().to(health_check))
            .configure(configure_bookings)
            .configure(configure_availability),
    );
}
