//! Unified error handling for the Carrent marketplace
//!
//! Every failure carries a stable error code, an HTTP status and a context map
//! so callers can react without parsing messages. Internal failures are logged
//! in full but reported to callers with a generic message.

use crate::models::{BookingStatus, UnavailableReason};
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::NaiveDate;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Booking Errors ====================
    #[error("Vehicle {vehicle_id} is not available for booking ({reason})")]
    VehicleUnavailable {
        vehicle_id: i64,
        reason: UnavailableReason,
    },

    #[error("Vehicle {vehicle_id} is already booked between {start_date} and {end_date}")]
    DateConflict {
        vehicle_id: i64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },

    #[error("Payment failed for booking {booking_id}: {message}")]
    PaymentFailed { booking_id: i64, message: String },

    #[error("Booking not found: {0}")]
    BookingNotFound(i64),

    #[error("Booking {booking_id} cannot move from {from} on {trigger}")]
    InvalidTransition {
        booking_id: i64,
        from: BookingStatus,
        trigger: String,
    },

    /// Raised by stores when the overlap exclusion constraint rejects an insert
    #[error("Overlapping booking rejected by store for vehicle {0}")]
    BookingOverlap(i64),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== External Service Errors ====================
    #[error("Notification queue error: {0}")]
    Queue(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::VehicleUnavailable { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::InvalidToken(_) | AppError::TokenExpired => StatusCode::UNAUTHORIZED,

            // 402 Payment Required
            AppError::PaymentFailed { .. } => StatusCode::PAYMENT_REQUIRED,

            // 403 Forbidden
            AppError::Forbidden | AppError::Unauthorized(_) => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::BookingNotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::DateConflict { .. } | AppError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }

            // 422 Unprocessable Entity
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::VehicleUnavailable { .. } => "vehicle_unavailable",
            AppError::DateConflict { .. } => "date_conflict",
            AppError::PaymentFailed { .. } => "payment_failed",
            AppError::BookingNotFound(_) => "booking_not_found",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::BookingOverlap(_) => "booking_overlap",
            AppError::Validation(_) => "validation_failed",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Queue(_) => "queue_error",
            AppError::Gateway(_) => "gateway_error",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Structured context attached to the error response
    pub fn context(&self) -> JsonValue {
        match self {
            AppError::VehicleUnavailable { vehicle_id, reason } => json!({
                "vehicle_id": vehicle_id,
                "reason": reason.as_str(),
            }),
            AppError::DateConflict {
                vehicle_id,
                start_date,
                end_date,
            } => json!({
                "vehicle_id": vehicle_id,
                "start_date": start_date,
                "end_date": end_date,
            }),
            AppError::PaymentFailed {
                booking_id,
                message,
            } => json!({
                "booking_id": booking_id,
                "gateway_message": message,
            }),
            AppError::BookingNotFound(id) => json!({ "booking_id": id }),
            AppError::InvalidTransition {
                booking_id,
                from,
                trigger,
            } => json!({
                "booking_id": booking_id,
                "from": from.as_str(),
                "trigger": trigger,
            }),
            _ => json!({}),
        }
    }

    /// Whether the message may be shown to API callers
    ///
    /// Server-side failures may carry SQL or connection details.
    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Message safe to return to callers
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if self.is_internal() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        }

        let body = json!({
            "error": self.error_code(),
            "message": self.public_message(),
            "status": status.as_u16(),
            "context": self.context(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
