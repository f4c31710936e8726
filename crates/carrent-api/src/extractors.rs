//! Extractor configuration
//!
//! Bodies and query strings that fail to deserialize are reported as
//! `validation_failed` (422) with the standard error body. The serde message
//! is logged, not returned.

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{web, HttpRequest};
use carrent_core::AppError;
use tracing::debug;

/// JSON body limit for booking requests
const JSON_LIMIT_BYTES: usize = 64 * 1024;

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT_BYTES)
        .error_handler(json_error)
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(query_error)
}

fn json_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!(path = %req.path(), error = %err, "Rejected request body");

    let message = match &err {
        JsonPayloadError::Deserialize(e) if e.is_data() => {
            "Request body has an invalid field value (dates are YYYY-MM-DD calendar days)"
        }
        JsonPayloadError::Deserialize(_) => "Request body is not valid JSON",
        JsonPayloadError::ContentType => "Request body must be application/json",
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            "Request body is too large"
        }
        _ => "Request body could not be read",
    };

    AppError::Validation(message.to_string()).into()
}

fn query_error(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!(path = %req.path(), error = %err, "Rejected query string");
    AppError::Validation("Query parameters are malformed (dates are YYYY-MM-DD calendar days)".to_string())
        .into()
}
