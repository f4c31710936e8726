//! Booking DTOs
//!
//! Request and response types for booking and availability endpoints.

use carrent_core::models::{Booking, BookingStatus, PaymentMethod, PaymentStatus, PricingBreakdown};
use carrent_core::AppError;
use carrent_services::{BookingReceipt, CreateBookingCommand};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Booking creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(range(min = 1, message = "vehicle_id must be positive"))]
    pub vehicle_id: i64,

    /// First rental day (ISO 8601 date)
    pub start_date: NaiveDate,

    /// Last rental day (ISO 8601 date)
    pub end_date: NaiveDate,

    #[validate(length(min = 1, max = 32, message = "payment_method is required"))]
    pub payment_method: String,

    /// Gateway token, required for card and wallet methods
    #[validate(length(max = 255))]
    pub payment_method_ref: Option<String>,

    #[validate(length(max = 255))]
    pub pickup_location: Option<String>,

    #[validate(length(max = 255))]
    pub dropoff_location: Option<String>,

    #[validate(length(max = 1000, message = "special_requests must be at most 1000 characters"))]
    pub special_requests: Option<String>,
}

impl CreateBookingRequest {
    pub fn into_command(self) -> Result<CreateBookingCommand, AppError> {
        let payment_method = PaymentMethod::from_str(&self.payment_method).ok_or_else(|| {
            AppError::Validation(format!("Unknown payment method '{}'", self.payment_method))
        })?;

        Ok(CreateBookingCommand {
            vehicle_id: self.vehicle_id,
            start_date: self.start_date,
            end_date: self.end_date,
            payment_method,
            payment_method_ref: self.payment_method_ref,
            pickup_location: self.pickup_location,
            dropoff_location: self.dropoff_location,
            special_requests: self.special_requests,
        })
    }
}

/// Manual settlement request; every field is optional
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MarkPaidRequest {
    /// Receipt or transfer reference
    #[validate(length(max = 255))]
    pub reference: Option<String>,
}

/// Booking response
#[derive(Debug, Clone, Serialize)]
pub struct BookingResponse {
    pub id: i64,
    pub vehicle_id: i64,
    pub renter_id: i64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub currency: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i64,
    pub pickup_location: String,
    pub dropoff_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    /// Itemized price, present on creation only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingBreakdown>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingResponse {
    pub fn new(booking: Booking, currency: &str) -> Self {
        let total_days = booking.range().total_days();
        Self {
            id: booking.id,
            vehicle_id: booking.vehicle_id,
            renter_id: booking.renter_id,
            status: booking.status,
            payment_status: booking.payment_status,
            payment_method: booking.payment_method,
            total_amount: booking.total_amount.round_dp(2),
            currency: currency.to_string(),
            start_date: booking.start_date,
            end_date: booking.end_date,
            total_days,
            pickup_location: booking.pickup_location,
            dropoff_location: booking.dropoff_location,
            special_requests: booking.special_requests,
            pricing: None,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

impl From<BookingReceipt> for BookingResponse {
    fn from(receipt: BookingReceipt) -> Self {
        let pricing = receipt.pricing.rounded();
        let mut response = Self::new(receipt.booking, &pricing.currency);
        response.pricing = Some(pricing);
        response
    }
}

/// Availability query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Availability response
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub vehicle_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(method: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            vehicle_id: 1,
            start_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            payment_method: method.to_string(),
            payment_method_ref: None,
            pickup_location: None,
            dropoff_location: None,
            special_requests: None,
        }
    }

    #[test]
    fn test_special_requests_length_validated() {
        let mut req = request("cash");
        assert!(req.validate().is_ok());

        req.special_requests = Some("a".repeat(1001));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_payment_method_parsed() {
        let command = request("Apple_Pay").into_command().unwrap();
        assert_eq!(command.payment_method, PaymentMethod::ApplePay);

        let err = request("cheque").into_command().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_response_rounds_amounts() {
        let booking = carrent_core::models::NewBooking {
            renter_id: 3,
            vehicle_id: 1,
            range: carrent_core::models::DateRange::new(
                NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            ),
            total_amount: dec!(356.4000),
            status: BookingStatus::Confirmed,
            payment_method: PaymentMethod::Visa,
            payment_status: PaymentStatus::Paid,
            pickup_location: "Depot".to_string(),
            dropoff_location: "Depot".to_string(),
            special_requests: None,
        }
        .into_booking(8, Utc::now());

        let json = serde_json::to_value(BookingResponse::new(booking, "USD")).unwrap();
        assert_eq!(json["total_amount"], "356.40");
        assert_eq!(json["total_days"], 3);
        assert_eq!(json["status"], "confirmed");
        assert!(json.get("pricing").is_none());
    }
}
