//! Row mappings shared by the repositories and the unit of work

use carrent_core::models::{
    Booking, BookingStatus, ChargeStatus, Payment, PaymentMethod, PaymentStatus, Vehicle,
    VehicleStatus,
};
use carrent_core::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

pub(crate) const VEHICLE_COLUMNS: &str = r#"
    id, owner_id, make, model, daily_rate, is_available,
    status, insurance_expiry, location
"#;

pub(crate) const BOOKING_COLUMNS: &str = r#"
    id, renter_id, vehicle_id, start_date, end_date, total_amount,
    status, payment_method, payment_status,
    pickup_location, dropoff_location, special_requests,
    deleted_at, created_at, updated_at
"#;

pub(crate) const PAYMENT_COLUMNS: &str = r#"
    id, booking_id, amount, method, status, transaction_reference,
    gateway_response, processed_at, refunded_at, refund_amount, created_at
"#;

fn unknown(column: &str, value: &str) -> AppError {
    AppError::Database(format!("Unknown {} value in database: {}", column, value))
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct VehicleRow {
    id: i64,
    owner_id: i64,
    make: String,
    model: String,
    daily_rate: Decimal,
    is_available: bool,
    status: String,
    insurance_expiry: Option<NaiveDate>,
    location: String,
}

impl TryFrom<VehicleRow> for Vehicle {
    type Error = AppError;

    fn try_from(row: VehicleRow) -> Result<Self, Self::Error> {
        let status =
            VehicleStatus::from_str(&row.status).ok_or_else(|| unknown("vehicle status", &row.status))?;
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            make: row.make,
            model: row.model,
            daily_rate: row.daily_rate,
            is_available: row.is_available,
            status,
            insurance_expiry: row.insurance_expiry,
            location: row.location,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: i64,
    renter_id: i64,
    vehicle_id: i64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_amount: Decimal,
    status: String,
    payment_method: String,
    payment_status: String,
    pickup_location: String,
    dropoff_location: String,
    special_requests: Option<String>,
    deleted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = AppError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::from_str(&row.status)
            .ok_or_else(|| unknown("booking status", &row.status))?;
        let payment_method = PaymentMethod::from_str(&row.payment_method)
            .ok_or_else(|| unknown("payment method", &row.payment_method))?;
        let payment_status = PaymentStatus::from_str(&row.payment_status)
            .ok_or_else(|| unknown("payment status", &row.payment_status))?;

        Ok(Self {
            id: row.id,
            renter_id: row.renter_id,
            vehicle_id: row.vehicle_id,
            start_date: row.start_date,
            end_date: row.end_date,
            total_amount: row.total_amount,
            status,
            payment_method,
            payment_status,
            pickup_location: row.pickup_location,
            dropoff_location: row.dropoff_location,
            special_requests: row.special_requests,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PaymentRow {
    id: i64,
    booking_id: i64,
    amount: Decimal,
    method: String,
    status: String,
    transaction_reference: Option<String>,
    gateway_response: Option<JsonValue>,
    processed_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    refund_amount: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let method =
            PaymentMethod::from_str(&row.method).ok_or_else(|| unknown("payment method", &row.method))?;
        let status =
            ChargeStatus::from_str(&row.status).ok_or_else(|| unknown("charge status", &row.status))?;

        Ok(Self {
            id: row.id,
            booking_id: row.booking_id,
            amount: row.amount,
            method,
            status,
            transaction_reference: row.transaction_reference,
            gateway_response: row.gateway_response,
            processed_at: row.processed_at,
            refunded_at: row.refunded_at,
            refund_amount: row.refund_amount,
            created_at: row.created_at,
        })
    }
}

/// Convert a batch of rows, failing on the first unmappable one
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}
