//! Payment records
//!
//! One row per charge attempt or manual settlement. Payment rows are never
//! deleted, even when the booking they belong to is soft-deleted.

use super::PaymentMethod;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Outcome recorded on a payment row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    /// Charge captured (or manual settlement recorded)
    Succeeded,
    /// Charge declined, errored or timed out
    Failed,
    /// Charge returned to the payer
    Refunded,
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Succeeded => "succeeded",
            ChargeStatus::Failed => "failed",
            ChargeStatus::Refunded => "refunded",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "succeeded" => Some(ChargeStatus::Succeeded),
            "failed" => Some(ChargeStatus::Failed),
            "refunded" => Some(ChargeStatus::Refunded),
            _ => None,
        }
    }
}

/// Payment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,

    pub booking_id: i64,

    pub amount: Decimal,

    pub method: PaymentMethod,

    pub status: ChargeStatus,

    /// Gateway transaction reference, used for reconciliation and refunds
    pub transaction_reference: Option<String>,

    /// Raw gateway response, stored as returned
    pub gateway_response: Option<JsonValue>,

    pub processed_at: Option<DateTime<Utc>>,

    pub refunded_at: Option<DateTime<Utc>>,

    pub refund_amount: Option<Decimal>,

    pub created_at: DateTime<Utc>,
}

/// Payment row to insert
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: i64,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: ChargeStatus,
    pub transaction_reference: Option<String>,
    pub gateway_response: Option<JsonValue>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl NewPayment {
    pub fn into_payment(self, id: i64, now: DateTime<Utc>) -> Payment {
        Payment {
            id,
            booking_id: self.booking_id,
            amount: self.amount,
            method: self.method,
            status: self.status,
            transaction_reference: self.transaction_reference,
            gateway_response: self.gateway_response,
            processed_at: self.processed_at,
            refunded_at: None,
            refund_amount: None,
            created_at: now,
        }
    }
}
