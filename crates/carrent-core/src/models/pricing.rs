//! Pricing breakdown
//!
//! Computed fresh for every booking attempt and never persisted; the booking
//! stores only the grand total.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Itemized booking price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub daily_rate: Decimal,
    pub total_days: i64,
    pub subtotal: Decimal,
    pub insurance_fee: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    /// ISO 4217 currency code
    pub currency: String,
}

impl PricingBreakdown {
    /// Copy of the breakdown rounded to cents, for presentation only
    pub fn rounded(&self) -> Self {
        Self {
            daily_rate: self.daily_rate.round_dp(2),
            total_days: self.total_days,
            subtotal: self.subtotal.round_dp(2),
            insurance_fee: self.insurance_fee.round_dp(2),
            tax_amount: self.tax_amount.round_dp(2),
            total_amount: self.total_amount.round_dp(2),
            currency: self.currency.clone(),
        }
    }
}
