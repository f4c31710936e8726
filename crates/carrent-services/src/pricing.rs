//! Pricing calculator
//!
//! Money is accumulated in full `Decimal` precision; rounding to cents happens
//! only when a breakdown is presented.

use crate::constants::{DEFAULT_CURRENCY, DEFAULT_INSURANCE_RATE, DEFAULT_TAX_RATE};
use carrent_core::config::BookingConfig;
use carrent_core::models::{DateRange, PricingBreakdown};
use rust_decimal::Decimal;

/// Price a rental of `total_days` days
///
/// - subtotal = daily_rate × total_days
/// - insurance = subtotal × insurance_rate
/// - tax = (subtotal + insurance) × tax_rate
/// - total = subtotal + insurance + tax
///
/// The inputs are not validated; zero days yields an all-zero breakdown.
pub fn compute(
    daily_rate: Decimal,
    total_days: i64,
    insurance_rate: Decimal,
    tax_rate: Decimal,
    currency: &str,
) -> PricingBreakdown {
    let subtotal = daily_rate * Decimal::from(total_days);
    let insurance_fee = subtotal * insurance_rate;
    let tax_amount = (subtotal + insurance_fee) * tax_rate;

    PricingBreakdown {
        daily_rate,
        total_days,
        subtotal,
        insurance_fee,
        tax_amount,
        total_amount: subtotal + insurance_fee + tax_amount,
        currency: currency.to_string(),
    }
}

/// Rates applied to every booking quote
#[derive(Debug, Clone, PartialEq)]
pub struct PricingPolicy {
    pub insurance_rate: Decimal,
    pub tax_rate: Decimal,
    pub currency: String,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            insurance_rate: DEFAULT_INSURANCE_RATE,
            tax_rate: DEFAULT_TAX_RATE,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

impl PricingPolicy {
    pub fn from_config(config: &BookingConfig) -> Self {
        Self {
            insurance_rate: config.insurance_rate_decimal(),
            tax_rate: config.tax_rate_decimal(),
            currency: config.currency.clone(),
        }
    }

    pub fn quote(&self, daily_rate: Decimal, range: &DateRange) -> PricingBreakdown {
        compute(
            daily_rate,
            range.total_days(),
            self.insurance_rate,
            self.tax_rate,
            &self.currency,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_three_days_at_one_hundred() {
        let p = compute(dec!(100), 3, dec!(0.10), dec!(0.08), "USD");
        assert_eq!(p.subtotal, dec!(300));
        assert_eq!(p.insurance_fee, dec!(30));
        assert_eq!(p.tax_amount, dec!(26.40));
        assert_eq!(p.total_amount, dec!(356.40));
    }

    #[test]
    fn test_zero_days_is_all_zero() {
        let p = compute(dec!(80), 0, dec!(0.10), dec!(0.08), "USD");
        assert_eq!(p.subtotal, Decimal::ZERO);
        assert_eq!(p.total_amount, Decimal::ZERO);
    }

    #[test]
    fn test_no_intermediate_rounding() {
        let p = compute(dec!(33.33), 1, dec!(0.10), dec!(0.08), "USD");
        // 33.33 * 1.1 * 1.08 = 39.59604
        assert_eq!(p.total_amount, dec!(39.59604));
        assert_eq!(p.rounded().total_amount, dec!(39.60));
    }

    #[test]
    fn test_policy_quote_counts_inclusive_days() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
        );
        let p = PricingPolicy::default().quote(dec!(50), &range);
        assert_eq!(p.total_days, 2);
        assert_eq!(p.subtotal, dec!(100));
        assert_eq!(p.total_amount, dec!(118.80));
        assert_eq!(p.currency, "USD");
    }

    #[test]
    fn test_policy_from_config() {
        let config = BookingConfig {
            insurance_rate: 0.15,
            tax_rate: 0.2,
            currency: "EUR".to_string(),
            ..Default::default()
        };
        let policy = PricingPolicy::from_config(&config);
        assert_eq!(policy.insurance_rate, dec!(0.15));
        assert_eq!(policy.tax_rate, dec!(0.2));
        assert_eq!(policy.currency, "EUR");
    }
}
