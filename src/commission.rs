//! Commission calculation.

use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};
use crate::money::Money;

/// Effective commission percentage: per-plan base rate plus tier bonus.
pub fn effective_rate(base_rate: Decimal, tier_bonus: Decimal) -> Decimal {
    base_rate + tier_bonus
}

/// Commission owed on a sale: `sale_amount * (base_rate + tier_bonus) / 100`,
/// rounded half-up to minor units.
///
/// Rates are percentages. The tier bonus is the one in force at sale time;
/// callers capture the result and never revalue it later.
pub fn commission(sale_amount: Money, base_rate: Decimal, tier_bonus: Decimal) -> Result<Money> {
    let rate = effective_rate(base_rate, tier_bonus);
    if rate.is_sign_negative() {
        return Err(LedgerError::InvalidArgument(format!(
            "negative commission rate: {rate}"
        )));
    }

    let raw = sale_amount
        .to_decimal()
        .checked_mul(rate)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| {
            LedgerError::InvalidArgument(format!("commission overflow: {sale_amount} at {rate}%"))
        })?;

    Money::from_decimal(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    #[test]
    fn test_base_plus_bonus() {
        let amount = Money::from_cents(15000);
        assert_eq!(
            commission(amount, pct(25), pct(5)).unwrap(),
            Money::from_cents(4500)
        );
    }

    #[test]
    fn test_intermediate_plan_sale() {
        let amount = Money::from_cents(23900);
        assert_eq!(
            commission(amount, pct(20), pct(5)).unwrap(),
            Money::from_cents(5975)
        );
    }

    #[test]
    fn test_rounds_half_up_at_midpoint() {
        // 0.10 * 25% = 0.025
        assert_eq!(
            commission(Money::from_cents(10), pct(25), Decimal::ZERO).unwrap(),
            Money::from_cents(3)
        );
        // 10.05 * 5% = 0.5025
        assert_eq!(
            commission(Money::from_cents(1005), pct(5), Decimal::ZERO).unwrap(),
            Money::from_cents(50)
        );
    }

    #[test]
    fn test_fractional_rates() {
        // 119.00 * 12.5% = 14.875
        let rate = Decimal::new(125, 1);
        assert_eq!(
            commission(Money::from_cents(11900), rate, Decimal::ZERO).unwrap(),
            Money::from_cents(1488)
        );
    }

    #[test]
    fn test_zero_rate_earns_nothing() {
        assert_eq!(
            commission(Money::from_cents(23900), Decimal::ZERO, Decimal::ZERO).unwrap(),
            Money::ZERO
        );
    }

    #[test]
    fn test_negative_rate_rejected() {
        let err = commission(Money::from_cents(100), pct(-10), pct(5)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument(_)));
    }
}
