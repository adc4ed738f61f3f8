use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds an amount to the cent (half-to-even) and returns it as integer cents.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    amount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_i64()
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// `cents * numerator / denominator`, rounded half-to-even to the cent.
pub(crate) fn scale_cents(cents: i64, numerator: i64, denominator: i64) -> Option<i64> {
    if denominator == 0 {
        return None;
    }
    let scaled = Decimal::from(cents).checked_mul(Decimal::from(numerator))?
        / Decimal::from(denominator);
    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
}
