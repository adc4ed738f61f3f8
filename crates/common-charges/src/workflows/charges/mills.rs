//! Proportional distribution with exact reconciliation to the cent.
//!
//! Every share is first truncated (floored) to the cent; the residual cents are then
//! handed out one at a time to the recipients with the largest fractional remainder,
//! ties going to the lowest apartment id. Remainders are compared as exact integer
//! numerators so the ranking never depends on floating point or iteration order.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::domain::{Apartment, ApartmentId};
use super::money::{from_cents, to_cents};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DistributionError {
    #[error("weights sum to zero; no apartment can be charged")]
    ZeroWeights,
    #[error("apartment {0} has a negative weight")]
    NegativeWeight(ApartmentId),
    #[error("amount or weights exceed the supported precision")]
    Overflow,
}

/// Per-apartment result of one distribution, in cents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CentShares {
    shares: BTreeMap<ApartmentId, i64>,
}

impl CentShares {
    pub fn get(&self, apartment_id: ApartmentId) -> i64 {
        self.shares.get(&apartment_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.shares.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ApartmentId, i64)> + '_ {
        self.shares.iter().map(|(id, cents)| (*id, *cents))
    }

    pub fn to_amounts(&self) -> BTreeMap<ApartmentId, Decimal> {
        self.iter().map(|(id, cents)| (id, from_cents(cents))).collect()
    }

    pub(crate) fn zeroed<I>(apartments: I) -> Self
    where
        I: IntoIterator<Item = ApartmentId>,
    {
        Self {
            shares: apartments.into_iter().map(|id| (id, 0)).collect(),
        }
    }
}

/// Splits `total_cents` across `weights` proportionally, reconciling exactly.
///
/// Duplicate apartment ids have their weights summed.
pub fn distribute_by_weight<I>(total_cents: i64, weights: I) -> Result<CentShares, DistributionError>
where
    I: IntoIterator<Item = (ApartmentId, Decimal)>,
{
    let mut merged: BTreeMap<ApartmentId, Decimal> = BTreeMap::new();
    for (id, weight) in weights {
        if weight.is_sign_negative() && !weight.is_zero() {
            return Err(DistributionError::NegativeWeight(id));
        }
        let entry = merged.entry(id).or_insert(Decimal::ZERO);
        *entry = entry
            .checked_add(weight)
            .ok_or(DistributionError::Overflow)?;
    }

    let weights = integral_weights(&merged)?;
    let weight_total = weights
        .values()
        .try_fold(0i128, |acc, weight| acc.checked_add(*weight))
        .ok_or(DistributionError::Overflow)?;
    if weight_total == 0 {
        return Err(DistributionError::ZeroWeights);
    }

    if total_cents == 0 {
        return Ok(CentShares::zeroed(weights.keys().copied()));
    }

    let total = i128::from(total_cents);
    let mut shares = BTreeMap::new();
    let mut remainders = Vec::with_capacity(weights.len());
    for (id, weight) in &weights {
        let numerator = total
            .checked_mul(*weight)
            .ok_or(DistributionError::Overflow)?;
        let floor = numerator.div_euclid(weight_total);
        let remainder = numerator.rem_euclid(weight_total);
        let floor = i64::try_from(floor).map_err(|_| DistributionError::Overflow)?;
        shares.insert(*id, floor);
        remainders.push((*id, remainder));
    }

    let allocated: i64 = shares.values().sum();
    let residual = usize::try_from(total_cents - allocated).map_err(|_| DistributionError::Overflow)?;

    remainders.sort_by(|(left_id, left), (right_id, right)| {
        right.cmp(left).then_with(|| left_id.cmp(right_id))
    });
    for (id, _) in remainders.iter().take(residual) {
        if let Some(share) = shares.get_mut(id) {
            *share += 1;
        }
    }

    let distributed = CentShares { shares };
    debug_assert_eq!(distributed.total(), total_cents);
    Ok(distributed)
}

/// Splits `total_cents` by participation mills.
pub fn distribute_by_mills<I>(total_cents: i64, mills: I) -> Result<CentShares, DistributionError>
where
    I: IntoIterator<Item = (ApartmentId, u32)>,
{
    distribute_by_weight(
        total_cents,
        mills
            .into_iter()
            .map(|(id, mills)| (id, Decimal::from(mills))),
    )
}

/// Decimal-facing entry point: rounds `total_amount` to the cent and splits it over the
/// active apartments by their mills.
pub fn distribute(
    total_amount: Decimal,
    apartments: &[Apartment],
) -> Result<BTreeMap<ApartmentId, Decimal>, DistributionError> {
    let total_cents = to_cents(total_amount).ok_or(DistributionError::Overflow)?;
    let weights = apartments
        .iter()
        .filter(|apartment| apartment.active)
        .map(|apartment| {
            (
                apartment.apartment_id,
                Decimal::from(apartment.participation_mills),
            )
        });
    Ok(distribute_by_weight(total_cents, weights)?.to_amounts())
}

/// Rescales decimal weights to integers sharing one scale, keeping ratios exact.
fn integral_weights(
    weights: &BTreeMap<ApartmentId, Decimal>,
) -> Result<BTreeMap<ApartmentId, i128>, DistributionError> {
    let scale = weights
        .values()
        .map(|weight| weight.normalize().scale())
        .max()
        .unwrap_or(0);

    weights
        .iter()
        .map(|(id, weight)| {
            let weight = weight.normalize();
            let factor = 10i128
                .checked_pow(scale - weight.scale())
                .ok_or(DistributionError::Overflow)?;
            weight
                .mantissa()
                .checked_mul(factor)
                .map(|value| (*id, value))
                .ok_or(DistributionError::Overflow)
        })
        .collect()
}
