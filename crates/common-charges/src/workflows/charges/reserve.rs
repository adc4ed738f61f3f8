//! Reserve fund amortization.
//!
//! A building either amortizes a goal over a fixed number of months or collects a
//! flat per-period figure. Both produce one per-period target that is then split by
//! mills, so the two modes share the same proportionality guarantees.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::domain::{AllocationError, Apartment, ApartmentId, Building};
use super::mills::distribute_by_mills;
use super::money::{from_cents, to_cents};
use super::participation::ParticipationRoster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveFundPolicy {
    Amortized { goal: Decimal, duration_months: u32 },
    Flat { per_period: Decimal },
}

impl ReserveFundPolicy {
    pub fn from_building(building: &Building) -> Result<Self, AllocationError> {
        let id = building.building_id;
        match (building.reserve_fund_goal, building.reserve_fund_duration_months) {
            (Some(goal), Some(months)) => {
                if goal <= Decimal::ZERO {
                    return Err(AllocationError::configuration(
                        id,
                        "reserve_fund_goal",
                        format!("{goal} must be positive"),
                    ));
                }
                let duration_months = u32::try_from(months)
                    .ok()
                    .filter(|months| *months > 0)
                    .ok_or_else(|| {
                        AllocationError::configuration(
                            id,
                            "reserve_fund_duration_months",
                            format!("{months} must be a positive number of months"),
                        )
                    })?;
                Ok(Self::Amortized {
                    goal,
                    duration_months,
                })
            }
            (Some(_), None) => Err(AllocationError::configuration(
                id,
                "reserve_fund_duration_months",
                "a reserve fund goal needs a duration",
            )),
            (None, Some(_)) => Err(AllocationError::configuration(
                id,
                "reserve_fund_goal",
                "a reserve fund duration needs a goal",
            )),
            (None, None) => {
                let per_period = building
                    .reserve_contribution_per_apartment
                    .unwrap_or(Decimal::ZERO);
                if per_period.is_sign_negative() && !per_period.is_zero() {
                    return Err(AllocationError::configuration(
                        id,
                        "reserve_contribution_per_apartment",
                        format!("{per_period} must not be negative"),
                    ));
                }
                Ok(Self::Flat { per_period })
            }
        }
    }

    /// Per-period target amount, rounded half-to-even to the cent.
    pub fn monthly_target(&self) -> Decimal {
        match self {
            Self::Amortized {
                goal,
                duration_months,
            } => (*goal / Decimal::from(*duration_months))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
            Self::Flat { per_period } => {
                per_period.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
            }
        }
    }

    pub const fn mode(&self) -> ReserveFundMode {
        match self {
            Self::Amortized { .. } => ReserveFundMode::Amortized,
            Self::Flat { .. } => ReserveFundMode::Flat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveFundMode {
    Amortized,
    Flat,
}

/// Whether the ledger lets this period's reserve contribution be collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveCollection {
    #[default]
    Collected,
    /// Collection paused because of outstanding delinquency.
    Suspended,
}

/// Read model of a building's reserve fund plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReserveSchedule {
    pub mode: ReserveFundMode,
    pub monthly_target: Decimal,
    pub per_mill: Decimal,
    pub mills_total: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_months: Option<u32>,
}

impl ReserveSchedule {
    pub fn new(policy: &ReserveFundPolicy, roster: &ParticipationRoster) -> Self {
        let monthly_target = policy.monthly_target();
        let per_mill = (monthly_target / Decimal::from(roster.mills_total()))
            .round_dp_with_strategy(4, RoundingStrategy::MidpointNearestEven);
        let (goal, duration_months) = match policy {
            ReserveFundPolicy::Amortized {
                goal,
                duration_months,
            } => (Some(*goal), Some(*duration_months)),
            ReserveFundPolicy::Flat { .. } => (None, None),
        };
        Self {
            mode: policy.mode(),
            monthly_target,
            per_mill,
            mills_total: roster.mills_total(),
            goal,
            duration_months,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReserveAllocation {
    pub status: ReserveCollection,
    pub target_cents: i64,
    pub shares: BTreeMap<ApartmentId, i64>,
}

impl ReserveAllocation {
    pub fn contribution_cents(&self, apartment_id: ApartmentId) -> i64 {
        self.shares.get(&apartment_id).copied().unwrap_or(0)
    }
}

pub fn allocate_reserve(
    policy: &ReserveFundPolicy,
    roster: &ParticipationRoster,
    collection: ReserveCollection,
) -> Result<ReserveAllocation, AllocationError> {
    let target_cents = match collection {
        ReserveCollection::Suspended => 0,
        ReserveCollection::Collected => to_cents(policy.monthly_target()).ok_or_else(|| {
            AllocationError::configuration(
                roster.building_id(),
                "reserve_fund_goal",
                "reserve target out of range",
            )
        })?,
    };

    let shares = distribute_by_mills(target_cents, roster.mills()).map_err(|err| {
        AllocationError::configuration(roster.building_id(), "participation_mills", err.to_string())
    })?;

    Ok(ReserveAllocation {
        status: collection,
        target_cents,
        shares: shares.iter().collect(),
    })
}

/// The building's per-period reserve target.
pub fn monthly_reserve_target(building: &Building) -> Result<Decimal, AllocationError> {
    Ok(ReserveFundPolicy::from_building(building)?.monthly_target())
}

/// One apartment's contribution, normalized against the live mills of `apartments`.
pub fn contribution(
    building: &Building,
    apartment_id: ApartmentId,
    apartments: &[Apartment],
) -> Result<Decimal, AllocationError> {
    let policy = ReserveFundPolicy::from_building(building)?;
    let roster = ParticipationRoster::from_apartments(building.building_id, apartments)?;
    let allocation = allocate_reserve(&policy, &roster, ReserveCollection::Collected)?;
    Ok(from_cents(allocation.contribution_cents(apartment_id)))
}
