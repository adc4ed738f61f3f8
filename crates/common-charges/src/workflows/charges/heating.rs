//! Heating cost distribution under the building's heating policy.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{
    AllocationError, ApartmentId, Building, BuildingId, HeatingSystem, MeterReading, Period,
};
use super::mills::{distribute_by_mills, distribute_by_weight, CentShares, DistributionError};
use super::money::{from_cents, scale_cents};
use super::participation::ParticipationRoster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterKind {
    HourMeters,
    HeatMeters,
}

impl MeterKind {
    pub const fn unit_label(self) -> &'static str {
        match self {
            Self::HourMeters => "hours",
            Self::HeatMeters => "heat_units",
        }
    }
}

/// Validated heating configuration; one computation path per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatingPolicy {
    None,
    Conventional,
    Metered { meter: MeterKind, fixed_percentage: u8 },
}

impl HeatingPolicy {
    pub fn from_building(building: &Building) -> Result<Self, AllocationError> {
        let meter = match building.heating_system {
            HeatingSystem::None => return Ok(Self::None),
            HeatingSystem::Conventional => return Ok(Self::Conventional),
            HeatingSystem::HourMeters => MeterKind::HourMeters,
            HeatingSystem::HeatMeters => MeterKind::HeatMeters,
        };

        let percentage = building.heating_fixed_percentage.ok_or_else(|| {
            AllocationError::configuration(
                building.building_id,
                "heating_fixed_percentage",
                format!(
                    "required for heating system {}",
                    building.heating_system.label()
                ),
            )
        })?;
        let fixed_percentage = u8::try_from(percentage)
            .ok()
            .filter(|value| *value <= 100)
            .ok_or_else(|| {
                AllocationError::configuration(
                    building.building_id,
                    "heating_fixed_percentage",
                    format!("{percentage} is outside 0..=100"),
                )
            })?;

        Ok(Self::Metered {
            meter,
            fixed_percentage,
        })
    }

    pub const fn system(self) -> HeatingSystem {
        match self {
            Self::None => HeatingSystem::None,
            Self::Conventional => HeatingSystem::Conventional,
            Self::Metered {
                meter: MeterKind::HourMeters,
                ..
            } => HeatingSystem::HourMeters,
            Self::Metered {
                meter: MeterKind::HeatMeters,
                ..
            } => HeatingSystem::HeatMeters,
        }
    }

    pub const fn fixed_percentage(self) -> Option<u8> {
        match self {
            Self::Metered {
                fixed_percentage, ..
            } => Some(fixed_percentage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeatingShare {
    pub fixed_cents: i64,
    pub variable_cents: i64,
}

impl HeatingShare {
    pub fn total_cents(&self) -> i64 {
        self.fixed_cents + self.variable_cents
    }

    pub fn fixed(&self) -> Decimal {
        from_cents(self.fixed_cents)
    }

    pub fn variable(&self) -> Decimal {
        from_cents(self.variable_cents)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatingAllocation {
    pub policy: HeatingPolicy,
    pub fixed_total_cents: i64,
    pub variable_total_cents: i64,
    /// Variable pool withheld while readings are outstanding and the read consumption is zero.
    pub unallocated_variable_cents: i64,
    pub shares: BTreeMap<ApartmentId, HeatingShare>,
    pub consumption: BTreeMap<ApartmentId, Decimal>,
    pub missing_readings: Vec<ApartmentId>,
}

impl HeatingAllocation {
    pub fn share(&self, apartment_id: ApartmentId) -> HeatingShare {
        self.shares.get(&apartment_id).copied().unwrap_or_default()
    }

    fn zeroed(policy: HeatingPolicy, roster: &ParticipationRoster) -> Self {
        Self {
            policy,
            fixed_total_cents: 0,
            variable_total_cents: 0,
            unallocated_variable_cents: 0,
            shares: roster.ids().map(|id| (id, HeatingShare::default())).collect(),
            consumption: BTreeMap::new(),
            missing_readings: Vec::new(),
        }
    }
}

pub fn distribute_heating(
    heating_total_cents: i64,
    policy: HeatingPolicy,
    roster: &ParticipationRoster,
    period: &Period,
    readings: &[MeterReading],
) -> Result<HeatingAllocation, AllocationError> {
    let building_id = roster.building_id();
    let mut allocation = HeatingAllocation::zeroed(policy, roster);

    match policy {
        HeatingPolicy::None => {
            if heating_total_cents != 0 {
                return Err(AllocationError::configuration(
                    building_id,
                    "heating_system",
                    format!(
                        "heating expenses of {} recorded for a building without heating",
                        from_cents(heating_total_cents)
                    ),
                ));
            }
            Ok(allocation)
        }
        HeatingPolicy::Conventional => {
            let fixed = fixed_by_mills(building_id, heating_total_cents, roster)?;
            allocation.fixed_total_cents = heating_total_cents;
            for (id, cents) in fixed.iter() {
                allocation.shares.entry(id).or_default().fixed_cents = cents;
            }
            Ok(allocation)
        }
        HeatingPolicy::Metered {
            fixed_percentage, ..
        } => {
            let fixed_total = scale_cents(heating_total_cents, i64::from(fixed_percentage), 100)
                .ok_or_else(|| {
                    AllocationError::input_range("heating_expense_total", "amount out of range")
                })?;
            let variable_total = heating_total_cents - fixed_total;
            allocation.fixed_total_cents = fixed_total;
            allocation.variable_total_cents = variable_total;

            let fixed = fixed_by_mills(building_id, fixed_total, roster)?;
            for (id, cents) in fixed.iter() {
                allocation.shares.entry(id).or_default().fixed_cents = cents;
            }

            if variable_total == 0 {
                return Ok(allocation);
            }

            let consumption = consumption_by_apartment(roster, period, readings)?;
            allocation.missing_readings = roster
                .heating_participants()
                .map(|p| p.apartment_id)
                .filter(|id| !consumption.contains_key(id))
                .collect();

            // A zero read sum with readings still outstanding stays withheld until they arrive.
            let read_total: Decimal = consumption.values().copied().sum();
            if read_total.is_zero() && !allocation.missing_readings.is_empty() {
                allocation.unallocated_variable_cents = variable_total;
                allocation.consumption = consumption;
                return Ok(allocation);
            }

            let variable = distribute_by_weight(
                variable_total,
                consumption.iter().map(|(id, units)| (*id, *units)),
            )
            .map_err(|err| distribution_error(building_id, "meter_readings", err))?;
            for (id, cents) in variable.iter() {
                allocation.shares.entry(id).or_default().variable_cents = cents;
            }
            allocation.consumption = consumption;
            Ok(allocation)
        }
    }
}

fn fixed_by_mills(
    building_id: BuildingId,
    total_cents: i64,
    roster: &ParticipationRoster,
) -> Result<CentShares, AllocationError> {
    if total_cents == 0 {
        return Ok(CentShares::zeroed(
            roster.heating_participants().map(|p| p.apartment_id),
        ));
    }
    distribute_by_mills(total_cents, roster.heating_mills())
        .map_err(|err| distribution_error(building_id, "heating_eligible", err))
}

/// Sums the period's readings per heating-eligible apartment.
fn consumption_by_apartment(
    roster: &ParticipationRoster,
    period: &Period,
    readings: &[MeterReading],
) -> Result<BTreeMap<ApartmentId, Decimal>, AllocationError> {
    let mut consumption = BTreeMap::new();
    for reading in readings {
        if reading.building_id != roster.building_id() || !period.contains(reading.date) {
            continue;
        }
        if reading.units.is_sign_negative() && !reading.units.is_zero() {
            return Err(AllocationError::input_range(
                format!("meter_readings[{}].units", reading.apartment_id),
                format!("{} recorded on {} is negative", reading.units, reading.date),
            ));
        }
        let eligible = roster
            .get(reading.apartment_id)
            .map(|p| p.heating_eligible)
            .unwrap_or(false);
        if eligible {
            *consumption
                .entry(reading.apartment_id)
                .or_insert(Decimal::ZERO) += reading.units;
        }
    }
    Ok(consumption)
}

fn distribution_error(
    building_id: BuildingId,
    field: &'static str,
    err: DistributionError,
) -> AllocationError {
    let reason = match (err, field) {
        (DistributionError::ZeroWeights, "meter_readings") => {
            "recorded consumption is zero but a variable heating cost exists".to_string()
        }
        (DistributionError::ZeroWeights, _) => {
            "heating-eligible apartments have a zero mills sum".to_string()
        }
        (other, _) => other.to_string(),
    };
    AllocationError::configuration(building_id, field, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::charges::domain::{Apartment, ManagementFeeSplit};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn building(system: HeatingSystem, percentage: Option<i32>) -> Building {
        Building {
            building_id: BuildingId(1),
            name: "Test".to_string(),
            heating_system: system,
            heating_fixed_percentage: percentage,
            reserve_fund_goal: None,
            reserve_fund_duration_months: None,
            reserve_contribution_per_apartment: None,
            management_fee_split: ManagementFeeSplit::Equal,
        }
    }

    fn roster(mills: &[(u64, i32)]) -> ParticipationRoster {
        let apartments: Vec<_> = mills
            .iter()
            .map(|(id, mills)| Apartment {
                apartment_id: ApartmentId(*id),
                building_id: BuildingId(1),
                number: format!("{id}"),
                participation_mills: *mills,
                active: true,
                heating_eligible: true,
                legacy_monthly_due: None,
            })
            .collect();
        ParticipationRoster::from_apartments(BuildingId(1), &apartments).expect("valid roster")
    }

    fn january() -> Period {
        Period::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            NaiveDate::from_ymd_opt(2025, 1, 31).expect("valid date"),
        )
        .expect("valid period")
    }

    fn reading(apartment: u64, units: Decimal) -> MeterReading {
        MeterReading {
            building_id: BuildingId(1),
            apartment_id: ApartmentId(apartment),
            date: NaiveDate::from_ymd_opt(2025, 1, 31).expect("valid date"),
            units,
        }
    }

    #[test]
    fn metered_policy_requires_a_percentage() {
        let err = HeatingPolicy::from_building(&building(HeatingSystem::HourMeters, None))
            .expect_err("missing percentage");
        assert!(matches!(
            err,
            AllocationError::Configuration {
                field: "heating_fixed_percentage",
                ..
            }
        ));
    }

    #[test]
    fn percentage_out_of_range_is_rejected() {
        for bad in [-1, 101] {
            let result = HeatingPolicy::from_building(&building(HeatingSystem::HeatMeters, Some(bad)));
            assert!(result.is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn conventional_ignores_percentage() {
        let policy = HeatingPolicy::from_building(&building(HeatingSystem::Conventional, Some(250)))
            .expect("percentage unused");
        assert_eq!(policy, HeatingPolicy::Conventional);
    }

    #[test]
    fn hour_meters_split_fixed_by_mills_and_variable_by_consumption() {
        let roster = roster(&[(1, 300), (2, 700)]);
        let policy = HeatingPolicy::Metered {
            meter: MeterKind::HourMeters,
            fixed_percentage: 30,
        };
        let readings = vec![reading(1, dec!(40)), reading(2, dec!(60))];

        let allocation = distribute_heating(
            10_000,
            policy,
            &roster,
            &january(),
            &readings,
        )
        .expect("valid");

        assert_eq!(allocation.fixed_total_cents, 3_000);
        assert_eq!(allocation.variable_total_cents, 7_000);
        let m = allocation.share(ApartmentId(1));
        let n = allocation.share(ApartmentId(2));
        assert_eq!((m.fixed(), m.variable()), (dec!(9.00), dec!(28.00)));
        assert_eq!((n.fixed(), n.variable()), (dec!(21.00), dec!(42.00)));
        assert_eq!(m.total_cents() + n.total_cents(), 10_000);
    }

    #[test]
    fn conventional_distributes_everything_by_mills() {
        let roster = roster(&[(1, 300), (2, 700)]);
        let allocation = distribute_heating(
            10_000,
            HeatingPolicy::Conventional,
            &roster,
            &january(),
            &[],
        )
        .expect("valid");
        assert_eq!(allocation.share(ApartmentId(1)).fixed_cents, 3_000);
        assert_eq!(allocation.share(ApartmentId(2)).fixed_cents, 7_000);
        assert_eq!(allocation.share(ApartmentId(2)).variable_cents, 0);
    }

    #[test]
    fn no_heating_with_expenses_is_surfaced() {
        let roster = roster(&[(1, 1000)]);
        let err = distribute_heating(500, HeatingPolicy::None, &roster, &january(), &[])
            .expect_err("heating expense without heating");
        assert!(matches!(
            err,
            AllocationError::Configuration {
                field: "heating_system",
                ..
            }
        ));

        let zero = distribute_heating(
            0,
            HeatingPolicy::None,
            &roster,
            &january(),
            &[],
        )
        .expect("valid");
        assert_eq!(zero.share(ApartmentId(1)), HeatingShare::default());
    }

    #[test]
    fn missing_readings_are_reported_not_zeroed() {
        let roster = roster(&[(1, 300), (2, 300), (3, 400)]);
        let policy = HeatingPolicy::Metered {
            meter: MeterKind::HeatMeters,
            fixed_percentage: 20,
        };
        let readings = vec![reading(1, dec!(10)), reading(2, dec!(30))];

        let allocation = distribute_heating(
            10_000,
            policy,
            &roster,
            &january(),
            &readings,
        )
        .expect("valid");
        assert_eq!(allocation.missing_readings, vec![ApartmentId(3)]);
        assert_eq!(allocation.share(ApartmentId(3)).fixed_cents, 800);
        let variable: i64 = allocation.shares.values().map(|s| s.variable_cents).sum();
        assert_eq!(variable, allocation.variable_total_cents);
    }

    #[test]
    fn repeated_readings_are_summed() {
        let roster = roster(&[(1, 500), (2, 500)]);
        let policy = HeatingPolicy::Metered {
            meter: MeterKind::HourMeters,
            fixed_percentage: 0,
        };
        let readings = vec![
            reading(1, dec!(10)),
            reading(1, dec!(20)),
            reading(2, dec!(10)),
        ];
        let allocation = distribute_heating(
            4_000,
            policy,
            &roster,
            &january(),
            &readings,
        )
        .expect("valid");
        assert_eq!(allocation.share(ApartmentId(1)).variable_cents, 3_000);
        assert_eq!(allocation.share(ApartmentId(2)).variable_cents, 1_000);
    }

    #[test]
    fn zero_consumption_with_variable_cost_is_a_configuration_error() {
        let roster = roster(&[(1, 500), (2, 500)]);
        let policy = HeatingPolicy::Metered {
            meter: MeterKind::HourMeters,
            fixed_percentage: 50,
        };
        let readings = vec![reading(1, dec!(0)), reading(2, dec!(0))];
        let err = distribute_heating(
            1_000,
            policy,
            &roster,
            &january(),
            &readings,
        )
        .expect_err("no consumption");
        assert!(matches!(
            err,
            AllocationError::Configuration {
                field: "meter_readings",
                ..
            }
        ));
    }

    #[test]
    fn negative_readings_are_rejected() {
        let roster = roster(&[(1, 1000)]);
        let policy = HeatingPolicy::Metered {
            meter: MeterKind::HourMeters,
            fixed_percentage: 50,
        };
        let result = distribute_heating(
            1_000,
            policy,
            &roster,
            &january(),
            &[reading(1, dec!(-2))],
        );
        assert!(matches!(result, Err(AllocationError::InputRange { .. })));
    }

    #[test]
    fn zero_read_sum_with_missing_readings_withholds_the_pool() {
        let roster = roster(&[(1, 300), (2, 700)]);
        let policy = HeatingPolicy::Metered {
            meter: MeterKind::HourMeters,
            fixed_percentage: 30,
        };
        let allocation =
            distribute_heating(10_000, policy, &roster, &january(), &[reading(1, dec!(0))])
                .expect("partial allocation");

        assert_eq!(allocation.missing_readings, vec![ApartmentId(2)]);
        assert_eq!(allocation.unallocated_variable_cents, 7_000);
        assert_eq!(allocation.share(ApartmentId(1)).fixed_cents, 900);
        assert_eq!(allocation.share(ApartmentId(1)).variable_cents, 0);
    }

    #[test]
    fn readings_outside_the_period_are_ignored() {
        let roster = roster(&[(1, 500), (2, 500)]);
        let policy = HeatingPolicy::Metered {
            meter: MeterKind::HeatMeters,
            fixed_percentage: 0,
        };
        let mut december = reading(2, dec!(90));
        december.date = NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid date");

        let allocation = distribute_heating(
            1_000,
            policy,
            &roster,
            &january(),
            &[reading(1, dec!(10)), december],
        )
        .expect("valid");

        assert_eq!(allocation.missing_readings, vec![ApartmentId(2)]);
        assert_eq!(allocation.share(ApartmentId(1)).variable_cents, 1_000);
        assert!(!allocation.consumption.contains_key(&ApartmentId(2)));
    }
}
