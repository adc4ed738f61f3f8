//! Orchestrates the distributors into one statement per building and period.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use super::classifier::classify;
use super::domain::{
    AllocationError, Apartment, ApartmentId, Building, ExpenseRecord, ManagementFeeSplit,
    MeterReading, Period,
};
use super::heating::{distribute_heating, HeatingPolicy};
use super::mills::{distribute_by_mills, CentShares};
use super::money::from_cents;
use super::participation::ParticipationRoster;
use super::reserve::{allocate_reserve, ReserveCollection, ReserveFundPolicy};
use super::statement::{
    ApartmentCharges, ChargeBreakdown, ChargeErrors, ChargeTotals, ChargesStatement,
    HeatingSummary, LegacyDueDivergence, ReserveFundStatus,
};

/// Everything one calculation reads, fetched once up front.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargesSnapshot {
    pub building: Building,
    pub apartments: Vec<Apartment>,
    pub expenses: Vec<ExpenseRecord>,
    pub readings: Vec<MeterReading>,
    pub payments: BTreeMap<ApartmentId, Decimal>,
    pub reserve_collection: ReserveCollection,
}

impl ChargesSnapshot {
    pub fn new(building: Building, apartments: Vec<Apartment>) -> Self {
        Self {
            building,
            apartments,
            expenses: Vec::new(),
            readings: Vec::new(),
            payments: BTreeMap::new(),
            reserve_collection: ReserveCollection::Collected,
        }
    }
}

/// Per-apartment amounts in cents, before presentation.
#[derive(Debug, Clone, Copy, Default)]
struct ApartmentCents {
    operational: i64,
    heating_fixed: i64,
    heating_variable: i64,
    reserve: i64,
    management_fee: i64,
}

impl ApartmentCents {
    fn total(&self) -> i64 {
        self.operational + self.heating_fixed + self.heating_variable + self.reserve + self.management_fee
    }

    fn breakdown(&self) -> ChargeBreakdown {
        ChargeBreakdown {
            operational: from_cents(self.operational),
            heating_fixed: from_cents(self.heating_fixed),
            heating_variable: from_cents(self.heating_variable),
            reserve_fund_contribution: from_cents(self.reserve),
            management_fee: from_cents(self.management_fee),
        }
    }
}

/// Stateless allocation engine. Safe to share between concurrent requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationEngine;

impl AllocationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Computes every apartment's charges for `period`.
    ///
    /// `as_of` stands in for "today" when deciding which management-fee months
    /// have already elapsed.
    pub fn calculate(
        &self,
        snapshot: &ChargesSnapshot,
        period: &Period,
        as_of: NaiveDate,
    ) -> Result<ChargesStatement, AllocationError> {
        let building = &snapshot.building;
        let building_id = building.building_id;

        let heating_policy = HeatingPolicy::from_building(building)?;
        let reserve_policy = ReserveFundPolicy::from_building(building)?;
        let roster = ParticipationRoster::from_apartments(building_id, &snapshot.apartments)?;
        let expenses = classify(building_id, period, &snapshot.expenses, as_of)?;

        if expenses.deferred_management_fee_cents > 0 {
            warn!(
                %building_id,
                %period,
                %as_of,
                deferred = %from_cents(expenses.deferred_management_fee_cents),
                "management fee for an unfinished month left out of total due"
            );
        }

        let operational = distribute_by_mills(expenses.operational_cents, roster.mills())
            .map_err(|err| {
                AllocationError::configuration(building_id, "participation_mills", err.to_string())
            })?;
        let heating = distribute_heating(
            expenses.heating_cents,
            heating_policy,
            &roster,
            period,
            &snapshot.readings,
        )?;
        let reserve = allocate_reserve(&reserve_policy, &roster, snapshot.reserve_collection)?;
        let management_fee = split_management_fee(
            expenses.management_fee_cents,
            building.management_fee_split,
            &roster,
        )?;

        let mut per_apartment: BTreeMap<ApartmentId, ApartmentCents> = BTreeMap::new();
        for id in roster.ids() {
            let heating_share = heating.share(id);
            per_apartment.insert(
                id,
                ApartmentCents {
                    operational: operational.get(id),
                    heating_fixed: heating_share.fixed_cents,
                    heating_variable: heating_share.variable_cents,
                    reserve: reserve.contribution_cents(id),
                    management_fee: management_fee.get(id),
                },
            );
        }

        let heating_total = expenses.heating_cents;
        reconcile(
            "operational",
            expenses.operational_cents,
            per_apartment.values().map(|c| c.operational).sum(),
        )?;
        reconcile(
            "heating_fixed",
            heating.fixed_total_cents,
            per_apartment.values().map(|c| c.heating_fixed).sum(),
        )?;
        reconcile(
            "heating_variable",
            heating.variable_total_cents - heating.unallocated_variable_cents,
            per_apartment.values().map(|c| c.heating_variable).sum(),
        )?;
        reconcile(
            "reserve_fund",
            reserve.target_cents,
            per_apartment.values().map(|c| c.reserve).sum(),
        )?;
        reconcile(
            "management_fee",
            expenses.management_fee_cents,
            per_apartment.values().map(|c| c.management_fee).sum(),
        )?;

        let grand_total_cents = expenses.operational_cents
            + heating_total
            + reserve.target_cents
            + expenses.management_fee_cents;
        reconcile(
            "grand_total",
            grand_total_cents - heating.unallocated_variable_cents,
            per_apartment.values().map(ApartmentCents::total).sum(),
        )?;

        let missing: BTreeSet<ApartmentId> = heating.missing_readings.iter().copied().collect();
        for apartment_id in &missing {
            warn!(%building_id, %apartment_id, %period, "meter reading missing; apartment withheld");
        }

        let mut shares = BTreeMap::new();
        let mut notices = Vec::new();
        let mut withheld_cents = heating.unallocated_variable_cents;
        for participant in roster.participants() {
            let id = participant.apartment_id;
            let cents = per_apartment.get(&id).copied().unwrap_or_default();
            if missing.contains(&id) {
                withheld_cents += cents.total();
                continue;
            }

            let total_due = from_cents(cents.total());
            let paid = snapshot.payments.get(&id).copied();
            let total_amount = total_due - paid.unwrap_or(Decimal::ZERO);

            if let Some(legacy) = participant.legacy_monthly_due {
                if legacy != total_due {
                    warn!(
                        %building_id,
                        apartment_id = %id,
                        %legacy,
                        computed = %total_due,
                        "legacy monthly due disagrees with computed charges"
                    );
                    notices.push(LegacyDueDivergence {
                        apartment_id: id,
                        legacy_monthly_due: legacy,
                        computed_total_due: total_due,
                    });
                }
            }

            shares.insert(
                id,
                ApartmentCharges {
                    apartment_number: participant.number.clone(),
                    total_due,
                    total_amount,
                    paid,
                    breakdown: cents.breakdown(),
                },
            );
        }

        let totals = ChargeTotals {
            operational: from_cents(expenses.operational_cents),
            heating: from_cents(heating_total),
            heating_fixed: from_cents(heating.fixed_total_cents),
            heating_variable: from_cents(heating.variable_total_cents),
            reserve: from_cents(reserve.target_cents),
            management_fee: from_cents(expenses.management_fee_cents),
            management_fee_deferred: from_cents(expenses.deferred_management_fee_cents),
            grand_total: from_cents(grand_total_cents),
            withheld: from_cents(withheld_cents),
        };

        info!(
            %building_id,
            %period,
            apartments = shares.len(),
            missing_readings = missing.len(),
            grand_total = %totals.grand_total,
            "common charges calculated"
        );

        Ok(ChargesStatement {
            building_id,
            period: *period,
            as_of,
            shares,
            totals,
            errors: ChargeErrors {
                missing_readings: missing.into_iter().collect(),
                configuration: None,
            },
            heating: HeatingSummary {
                system: heating_policy.system(),
                fixed_percentage: heating_policy.fixed_percentage(),
                consumption_unit: match heating_policy {
                    HeatingPolicy::Metered { meter, .. } => Some(meter.unit_label()),
                    _ => None,
                },
                consumption: heating.consumption,
            },
            reserve_fund: ReserveFundStatus {
                status: reserve.status,
                mode: reserve_policy.mode(),
                period_target: reserve_policy.monthly_target(),
            },
            notices,
            deferred: expenses.deferred,
        })
    }
}

fn split_management_fee(
    total_cents: i64,
    split: ManagementFeeSplit,
    roster: &ParticipationRoster,
) -> Result<CentShares, AllocationError> {
    let shares = match split {
        ManagementFeeSplit::Equal => distribute_by_mills(total_cents, roster.equal_weights()),
        ManagementFeeSplit::ByMills => distribute_by_mills(total_cents, roster.mills()),
    };
    shares.map_err(|err| {
        AllocationError::configuration(roster.building_id(), "management_fee_split", err.to_string())
    })
}

fn reconcile(category: &'static str, expected: i64, allocated: i64) -> Result<(), AllocationError> {
    if expected == allocated {
        return Ok(());
    }
    error!(
        category,
        expected = %from_cents(expected),
        allocated = %from_cents(allocated),
        "allocation reconciliation failed"
    );
    Err(AllocationError::Reconciliation {
        category,
        expected: from_cents(expected),
        allocated: from_cents(allocated),
    })
}
