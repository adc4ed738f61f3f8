use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{ApartmentId, BuildingId, ExpenseRecord, HeatingSystem, Period};
use super::reserve::{ReserveCollection, ReserveFundMode};

/// The engine's answer for one building and period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargesStatement {
    pub building_id: BuildingId,
    pub period: Period,
    pub as_of: NaiveDate,
    pub shares: BTreeMap<ApartmentId, ApartmentCharges>,
    pub totals: ChargeTotals,
    pub errors: ChargeErrors,
    pub heating: HeatingSummary,
    pub reserve_fund: ReserveFundStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<LegacyDueDivergence>,
    /// Management-fee records left out of this period's billing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deferred: Vec<ExpenseRecord>,
}

impl ChargesStatement {
    pub fn share(&self, apartment_id: ApartmentId) -> Option<&ApartmentCharges> {
        self.shares.get(&apartment_id)
    }

    /// Sum of `total_due` over the apartments that received a share.
    pub fn allocated_total(&self) -> Decimal {
        self.shares.values().map(|share| share.total_due).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApartmentCharges {
    pub apartment_number: String,
    pub total_due: Decimal,
    /// `total_due` minus what the ledger reports as already paid.
    pub total_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid: Option<Decimal>,
    pub breakdown: ChargeBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChargeBreakdown {
    pub operational: Decimal,
    pub heating_fixed: Decimal,
    pub heating_variable: Decimal,
    pub reserve_fund_contribution: Decimal,
    pub management_fee: Decimal,
}

impl ChargeBreakdown {
    pub fn heating(&self) -> Decimal {
        self.heating_fixed + self.heating_variable
    }

    pub fn total(&self) -> Decimal {
        self.operational
            + self.heating_fixed
            + self.heating_variable
            + self.reserve_fund_contribution
            + self.management_fee
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChargeTotals {
    pub operational: Decimal,
    pub heating: Decimal,
    pub heating_fixed: Decimal,
    pub heating_variable: Decimal,
    pub reserve: Decimal,
    pub management_fee: Decimal,
    /// Management fees dated in the current or a later month, left out of `total_due`.
    pub management_fee_deferred: Decimal,
    pub grand_total: Decimal,
    /// Portions of `grand_total` held back for apartments listed in `errors`.
    pub withheld: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChargeErrors {
    pub missing_readings: Vec<ApartmentId>,
    pub configuration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatingSummary {
    pub system: HeatingSystem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_percentage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumption_unit: Option<&'static str>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub consumption: BTreeMap<ApartmentId, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReserveFundStatus {
    pub status: ReserveCollection,
    pub mode: ReserveFundMode,
    pub period_target: Decimal,
}

/// A legacy monthly figure that disagrees with the computed `total_due`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyDueDivergence {
    pub apartment_id: ApartmentId,
    pub legacy_monthly_due: Decimal,
    pub computed_total_due: Decimal,
}
