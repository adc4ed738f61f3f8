use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a building in the directory collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(pub u64);

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an apartment. Ordering doubles as the rounding tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApartmentId(pub u64);

impl fmt::Display for ApartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatingSystem {
    None,
    Conventional,
    HourMeters,
    HeatMeters,
}

impl HeatingSystem {
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Conventional => "conventional",
            Self::HourMeters => "hour_meters",
            Self::HeatMeters => "heat_meters",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Some(Self::None),
            "conventional" => Some(Self::Conventional),
            "hour_meters" => Some(Self::HourMeters),
            "heat_meters" => Some(Self::HeatMeters),
            _ => None,
        }
    }
}

/// How an eligible management fee is split across the apartments of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagementFeeSplit {
    #[default]
    Equal,
    ByMills,
}

impl ManagementFeeSplit {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "equal" | "" => Some(Self::Equal),
            "by_mills" => Some(Self::ByMills),
            _ => None,
        }
    }
}

/// Building configuration as held by the directory collaborator.
///
/// The raw optional fields are validated into [`HeatingPolicy`] and
/// [`ReserveFundPolicy`] before any amount is distributed.
///
/// [`HeatingPolicy`]: super::heating::HeatingPolicy
/// [`ReserveFundPolicy`]: super::reserve::ReserveFundPolicy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub building_id: BuildingId,
    #[serde(default)]
    pub name: String,
    pub heating_system: HeatingSystem,
    #[serde(default)]
    pub heating_fixed_percentage: Option<i32>,
    #[serde(default)]
    pub reserve_fund_goal: Option<Decimal>,
    #[serde(default)]
    pub reserve_fund_duration_months: Option<i32>,
    #[serde(default)]
    pub reserve_contribution_per_apartment: Option<Decimal>,
    #[serde(default)]
    pub management_fee_split: ManagementFeeSplit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apartment {
    pub apartment_id: ApartmentId,
    pub building_id: BuildingId,
    #[serde(default)]
    pub number: String,
    pub participation_mills: i32,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub heating_eligible: bool,
    /// Pre-engine monthly figure some apartments still carry. Never billed.
    #[serde(default)]
    pub legacy_monthly_due: Option<Decimal>,
}

fn default_true() -> bool {
    true
}

/// Inclusive billing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    #[serde(rename = "period_start_date")]
    pub start: NaiveDate,
    #[serde(rename = "period_end_date")]
    pub end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AllocationError> {
        if end < start {
            return Err(AllocationError::InputRange {
                field: "period_end_date".to_string(),
                reason: format!("{end} is before period_start_date {start}"),
            });
        }
        Ok(Self { start, end })
    }

    /// The calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let next_month = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        };
        let end = next_month
            .and_then(|first| first.pred_opt())
            .unwrap_or(start);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Bucket an expense category is distributed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseBucket {
    Operational,
    Heating,
    ManagementFee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    CommonElectricity,
    Water,
    Cleaning,
    Elevator,
    Maintenance,
    Insurance,
    Gardening,
    OtherOperational,
    HeatingOil,
    NaturalGas,
    HeatingElectricity,
    HeatingMaintenance,
    ManagementFee,
}

impl ExpenseCategory {
    pub const fn ordered() -> [Self; 13] {
        [
            Self::CommonElectricity,
            Self::Water,
            Self::Cleaning,
            Self::Elevator,
            Self::Maintenance,
            Self::Insurance,
            Self::Gardening,
            Self::OtherOperational,
            Self::HeatingOil,
            Self::NaturalGas,
            Self::HeatingElectricity,
            Self::HeatingMaintenance,
            Self::ManagementFee,
        ]
    }

    pub const fn tag(self) -> &'static str {
        match self {
            Self::CommonElectricity => "common_electricity",
            Self::Water => "water",
            Self::Cleaning => "cleaning",
            Self::Elevator => "elevator",
            Self::Maintenance => "maintenance",
            Self::Insurance => "insurance",
            Self::Gardening => "gardening",
            Self::OtherOperational => "other_operational",
            Self::HeatingOil => "heating_oil",
            Self::NaturalGas => "natural_gas",
            Self::HeatingElectricity => "heating_electricity",
            Self::HeatingMaintenance => "heating_maintenance",
            Self::ManagementFee => "management_fee",
        }
    }

    pub const fn bucket(self) -> ExpenseBucket {
        match self {
            Self::HeatingOil
            | Self::NaturalGas
            | Self::HeatingElectricity
            | Self::HeatingMaintenance => ExpenseBucket::Heating,
            Self::ManagementFee => ExpenseBucket::ManagementFee,
            _ => ExpenseBucket::Operational,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let tag = value.trim().to_ascii_lowercase();
        Self::ordered()
            .into_iter()
            .find(|category| category.tag() == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub building_id: BuildingId,
    pub category: ExpenseCategory,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
}

/// Consumption units (hours or heat units) recorded for one apartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub building_id: BuildingId,
    pub apartment_id: ApartmentId,
    pub date: NaiveDate,
    pub units: Decimal,
}

/// Failures that stop a calculation for the whole request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocationError {
    #[error("building {building_id}: invalid `{field}`: {reason}")]
    Configuration {
        building_id: BuildingId,
        field: &'static str,
        reason: String,
    },
    #[error("invalid `{field}`: {reason}")]
    InputRange { field: String, reason: String },
    #[error("{category} allocation does not reconcile: expected {expected}, allocated {allocated}")]
    Reconciliation {
        category: &'static str,
        expected: Decimal,
        allocated: Decimal,
    },
}

impl AllocationError {
    pub(crate) fn configuration(
        building_id: BuildingId,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            building_id,
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn input_range(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputRange {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
