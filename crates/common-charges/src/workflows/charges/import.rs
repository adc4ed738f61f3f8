//! CSV snapshots of the collaborator data: buildings, apartments, expenses,
//! meter readings and ledger payments.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use super::domain::{
    Apartment, ApartmentId, Building, BuildingId, ExpenseCategory, ExpenseRecord, HeatingSystem,
    ManagementFeeSplit, MeterReading,
};

pub const BUILDINGS_FILE: &str = "buildings.csv";
pub const APARTMENTS_FILE: &str = "apartments.csv";
pub const EXPENSES_FILE: &str = "expenses.csv";
pub const READINGS_FILE: &str = "readings.csv";
pub const PAYMENTS_FILE: &str = "payments.csv";
pub const RESERVE_SUSPENSIONS_FILE: &str = "reserve_suspensions.csv";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid CSV data in {file}: {source}")]
    Csv {
        file: &'static str,
        source: csv::Error,
    },
    #[error("{file} row {row}: invalid {field} '{value}'")]
    InvalidField {
        file: &'static str,
        row: usize,
        field: &'static str,
        value: String,
    },
}

/// A payment the ledger recorded against an apartment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRecord {
    pub building_id: BuildingId,
    pub apartment_id: ApartmentId,
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// A calendar month for which reserve collection is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveSuspension {
    pub building_id: BuildingId,
    pub month: NaiveDate,
}

/// All collaborator data loaded from one snapshot directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChargesDataset {
    pub buildings: Vec<Building>,
    pub apartments: Vec<Apartment>,
    pub expenses: Vec<ExpenseRecord>,
    pub readings: Vec<MeterReading>,
    pub payments: Vec<PaymentRecord>,
    pub reserve_suspensions: Vec<ReserveSuspension>,
}

impl ChargesDataset {
    /// Loads a snapshot directory. Readings, payments and suspensions are optional files.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ImportError> {
        let dir = dir.as_ref();
        Ok(Self {
            buildings: parse_buildings(open(dir, BUILDINGS_FILE)?)?,
            apartments: parse_apartments(open(dir, APARTMENTS_FILE)?)?,
            expenses: parse_expenses(open(dir, EXPENSES_FILE)?)?,
            readings: open_optional(dir, READINGS_FILE)?
                .map(parse_readings)
                .transpose()?
                .unwrap_or_default(),
            payments: open_optional(dir, PAYMENTS_FILE)?
                .map(parse_payments)
                .transpose()?
                .unwrap_or_default(),
            reserve_suspensions: open_optional(dir, RESERVE_SUSPENSIONS_FILE)?
                .map(parse_reserve_suspensions)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

fn open(dir: &Path, file: &str) -> Result<File, ImportError> {
    let path = dir.join(file);
    File::open(&path).map_err(|source| ImportError::Io { path, source })
}

fn open_optional(dir: &Path, file: &str) -> Result<Option<File>, ImportError> {
    let path = dir.join(file);
    if path.exists() {
        open(dir, file).map(Some)
    } else {
        Ok(None)
    }
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source)
}

fn rows<R, T>(source: R, file: &'static str) -> Result<Vec<T>, ImportError>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    reader(source)
        .deserialize::<T>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ImportError::Csv { file, source })
}

#[derive(Debug, Deserialize)]
struct BuildingRow {
    building_id: u64,
    #[serde(default)]
    name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    heating_system: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    heating_fixed_percentage: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    reserve_fund_goal: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    reserve_fund_duration_months: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    reserve_contribution_per_apartment: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    management_fee_split: Option<String>,
}

pub fn parse_buildings<R: Read>(source: R) -> Result<Vec<Building>, ImportError> {
    const FILE: &str = BUILDINGS_FILE;
    rows::<_, BuildingRow>(source, FILE)?
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let line = index + 1;
            let raw_system = row.heating_system.unwrap_or_default();
            let heating_system = HeatingSystem::parse(&raw_system)
                .ok_or_else(|| invalid(FILE, line, "heating_system", &raw_system))?;
            let raw_split = row.management_fee_split.unwrap_or_default();
            let management_fee_split = ManagementFeeSplit::parse(&raw_split)
                .ok_or_else(|| invalid(FILE, line, "management_fee_split", &raw_split))?;

            Ok(Building {
                building_id: BuildingId(row.building_id),
                name: row.name,
                heating_system,
                heating_fixed_percentage: optional(
                    row.heating_fixed_percentage,
                    FILE,
                    line,
                    "heating_fixed_percentage",
                )?,
                reserve_fund_goal: optional(row.reserve_fund_goal, FILE, line, "reserve_fund_goal")?,
                reserve_fund_duration_months: optional(
                    row.reserve_fund_duration_months,
                    FILE,
                    line,
                    "reserve_fund_duration_months",
                )?,
                reserve_contribution_per_apartment: optional(
                    row.reserve_contribution_per_apartment,
                    FILE,
                    line,
                    "reserve_contribution_per_apartment",
                )?,
                management_fee_split,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ApartmentRow {
    apartment_id: u64,
    building_id: u64,
    #[serde(default)]
    number: String,
    participation_mills: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    active: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    heating_eligible: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    legacy_monthly_due: Option<String>,
}

pub fn parse_apartments<R: Read>(source: R) -> Result<Vec<Apartment>, ImportError> {
    const FILE: &str = APARTMENTS_FILE;
    rows::<_, ApartmentRow>(source, FILE)?
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let line = index + 1;
            Ok(Apartment {
                apartment_id: ApartmentId(row.apartment_id),
                building_id: BuildingId(row.building_id),
                number: row.number,
                participation_mills: parse(
                    &row.participation_mills,
                    FILE,
                    line,
                    "participation_mills",
                )?,
                active: flag(row.active, FILE, line, "active")?,
                heating_eligible: flag(row.heating_eligible, FILE, line, "heating_eligible")?,
                legacy_monthly_due: optional(
                    row.legacy_monthly_due,
                    FILE,
                    line,
                    "legacy_monthly_due",
                )?,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ExpenseRow {
    building_id: u64,
    category: String,
    amount: String,
    date: String,
    #[serde(default)]
    description: String,
}

pub fn parse_expenses<R: Read>(source: R) -> Result<Vec<ExpenseRecord>, ImportError> {
    const FILE: &str = EXPENSES_FILE;
    rows::<_, ExpenseRow>(source, FILE)?
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let line = index + 1;
            let category = ExpenseCategory::parse(&row.category)
                .ok_or_else(|| invalid(FILE, line, "category", &row.category))?;
            Ok(ExpenseRecord {
                building_id: BuildingId(row.building_id),
                category,
                amount: parse(&row.amount, FILE, line, "amount")?,
                date: parse_date(&row.date, FILE, line, "date")?,
                description: row.description,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ReadingRow {
    building_id: u64,
    apartment_id: u64,
    date: String,
    units: String,
}

pub fn parse_readings<R: Read>(source: R) -> Result<Vec<MeterReading>, ImportError> {
    const FILE: &str = READINGS_FILE;
    rows::<_, ReadingRow>(source, FILE)?
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let line = index + 1;
            Ok(MeterReading {
                building_id: BuildingId(row.building_id),
                apartment_id: ApartmentId(row.apartment_id),
                date: parse_date(&row.date, FILE, line, "date")?,
                units: parse(&row.units, FILE, line, "units")?,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct PaymentRow {
    building_id: u64,
    apartment_id: u64,
    date: String,
    amount: String,
}

pub fn parse_payments<R: Read>(source: R) -> Result<Vec<PaymentRecord>, ImportError> {
    const FILE: &str = PAYMENTS_FILE;
    rows::<_, PaymentRow>(source, FILE)?
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let line = index + 1;
            Ok(PaymentRecord {
                building_id: BuildingId(row.building_id),
                apartment_id: ApartmentId(row.apartment_id),
                date: parse_date(&row.date, FILE, line, "date")?,
                amount: parse(&row.amount, FILE, line, "amount")?,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct SuspensionRow {
    building_id: u64,
    month: String,
}

/// Rows name a month as `YYYY-MM`; any day of the month is accepted too.
pub fn parse_reserve_suspensions<R: Read>(source: R) -> Result<Vec<ReserveSuspension>, ImportError> {
    const FILE: &str = RESERVE_SUSPENSIONS_FILE;
    rows::<_, SuspensionRow>(source, FILE)?
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let line = index + 1;
            let raw = row.month.trim();
            let month = NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
                .map_err(|_| invalid(FILE, line, "month", raw))?;
            Ok(ReserveSuspension {
                building_id: BuildingId(row.building_id),
                month,
            })
        })
        .collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn invalid(file: &'static str, row: usize, field: &'static str, value: &str) -> ImportError {
    ImportError::InvalidField {
        file,
        row,
        field,
        value: value.to_string(),
    }
}

fn parse<T: FromStr>(
    raw: &str,
    file: &'static str,
    row: usize,
    field: &'static str,
) -> Result<T, ImportError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| invalid(file, row, field, raw))
}

fn optional<T: FromStr>(
    raw: Option<String>,
    file: &'static str,
    row: usize,
    field: &'static str,
) -> Result<Option<T>, ImportError> {
    raw.map(|value| parse(&value, file, row, field)).transpose()
}

fn flag(
    raw: Option<String>,
    file: &'static str,
    row: usize,
    field: &'static str,
) -> Result<bool, ImportError> {
    match raw.as_deref().map(|value| value.trim().to_ascii_lowercase()) {
        None => Ok(true),
        Some(value) => match value.as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(invalid(file, row, field, &value)),
        },
    }
}

fn parse_date(
    raw: &str,
    file: &'static str,
    row: usize,
    field: &'static str,
) -> Result<NaiveDate, ImportError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| invalid(file, row, field, raw))
}
