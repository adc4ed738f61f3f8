use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::workflows::charges::domain::{
    Apartment, ApartmentId, Building, BuildingId, ExpenseCategory, ExpenseRecord, HeatingSystem,
    ManagementFeeSplit, MeterReading, Period,
};
use crate::workflows::charges::repository::{
    BuildingDirectory, ExpenseStore, MeterReadingStore, PaymentLedger, RepositoryError,
};
use crate::workflows::charges::reserve::ReserveCollection;
use crate::workflows::charges::ChargesService;

pub(super) const BUILDING: BuildingId = BuildingId(1);
pub(super) const APT_M: ApartmentId = ApartmentId(10);
pub(super) const APT_N: ApartmentId = ApartmentId(11);

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn september() -> Period {
    Period::new(date(2025, 9, 1), date(2025, 9, 30)).expect("valid period")
}

/// A date well after every period used in these tests.
pub(super) fn settled() -> NaiveDate {
    date(2026, 1, 15)
}

pub(super) fn building(heating_system: HeatingSystem, fixed_percentage: Option<i32>) -> Building {
    Building {
        building_id: BUILDING,
        name: "Acropolis View".to_string(),
        heating_system,
        heating_fixed_percentage: fixed_percentage,
        reserve_fund_goal: None,
        reserve_fund_duration_months: None,
        reserve_contribution_per_apartment: None,
        management_fee_split: ManagementFeeSplit::Equal,
    }
}

pub(super) fn metered_building() -> Building {
    building(HeatingSystem::HourMeters, Some(30))
}

pub(super) fn apartment(id: ApartmentId, number: &str, mills: i32) -> Apartment {
    Apartment {
        apartment_id: id,
        building_id: BUILDING,
        number: number.to_string(),
        participation_mills: mills,
        active: true,
        heating_eligible: true,
        legacy_monthly_due: None,
    }
}

/// Apartments M (300 mills) and N (700 mills).
pub(super) fn two_apartments() -> Vec<Apartment> {
    vec![apartment(APT_M, "A1", 300), apartment(APT_N, "A2", 700)]
}

pub(super) fn expense(category: ExpenseCategory, amount: Decimal, on: NaiveDate) -> ExpenseRecord {
    ExpenseRecord {
        building_id: BUILDING,
        category,
        amount,
        date: on,
        description: format!("{} invoice", category.tag()),
    }
}

pub(super) fn reading(apartment_id: ApartmentId, units: Decimal) -> MeterReading {
    MeterReading {
        building_id: BUILDING,
        apartment_id,
        date: date(2025, 9, 30),
        units,
    }
}

/// Heating oil of 100.00 with readings 40/60 for M and N.
pub(super) fn heating_scenario() -> (Vec<ExpenseRecord>, Vec<MeterReading>) {
    (
        vec![expense(
            ExpenseCategory::HeatingOil,
            dec!(100.00),
            date(2025, 9, 10),
        )],
        vec![reading(APT_M, dec!(40)), reading(APT_N, dec!(60))],
    )
}

#[derive(Default)]
pub(super) struct MemoryStore {
    buildings: Vec<Building>,
    apartments: Vec<Apartment>,
    expenses: Vec<ExpenseRecord>,
    readings: Vec<MeterReading>,
}

impl MemoryStore {
    pub(super) fn new(building: Building, apartments: Vec<Apartment>) -> Self {
        Self {
            buildings: vec![building],
            apartments,
            ..Self::default()
        }
    }

    pub(super) fn with_expenses(mut self, expenses: Vec<ExpenseRecord>) -> Self {
        self.expenses = expenses;
        self
    }

    pub(super) fn with_readings(mut self, readings: Vec<MeterReading>) -> Self {
        self.readings = readings;
        self
    }
}

impl BuildingDirectory for MemoryStore {
    fn building(&self, id: BuildingId) -> Result<Option<Building>, RepositoryError> {
        Ok(self
            .buildings
            .iter()
            .find(|building| building.building_id == id)
            .cloned())
    }

    fn apartments(&self, id: BuildingId) -> Result<Vec<Apartment>, RepositoryError> {
        Ok(self
            .apartments
            .iter()
            .filter(|apartment| apartment.building_id == id)
            .cloned()
            .collect())
    }
}

impl ExpenseStore for MemoryStore {
    fn expenses(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<Vec<ExpenseRecord>, RepositoryError> {
        Ok(self
            .expenses
            .iter()
            .filter(|expense| expense.building_id == building_id && period.contains(expense.date))
            .cloned()
            .collect())
    }
}

impl MeterReadingStore for MemoryStore {
    fn readings(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<Vec<MeterReading>, RepositoryError> {
        Ok(self
            .readings
            .iter()
            .filter(|reading| reading.building_id == building_id && period.contains(reading.date))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryLedger {
    payments: Arc<Mutex<BTreeMap<ApartmentId, Decimal>>>,
    suspended: Arc<Mutex<BTreeSet<BuildingId>>>,
}

impl MemoryLedger {
    pub(super) fn record_payment(&self, apartment_id: ApartmentId, amount: Decimal) {
        *self
            .payments
            .lock()
            .expect("ledger mutex poisoned")
            .entry(apartment_id)
            .or_insert(Decimal::ZERO) += amount;
    }

    pub(super) fn suspend_reserve(&self, building_id: BuildingId) {
        self.suspended
            .lock()
            .expect("ledger mutex poisoned")
            .insert(building_id);
    }
}

impl PaymentLedger for MemoryLedger {
    fn paid_in_period(
        &self,
        _building_id: BuildingId,
        _period: &Period,
    ) -> Result<BTreeMap<ApartmentId, Decimal>, RepositoryError> {
        Ok(self.payments.lock().expect("ledger mutex poisoned").clone())
    }

    fn reserve_collection(
        &self,
        building_id: BuildingId,
        _period: &Period,
    ) -> Result<ReserveCollection, RepositoryError> {
        let suspended = self
            .suspended
            .lock()
            .expect("ledger mutex poisoned")
            .contains(&building_id);
        Ok(if suspended {
            ReserveCollection::Suspended
        } else {
            ReserveCollection::Collected
        })
    }
}

pub(super) struct UnavailableStore;

impl BuildingDirectory for UnavailableStore {
    fn building(&self, _id: BuildingId) -> Result<Option<Building>, RepositoryError> {
        Err(RepositoryError::Unavailable("directory offline".to_string()))
    }

    fn apartments(&self, _id: BuildingId) -> Result<Vec<Apartment>, RepositoryError> {
        Err(RepositoryError::Unavailable("directory offline".to_string()))
    }
}

impl ExpenseStore for UnavailableStore {
    fn expenses(
        &self,
        _building_id: BuildingId,
        _period: &Period,
    ) -> Result<Vec<ExpenseRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("expenses offline".to_string()))
    }
}

impl MeterReadingStore for UnavailableStore {
    fn readings(
        &self,
        _building_id: BuildingId,
        _period: &Period,
    ) -> Result<Vec<MeterReading>, RepositoryError> {
        Err(RepositoryError::Unavailable("readings offline".to_string()))
    }
}

pub(super) fn build_service(
    store: MemoryStore,
) -> (Arc<ChargesService<MemoryStore, MemoryLedger>>, MemoryLedger) {
    let ledger = MemoryLedger::default();
    let service = Arc::new(ChargesService::new(
        Arc::new(store),
        Arc::new(ledger.clone()),
    ));
    (service, ledger)
}

pub(super) fn heating_service() -> Arc<ChargesService<MemoryStore, MemoryLedger>> {
    let (expenses, readings) = heating_scenario();
    let store = MemoryStore::new(metered_building(), two_apartments())
        .with_expenses(expenses)
        .with_readings(readings);
    build_service(store).0
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("valid json")
}
