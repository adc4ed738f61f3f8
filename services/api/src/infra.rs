use chrono::NaiveDate;
use common_charges::workflows::charges::{
    Apartment, ApartmentId, Building, BuildingDirectory, BuildingId, ChargesDataset,
    ExpenseRecord, ExpenseStore, MeterReading, MeterReadingStore, PaymentLedger, Period,
    RepositoryError, ReserveCollection,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock, RwLockReadGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Shared, read-mostly view over a loaded CSV snapshot.
#[derive(Default, Clone)]
pub(crate) struct InMemoryChargesStore {
    dataset: Arc<RwLock<ChargesDataset>>,
}

impl InMemoryChargesStore {
    pub(crate) fn new(dataset: ChargesDataset) -> Self {
        Self {
            dataset: Arc::new(RwLock::new(dataset)),
        }
    }

    pub(crate) fn building_count(&self) -> usize {
        self.read().map(|dataset| dataset.buildings.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ChargesDataset>, RepositoryError> {
        self.dataset
            .read()
            .map_err(|_| RepositoryError::Unavailable("charges store lock poisoned".to_string()))
    }
}

impl BuildingDirectory for InMemoryChargesStore {
    fn building(&self, id: BuildingId) -> Result<Option<Building>, RepositoryError> {
        Ok(self
            .read()?
            .buildings
            .iter()
            .find(|building| building.building_id == id)
            .cloned())
    }

    fn apartments(&self, id: BuildingId) -> Result<Vec<Apartment>, RepositoryError> {
        Ok(self
            .read()?
            .apartments
            .iter()
            .filter(|apartment| apartment.building_id == id)
            .cloned()
            .collect())
    }
}

impl ExpenseStore for InMemoryChargesStore {
    fn expenses(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<Vec<ExpenseRecord>, RepositoryError> {
        Ok(self
            .read()?
            .expenses
            .iter()
            .filter(|expense| expense.building_id == building_id && period.contains(expense.date))
            .cloned()
            .collect())
    }
}

impl MeterReadingStore for InMemoryChargesStore {
    fn readings(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<Vec<MeterReading>, RepositoryError> {
        Ok(self
            .read()?
            .readings
            .iter()
            .filter(|reading| reading.building_id == building_id && period.contains(reading.date))
            .cloned()
            .collect())
    }
}

/// Ledger backed by the snapshot's payments and reserve suspensions.
impl PaymentLedger for InMemoryChargesStore {
    fn paid_in_period(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<BTreeMap<ApartmentId, Decimal>, RepositoryError> {
        let mut paid = BTreeMap::new();
        for payment in self.read()?.payments.iter().filter(|payment| {
            payment.building_id == building_id && period.contains(payment.date)
        }) {
            *paid.entry(payment.apartment_id).or_insert(Decimal::ZERO) += payment.amount;
        }
        Ok(paid)
    }

    fn reserve_collection(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<ReserveCollection, RepositoryError> {
        let suspended = self.read()?.reserve_suspensions.iter().any(|suspension| {
            let month = Period::month_of(suspension.month);
            suspension.building_id == building_id
                && month.start <= period.end
                && period.start <= month.end
        });
        Ok(if suspended {
            ReserveCollection::Suspended
        } else {
            ReserveCollection::Collected
        })
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
