use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::domain::{Apartment, ApartmentId, Building, BuildingId, ExpenseRecord, MeterReading, Period};
use super::reserve::ReserveCollection;

/// Read-only building and apartment lookup.
pub trait BuildingDirectory: Send + Sync {
    fn building(&self, id: BuildingId) -> Result<Option<Building>, RepositoryError>;
    fn apartments(&self, id: BuildingId) -> Result<Vec<Apartment>, RepositoryError>;
}

/// Read-only expense access filtered by building and period.
pub trait ExpenseStore: Send + Sync {
    fn expenses(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<Vec<ExpenseRecord>, RepositoryError>;
}

/// Read-only heating meter readings filtered by building and period.
pub trait MeterReadingStore: Send + Sync {
    fn readings(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<Vec<MeterReading>, RepositoryError>;
}

/// Everything the engine needs from the data store for one snapshot.
pub trait ChargesDataSource: BuildingDirectory + ExpenseStore + MeterReadingStore {}

impl<T> ChargesDataSource for T where T: BuildingDirectory + ExpenseStore + MeterReadingStore {}

/// Payment ledger collaborator. Its answers never change `total_due`.
pub trait PaymentLedger: Send + Sync {
    fn paid_in_period(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<BTreeMap<ApartmentId, Decimal>, RepositoryError>;

    fn reserve_collection(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<ReserveCollection, RepositoryError>;
}

/// Ledger stand-in for deployments without payment data.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLedger;

impl PaymentLedger for NoLedger {
    fn paid_in_period(
        &self,
        _building_id: BuildingId,
        _period: &Period,
    ) -> Result<BTreeMap<ApartmentId, Decimal>, RepositoryError> {
        Ok(BTreeMap::new())
    }

    fn reserve_collection(
        &self,
        _building_id: BuildingId,
        _period: &Period,
    ) -> Result<ReserveCollection, RepositoryError> {
        Ok(ReserveCollection::Collected)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
