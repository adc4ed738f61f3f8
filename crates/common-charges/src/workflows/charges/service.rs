use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use super::domain::{AllocationError, BuildingId, Period};
use super::engine::{AllocationEngine, ChargesSnapshot};
use super::participation::ParticipationRoster;
use super::repository::{ChargesDataSource, PaymentLedger, RepositoryError};
use super::reserve::{ReserveFundPolicy, ReserveSchedule};
use super::statement::ChargesStatement;

/// Service composing the data collaborators, the ledger and the allocation engine.
pub struct ChargesService<S, L> {
    source: Arc<S>,
    ledger: Arc<L>,
    engine: AllocationEngine,
}

impl<S, L> ChargesService<S, L>
where
    S: ChargesDataSource + 'static,
    L: PaymentLedger + 'static,
{
    pub fn new(source: Arc<S>, ledger: Arc<L>) -> Self {
        Self {
            source,
            ledger,
            engine: AllocationEngine::new(),
        }
    }

    /// Loads a consistent snapshot for the building and period and runs the engine.
    pub fn calculate_advanced(
        &self,
        building_id: BuildingId,
        period_start: NaiveDate,
        period_end: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<ChargesStatement, ChargesServiceError> {
        let period = Period::new(period_start, period_end)?;
        let snapshot = self.snapshot(building_id, &period)?;

        info!(%building_id, %period, %as_of, "calculating common charges");
        let statement = self.engine.calculate(&snapshot, &period, as_of)?;
        Ok(statement)
    }

    /// Reserve fund plan of a building, normalized against its live mills.
    pub fn reserve_schedule(
        &self,
        building_id: BuildingId,
    ) -> Result<ReserveSchedule, ChargesServiceError> {
        let building = self
            .source
            .building(building_id)?
            .ok_or(ChargesServiceError::BuildingNotFound(building_id))?;
        let apartments = self.source.apartments(building_id)?;

        let policy = ReserveFundPolicy::from_building(&building)?;
        let roster = ParticipationRoster::from_apartments(building_id, &apartments)?;
        Ok(ReserveSchedule::new(&policy, &roster))
    }

    fn snapshot(
        &self,
        building_id: BuildingId,
        period: &Period,
    ) -> Result<ChargesSnapshot, ChargesServiceError> {
        let building = self
            .source
            .building(building_id)?
            .ok_or(ChargesServiceError::BuildingNotFound(building_id))?;

        let mut snapshot = ChargesSnapshot::new(building, self.source.apartments(building_id)?);
        snapshot.expenses = self.source.expenses(building_id, period)?;
        snapshot.readings = self.source.readings(building_id, period)?;
        snapshot.payments = self.ledger.paid_in_period(building_id, period)?;
        snapshot.reserve_collection = self.ledger.reserve_collection(building_id, period)?;
        Ok(snapshot)
    }
}

/// Error raised by the charges service.
#[derive(Debug, thiserror::Error)]
pub enum ChargesServiceError {
    #[error("building {0} not found")]
    BuildingNotFound(BuildingId),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
