//! Common charges allocation: splits a building's period expenses across its
//! apartments by participation mills, heating policy and reserve-fund plan.

pub mod classifier;
pub mod domain;
pub mod engine;
pub mod heating;
pub mod import;
pub mod mills;
pub mod money;
pub mod notices;
pub mod participation;
pub mod repository;
pub mod reserve;
pub mod router;
pub mod service;
pub mod statement;

#[cfg(test)]
mod tests;

pub use classifier::{classify, is_billable_fee_month, ClassifiedExpenses};
pub use domain::{
    AllocationError, Apartment, ApartmentId, Building, BuildingId, ExpenseBucket,
    ExpenseCategory, ExpenseRecord, HeatingSystem, ManagementFeeSplit, MeterReading, Period,
};
pub use engine::{AllocationEngine, ChargesSnapshot};
pub use heating::{distribute_heating, HeatingAllocation, HeatingPolicy, HeatingShare, MeterKind};
pub use import::{ChargesDataset, ImportError, PaymentRecord, ReserveSuspension};
pub use mills::{distribute, distribute_by_mills, distribute_by_weight, CentShares, DistributionError};
pub use notices::{
    BoundNotice, NoticeAudience, NoticeContext, NoticeTemplate, TemplateError, TemplateVariable,
    VariableScope,
};
pub use participation::{Participant, ParticipationRoster, MAX_PARTICIPATION_MILLS};
pub use repository::{
    BuildingDirectory, ChargesDataSource, ExpenseStore, MeterReadingStore, NoLedger,
    PaymentLedger, RepositoryError,
};
pub use reserve::{
    allocate_reserve, contribution, monthly_reserve_target, ReserveAllocation, ReserveCollection,
    ReserveFundMode, ReserveFundPolicy, ReserveSchedule,
};
pub use router::{charges_router, CalculateRequest};
pub use service::{ChargesService, ChargesServiceError};
pub use statement::{
    ApartmentCharges, ChargeBreakdown, ChargeErrors, ChargeTotals, ChargesStatement,
    HeatingSummary, LegacyDueDivergence, ReserveFundStatus,
};
