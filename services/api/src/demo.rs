use crate::infra::InMemoryChargesStore;
use chrono::{Local, NaiveDate};
use clap::Args;
use common_charges::config::AppConfig;
use common_charges::error::AppError;
use common_charges::workflows::charges::{
    Apartment, ApartmentId, Building, BuildingId, ChargesDataset, ChargesService,
    ChargesStatement, ExpenseCategory, ExpenseRecord, HeatingSystem, ManagementFeeSplit,
    MeterReading, NoticeAudience, NoticeContext, NoticeTemplate, PaymentRecord,
    ReserveSuspension,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct CalculateArgs {
    /// Building identifier to calculate charges for
    #[arg(long)]
    pub(crate) building: u64,
    /// First day of the billing period (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) period_start: NaiveDate,
    /// Last day of the billing period (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) period_end: NaiveDate,
    /// Reference date for management-fee eligibility (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Directory of CSV snapshots (overrides CHARGES_DATA_DIR; sample data when neither is set)
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Print the statement as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reference date for management-fee eligibility (defaults to 2025-10-05)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Skip the notice binding portion of the demo
    #[arg(long)]
    pub(crate) skip_notices: bool,
}

pub(crate) fn run_calculate(args: CalculateArgs) -> Result<(), AppError> {
    let CalculateArgs {
        building,
        period_start,
        period_end,
        as_of,
        data_dir,
        json,
    } = args;

    let data_dir = match data_dir {
        Some(dir) => Some(dir),
        None => AppConfig::load()?.data.data_dir,
    };
    let dataset = match data_dir {
        Some(dir) => ChargesDataset::from_dir(dir)?,
        None => sample_dataset(),
    };

    let store = Arc::new(InMemoryChargesStore::new(dataset));
    let service = ChargesService::new(store.clone(), store);
    let as_of = as_of.unwrap_or_else(|| Local::now().date_naive());
    let statement =
        service.calculate_advanced(BuildingId(building), period_start, period_end, as_of)?;

    if json {
        match serde_json::to_string_pretty(&statement) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("Statement payload unavailable: {err}"),
        }
    } else {
        render_statement(&statement);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        as_of,
        skip_notices,
    } = args;

    let dataset = sample_dataset();
    let buildings = dataset.buildings.clone();
    let store = Arc::new(InMemoryChargesStore::new(dataset));
    let service = ChargesService::new(store.clone(), store);
    let as_of = as_of.unwrap_or_else(|| sample_date(2025, 10, 5));

    println!("Common charges demo (as of {as_of})");
    let mut contexts = Vec::new();
    for building in &buildings {
        println!("\n{} (building {})", building.name, building.building_id);
        let statement = service.calculate_advanced(
            building.building_id,
            sample_date(2025, 9, 1),
            sample_date(2025, 9, 30),
            as_of,
        )?;
        render_statement(&statement);
        contexts.push(NoticeContext::from_statement(building, &statement));
    }

    if skip_notices {
        return Ok(());
    }

    println!("\nNotice templates");
    let statement_notice = NoticeTemplate::register(
        "monthly-statement",
        NoticeAudience::Apartment,
        "Apartment {{apartment_number}} of {{building_name}}: {{total_due}} due for \
         {{period_start}}..{{period_end}} ({{amount_outstanding}} outstanding).",
    );
    let broadcast = NoticeTemplate::register(
        "reserve-update",
        NoticeAudience::MultiBuilding,
        "{{building_name}} collects {{reserve_fund_target}} for its reserve fund this period.",
    );
    let leaky_broadcast = NoticeTemplate::register(
        "leaky-broadcast",
        NoticeAudience::MultiBuilding,
        "Everyone owes {{total_due}}.",
    );

    match leaky_broadcast {
        Ok(_) => println!("- leaky-broadcast unexpectedly accepted"),
        Err(err) => println!("- rejected at registration: {err}"),
    }

    for context in &contexts {
        if let Ok(template) = &broadcast {
            match template.bind(context, None) {
                Ok(notice) => println!(
                    "- {} -> building {}: {:?}",
                    notice.template, notice.building_id, notice.values
                ),
                Err(err) => println!("- {err}"),
            }
        }
        if let Ok(template) = &statement_notice {
            for apartment_id in context.apartment_ids() {
                match template.bind(context, Some(apartment_id)) {
                    Ok(notice) => println!(
                        "- {} -> apartment {}: {:?}",
                        notice.template, apartment_id, notice.values
                    ),
                    Err(err) => println!("- {err}"),
                }
            }
        }
    }

    Ok(())
}

fn render_statement(statement: &ChargesStatement) {
    println!(
        "Period {} | grand total {} | reserve {} ({:?})",
        statement.period,
        statement.totals.grand_total,
        statement.totals.reserve,
        statement.reserve_fund.status
    );
    println!(
        "{:<8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "apt", "operation", "heating", "reserve", "mgmt", "due", "open"
    );
    for share in statement.shares.values() {
        println!(
            "{:<8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            share.apartment_number,
            share.breakdown.operational,
            share.breakdown.heating(),
            share.breakdown.reserve_fund_contribution,
            share.breakdown.management_fee,
            share.total_due,
            share.total_amount
        );
    }
    if !statement.errors.missing_readings.is_empty() {
        println!(
            "Withheld {} for apartments without meter readings: {:?}",
            statement.totals.withheld, statement.errors.missing_readings
        );
    }
    if !statement.totals.management_fee_deferred.is_zero() {
        println!(
            "Deferred management fee: {}",
            statement.totals.management_fee_deferred
        );
    }
    for notice in &statement.notices {
        println!(
            "Legacy figure {} for apartment {} differs from computed {}",
            notice.legacy_monthly_due, notice.apartment_id, notice.computed_total_due
        );
    }
}

fn sample_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn amount(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Two buildings with September 2025 activity, used when no data directory is configured.
pub(crate) fn sample_dataset() -> ChargesDataset {
    let acropolis = BuildingId(1);
    let harbor = BuildingId(2);

    let apartment = |building_id, id, number: &str, mills, legacy: Option<Decimal>| Apartment {
        apartment_id: ApartmentId(id),
        building_id,
        number: number.to_string(),
        participation_mills: mills,
        active: true,
        heating_eligible: true,
        legacy_monthly_due: legacy,
    };
    let expense = |building_id, category: ExpenseCategory, cents, day| ExpenseRecord {
        building_id,
        category,
        amount: amount(cents),
        date: sample_date(2025, 9, day),
        description: category.tag().replace('_', " "),
    };
    let reading = |apartment_id, units: i64| MeterReading {
        building_id: acropolis,
        apartment_id: ApartmentId(apartment_id),
        date: sample_date(2025, 9, 30),
        units: Decimal::from(units),
    };

    ChargesDataset {
        buildings: vec![
            Building {
                building_id: acropolis,
                name: "Acropolis View".to_string(),
                heating_system: HeatingSystem::HourMeters,
                heating_fixed_percentage: Some(30),
                reserve_fund_goal: Some(amount(1_200_000)),
                reserve_fund_duration_months: Some(24),
                reserve_contribution_per_apartment: None,
                management_fee_split: ManagementFeeSplit::Equal,
            },
            Building {
                building_id: harbor,
                name: "Harbor Court".to_string(),
                heating_system: HeatingSystem::Conventional,
                heating_fixed_percentage: None,
                reserve_fund_goal: None,
                reserve_fund_duration_months: None,
                reserve_contribution_per_apartment: Some(amount(10_000)),
                management_fee_split: ManagementFeeSplit::ByMills,
            },
        ],
        apartments: vec![
            apartment(acropolis, 10, "A1", 300, None),
            apartment(acropolis, 11, "A2", 450, None),
            apartment(acropolis, 12, "B1", 250, Some(amount(8_000))),
            apartment(harbor, 20, "1", 600, None),
            apartment(harbor, 21, "2", 400, None),
        ],
        expenses: vec![
            expense(acropolis, ExpenseCategory::CommonElectricity, 12_000, 5),
            expense(acropolis, ExpenseCategory::Cleaning, 18_000, 10),
            expense(acropolis, ExpenseCategory::HeatingOil, 60_000, 15),
            expense(acropolis, ExpenseCategory::ManagementFee, 9_000, 1),
            expense(harbor, ExpenseCategory::Water, 5_000, 8),
            expense(harbor, ExpenseCategory::NaturalGas, 20_000, 12),
            expense(harbor, ExpenseCategory::ManagementFee, 4_000, 2),
        ],
        readings: vec![reading(10, 120), reading(11, 200), reading(12, 80)],
        payments: vec![PaymentRecord {
            building_id: acropolis,
            apartment_id: ApartmentId(10),
            date: sample_date(2025, 9, 20),
            amount: amount(20_000),
        }],
        reserve_suspensions: vec![ReserveSuspension {
            building_id: harbor,
            month: sample_date(2025, 9, 1),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sample_dataset_reconciles_for_both_buildings() {
        let store = Arc::new(InMemoryChargesStore::new(sample_dataset()));
        let service = ChargesService::new(store.clone(), store);

        for building in [BuildingId(1), BuildingId(2)] {
            let statement = service
                .calculate_advanced(
                    building,
                    sample_date(2025, 9, 1),
                    sample_date(2025, 9, 30),
                    sample_date(2025, 10, 5),
                )
                .expect("sample calculates");
            assert_eq!(statement.allocated_total(), statement.totals.grand_total);
        }
    }

    #[test]
    fn sample_acropolis_matches_hand_calculation() {
        let store = Arc::new(InMemoryChargesStore::new(sample_dataset()));
        let service = ChargesService::new(store.clone(), store);
        let statement = service
            .calculate_advanced(
                BuildingId(1),
                sample_date(2025, 9, 1),
                sample_date(2025, 9, 30),
                sample_date(2025, 10, 5),
            )
            .expect("sample calculates");

        let dues: Vec<_> = statement.shares.values().map(|share| share.total_due).collect();
        assert_eq!(dues, vec![dec!(450.00), dec!(681.00), dec!(359.00)]);
        assert_eq!(statement.notices.len(), 1);
    }

    #[test]
    fn suspended_harbor_reserve_is_zero() {
        let store = Arc::new(InMemoryChargesStore::new(sample_dataset()));
        let service = ChargesService::new(store.clone(), store);
        let statement = service
            .calculate_advanced(
                BuildingId(2),
                sample_date(2025, 9, 1),
                sample_date(2025, 9, 30),
                sample_date(2025, 10, 5),
            )
            .expect("sample calculates");

        assert!(statement.totals.reserve.is_zero());
        assert_eq!(statement.totals.grand_total, dec!(290.00));
    }
}
