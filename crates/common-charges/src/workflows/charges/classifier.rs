use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use super::domain::{
    AllocationError, BuildingId, ExpenseBucket, ExpenseCategory, ExpenseRecord, Period,
};
use super::money::to_cents;

/// A period's expenses partitioned into the buckets each distributor consumes.
///
/// Category sums are rounded to the cent once, after summing, so no per-record
/// rounding can leak into the totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedExpenses {
    pub operational_cents: i64,
    pub heating_cents: i64,
    pub management_fee_cents: i64,
    /// Management fees for the current or a later month; not yet billable.
    pub deferred_management_fee_cents: i64,
    pub deferred: Vec<ExpenseRecord>,
}

pub fn classify(
    building_id: BuildingId,
    period: &Period,
    expenses: &[ExpenseRecord],
    as_of: NaiveDate,
) -> Result<ClassifiedExpenses, AllocationError> {
    let mut sums: BTreeMap<ExpenseCategory, Decimal> = BTreeMap::new();
    let mut deferred_sum = Decimal::ZERO;
    let mut deferred = Vec::new();

    for expense in expenses {
        if expense.building_id != building_id || !period.contains(expense.date) {
            continue;
        }
        if expense.amount.is_sign_negative() && !expense.amount.is_zero() {
            return Err(AllocationError::input_range(
                format!("expenses[{}].amount", expense.category.tag()),
                format!("{} dated {} is negative", expense.amount, expense.date),
            ));
        }

        if expense.category.bucket() == ExpenseBucket::ManagementFee
            && !is_billable_fee_month(expense.date, as_of)
        {
            deferred_sum += expense.amount;
            deferred.push(expense.clone());
            continue;
        }

        *sums.entry(expense.category).or_insert(Decimal::ZERO) += expense.amount;
    }

    let mut classified = ClassifiedExpenses {
        deferred_management_fee_cents: cents(deferred_sum, "management_fee")?,
        deferred,
        ..ClassifiedExpenses::default()
    };

    for (category, amount) in sums {
        let amount_cents = cents(amount, category.tag())?;
        match category.bucket() {
            ExpenseBucket::Operational => classified.operational_cents += amount_cents,
            ExpenseBucket::Heating => classified.heating_cents += amount_cents,
            ExpenseBucket::ManagementFee => classified.management_fee_cents += amount_cents,
        }
    }

    Ok(classified)
}

/// Only fees for months strictly before the month of `as_of` count as billed.
pub fn is_billable_fee_month(fee_date: NaiveDate, as_of: NaiveDate) -> bool {
    month_index(fee_date) < month_index(as_of)
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn cents(amount: Decimal, field: &str) -> Result<i64, AllocationError> {
    to_cents(amount).ok_or_else(|| {
        AllocationError::input_range(
            format!("expenses[{field}].amount"),
            format!("{amount} cannot be represented in cents"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn expense(category: ExpenseCategory, amount: Decimal, on: NaiveDate) -> ExpenseRecord {
        ExpenseRecord {
            building_id: BuildingId(1),
            category,
            amount,
            date: on,
            description: String::new(),
        }
    }

    fn september() -> Period {
        Period::new(date(2025, 9, 1), date(2025, 9, 30)).expect("valid period")
    }

    #[test]
    fn partitions_expenses_into_buckets() {
        let expenses = vec![
            expense(ExpenseCategory::Water, dec!(40.10), date(2025, 9, 3)),
            expense(ExpenseCategory::Cleaning, dec!(59.90), date(2025, 9, 15)),
            expense(ExpenseCategory::HeatingOil, dec!(250.00), date(2025, 9, 20)),
            expense(ExpenseCategory::ManagementFee, dec!(80.00), date(2025, 9, 30)),
        ];

        let classified =
            classify(BuildingId(1), &september(), &expenses, date(2025, 11, 2)).expect("valid");

        assert_eq!(classified.operational_cents, 10_000);
        assert_eq!(classified.heating_cents, 25_000);
        assert_eq!(classified.management_fee_cents, 8_000);
    }

    #[test]
    fn ignores_other_buildings_and_dates_outside_period() {
        let mut foreign = expense(ExpenseCategory::Water, dec!(10), date(2025, 9, 3));
        foreign.building_id = BuildingId(2);
        let expenses = vec![
            foreign,
            expense(ExpenseCategory::Water, dec!(10), date(2025, 8, 31)),
            expense(ExpenseCategory::Water, dec!(10), date(2025, 10, 1)),
            expense(ExpenseCategory::Water, dec!(10), date(2025, 9, 30)),
        ];

        let classified =
            classify(BuildingId(1), &september(), &expenses, date(2025, 10, 5)).expect("valid");
        assert_eq!(classified.operational_cents, 1_000);
    }

    #[test]
    fn current_month_management_fee_is_deferred() {
        let expenses = vec![expense(
            ExpenseCategory::ManagementFee,
            dec!(80),
            date(2025, 9, 1),
        )];

        let classified =
            classify(BuildingId(1), &september(), &expenses, date(2025, 9, 18)).expect("valid");
        assert_eq!(classified.management_fee_cents, 0);
        assert_eq!(classified.deferred_management_fee_cents, 8_000);
        assert_eq!(classified.deferred.len(), 1);
    }

    #[test]
    fn prior_month_management_fee_is_billable() {
        assert!(is_billable_fee_month(date(2025, 8, 31), date(2025, 9, 1)));
        assert!(is_billable_fee_month(date(2024, 12, 15), date(2025, 1, 2)));
        assert!(!is_billable_fee_month(date(2025, 9, 1), date(2025, 9, 30)));
        assert!(!is_billable_fee_month(date(2025, 10, 1), date(2025, 9, 30)));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let expenses = vec![expense(ExpenseCategory::Water, dec!(-1), date(2025, 9, 3))];
        let result = classify(BuildingId(1), &september(), &expenses, date(2025, 10, 1));
        assert!(matches!(result, Err(AllocationError::InputRange { .. })));
    }

    #[test]
    fn rounding_happens_once_per_category() {
        let expenses = vec![
            expense(ExpenseCategory::Water, dec!(0.004), date(2025, 9, 3)),
            expense(ExpenseCategory::Water, dec!(0.004), date(2025, 9, 4)),
        ];
        let classified =
            classify(BuildingId(1), &september(), &expenses, date(2025, 10, 1)).expect("valid");
        assert_eq!(classified.operational_cents, 1);
    }
}
