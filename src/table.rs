use crate::error::{ConsolidationError, Result};
use crate::period::{FiscalQuarter, Quarter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One year-to-date amount for a known entity, as delivered by an extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeRecord {
    pub account: String,
    pub entity: String,
    pub fiscal_year: i32,
    pub quarter: Quarter,
    pub cumulative_amount: Decimal,
}

/// The authoritative consolidated year-to-date figure for an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedRecord {
    pub account: String,
    pub fiscal_year: i32,
    pub quarter: Quarter,
    pub consolidated_cumulative_amount: Decimal,
}

pub type PeriodAmounts = BTreeMap<FiscalQuarter, Decimal>;

/// Cumulative amounts keyed account -> entity -> fiscal quarter.
///
/// Adding to an existing cell sums, so several source columns can roll up into
/// one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CumulativeTable {
    cells: BTreeMap<String, BTreeMap<String, PeriodAmounts>>,
}

impl CumulativeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[CumulativeRecord]) -> Result<Self> {
        let mut table = Self::new();
        for record in records {
            table.add(
                &record.account,
                &record.entity,
                FiscalQuarter::new(record.fiscal_year, record.quarter),
                record.cumulative_amount,
            )?;
        }
        Ok(table)
    }

    /// Adds to the cell, failing with `ArithmeticOverflow` instead of
    /// wrapping or panicking. A failed add leaves the cell unchanged.
    pub fn add(
        &mut self,
        account: &str,
        entity: &str,
        period: FiscalQuarter,
        amount: Decimal,
    ) -> Result<()> {
        let cell = self
            .cells
            .entry(account.to_string())
            .or_default()
            .entry(entity.to_string())
            .or_default()
            .entry(period)
            .or_insert(Decimal::ZERO);

        *cell = cell
            .checked_add(amount)
            .ok_or_else(|| overflow(format!("{} / {} / {}", account, entity, period)))?;
        Ok(())
    }

    pub fn get(&self, account: &str, entity: &str, period: FiscalQuarter) -> Option<Decimal> {
        self.cells
            .get(account)
            .and_then(|entities| entities.get(entity))
            .and_then(|periods| periods.get(&period))
            .copied()
    }

    /// The cumulative amount, with an absent cell counting as zero.
    pub fn amount(&self, account: &str, entity: &str, period: FiscalQuarter) -> Decimal {
        self.get(account, entity, period).unwrap_or(Decimal::ZERO)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn entities_for(&self, account: &str) -> impl Iterator<Item = &str> {
        self.cells
            .get(account)
            .into_iter()
            .flat_map(|entities| entities.keys().map(String::as_str))
    }

    /// Every `(entity, period, amount)` recorded for `account`.
    pub fn account_cells<'a>(
        &'a self,
        account: &str,
    ) -> impl Iterator<Item = (&'a str, FiscalQuarter, Decimal)> + 'a {
        self.cells
            .get(account)
            .into_iter()
            .flat_map(|entities| entities.iter())
            .flat_map(|(entity, periods)| {
                periods
                    .iter()
                    .map(move |(period, amount)| (entity.as_str(), *period, *amount))
            })
    }

    pub fn remove_account(&mut self, account: &str) {
        self.cells.remove(account);
    }

    pub fn periods(&self) -> BTreeSet<FiscalQuarter> {
        self.cells
            .values()
            .flat_map(|entities| entities.values())
            .flat_map(|periods| periods.keys().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cells
            .values()
            .flat_map(|entities| entities.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consolidated cumulative totals keyed account -> fiscal quarter.
///
/// An absent cell means no figure was delivered, which is different from a
/// delivered zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidatedTotals {
    cells: BTreeMap<String, PeriodAmounts>,
}

impl ConsolidatedTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[ConsolidatedRecord]) -> Result<Self> {
        let mut totals = Self::new();
        for record in records {
            totals.add(
                &record.account,
                FiscalQuarter::new(record.fiscal_year, record.quarter),
                record.consolidated_cumulative_amount,
            )?;
        }
        Ok(totals)
    }

    pub fn add(&mut self, account: &str, period: FiscalQuarter, amount: Decimal) -> Result<()> {
        let cell = self
            .cells
            .entry(account.to_string())
            .or_default()
            .entry(period)
            .or_insert(Decimal::ZERO);

        *cell = cell
            .checked_add(amount)
            .ok_or_else(|| overflow(format!("{} / consolidated / {}", account, period)))?;
        Ok(())
    }

    pub fn get(&self, account: &str, period: FiscalQuarter) -> Option<Decimal> {
        self.cells
            .get(account)
            .and_then(|periods| periods.get(&period))
            .copied()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn account_periods(&self, account: &str) -> Option<&PeriodAmounts> {
        self.cells.get(account)
    }

    pub fn remove_account(&mut self, account: &str) {
        self.cells.remove(account);
    }

    pub fn periods(&self) -> BTreeSet<FiscalQuarter> {
        self.cells
            .values()
            .flat_map(|periods| periods.keys().copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn overflow(context: String) -> ConsolidationError {
    ConsolidationError::ArithmeticOverflow { context }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn period(year: i32, quarter: Quarter) -> FiscalQuarter {
        FiscalQuarter::new(year, quarter)
    }

    #[test]
    fn test_absent_cell_counts_as_zero() {
        let mut table = CumulativeTable::new();
        table.add("revenue", "A", period(2024, Quarter::Q1), dec!(100)).unwrap();

        assert_eq!(table.get("revenue", "A", period(2024, Quarter::Q2)), None);
        assert_eq!(
            table.amount("revenue", "A", period(2024, Quarter::Q2)),
            Decimal::ZERO
        );
        assert_eq!(table.amount("revenue", "A", period(2024, Quarter::Q1)), dec!(100));
    }

    #[test]
    fn test_repeated_cells_are_summed() {
        let records = vec![
            CumulativeRecord {
                account: "revenue".to_string(),
                entity: "US".to_string(),
                fiscal_year: 2025,
                quarter: Quarter::Q1,
                cumulative_amount: dec!(40),
            },
            CumulativeRecord {
                account: "revenue".to_string(),
                entity: "US".to_string(),
                fiscal_year: 2025,
                quarter: Quarter::Q1,
                cumulative_amount: dec!(2),
            },
        ];

        let table = CumulativeTable::from_records(&records).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.amount("revenue", "US", period(2025, Quarter::Q1)), dec!(42));
    }

    #[test]
    fn test_consolidated_distinguishes_absent_from_zero() {
        let totals = ConsolidatedTotals::from_records(&[ConsolidatedRecord {
            account: "revenue".to_string(),
            fiscal_year: 2025,
            quarter: Quarter::Q1,
            consolidated_cumulative_amount: Decimal::ZERO,
        }])
        .unwrap();

        assert_eq!(totals.get("revenue", period(2025, Quarter::Q1)), Some(Decimal::ZERO));
        assert_eq!(totals.get("revenue", period(2025, Quarter::Q2)), None);
        assert_eq!(totals.get("cost", period(2025, Quarter::Q1)), None);
    }

    #[test]
    fn test_periods_and_entities() {
        let mut table = CumulativeTable::new();
        table.add("revenue", "A", period(2024, Quarter::Q4), dec!(10)).unwrap();
        table.add("cost", "B", period(2025, Quarter::Q2), dec!(5)).unwrap();

        let periods: Vec<FiscalQuarter> = table.periods().into_iter().collect();
        assert_eq!(
            periods,
            vec![period(2024, Quarter::Q4), period(2025, Quarter::Q2)]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.entities_for("cost").collect::<Vec<_>>(), vec!["B"]);
        assert_eq!(table.entities_for("missing").count(), 0);
    }

    #[test]
    fn test_overflowing_add_is_an_error() {
        let q1 = period(2025, Quarter::Q1);
        let mut table = CumulativeTable::new();
        table.add("revenue", "ST", q1, Decimal::MAX).unwrap();

        let result = table.add("revenue", "ST", q1, Decimal::MAX);
        assert!(matches!(
            result,
            Err(ConsolidationError::ArithmeticOverflow { .. })
        ));
        assert_eq!(table.get("revenue", "ST", q1), Some(Decimal::MAX));

        let mut totals = ConsolidatedTotals::new();
        totals.add("revenue", q1, Decimal::MIN).unwrap();
        assert!(totals.add("revenue", q1, Decimal::MIN).is_err());
    }
}
