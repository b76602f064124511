use crate::error::{ConsolidationError, Result};
use crate::numeric::checked_sum;
use crate::period::FiscalQuarter;
use crate::report::PeriodReport;
use crate::schema::AccountBehavior;
use crate::table::{ConsolidatedTotals, CumulativeTable};
use rust_decimal::Decimal;

/// The part of the consolidated total not explained by the known entities.
///
/// `None` when the known sum or the difference leaves the `Decimal` range.
pub fn residual(known: &[Decimal], consolidated: Decimal) -> Option<Decimal> {
    checked_sum(known.iter().copied()).and_then(|known_sum| consolidated.checked_sub(known_sum))
}

/// Other-entity cumulative amount for one cell.
///
/// A missing consolidated figure is an error, not a zero: defaulting it
/// would push the entire known-entity sum into "other" with a flipped sign.
pub fn reconcile_cell(
    account: &str,
    period: FiscalQuarter,
    known: &[Decimal],
    consolidated: Option<Decimal>,
) -> Result<Decimal> {
    let consolidated = consolidated.ok_or_else(|| ConsolidationError::MissingReferenceData {
        account: account.to_string(),
        fiscal_year: period.fiscal_year,
        quarter: period.quarter.number(),
    })?;

    residual(known, consolidated).ok_or_else(|| ConsolidationError::ArithmeticOverflow {
        context: format!("{} / reconciliation / {}", account, period),
    })
}

/// Attributes the gap between the known entities and the consolidated total
/// to the synthetic other entity, one quarter at a time.
///
/// Every quarter is reconciled from its own cumulative figures; the other
/// entity's quarter amounts come from decomposing the reconciled series, never
/// from differencing already decomposed values.
pub struct EntityReconciler<'a> {
    known_entities: &'a [String],
    cumulative: &'a CumulativeTable,
    consolidated: &'a ConsolidatedTotals,
}

impl<'a> EntityReconciler<'a> {
    pub fn new(
        known_entities: &'a [String],
        cumulative: &'a CumulativeTable,
        consolidated: &'a ConsolidatedTotals,
    ) -> Self {
        Self {
            known_entities,
            cumulative,
            consolidated,
        }
    }

    pub fn known_amounts(&self, account: &str, period: FiscalQuarter) -> Vec<Decimal> {
        self.known_entities
            .iter()
            .map(|entity| self.cumulative.amount(account, entity, period))
            .collect()
    }

    pub fn reconcile_cell(&self, account: &str, period: FiscalQuarter) -> Result<Decimal> {
        reconcile_cell(
            account,
            period,
            &self.known_amounts(account, period),
            self.consolidated.get(account, period),
        )
    }

    /// Reconciles each period independently; a failure in one period leaves
    /// the others untouched.
    pub fn reconcile_series(
        &self,
        account: &str,
        periods: &[FiscalQuarter],
    ) -> Vec<Result<Decimal>> {
        periods
            .iter()
            .map(|period| self.reconcile_cell(account, *period))
            .collect()
    }
}

/// Re-checks a finished report: known entities plus other must equal the
/// consolidated total exactly, and flow quarters must add up to the latest
/// year-to-date amount for every entity.
pub fn verify_report(report: &PeriodReport) -> Result<()> {
    for (account, account_report) in &report.accounts {
        for (period, cell) in &account_report.periods {
            if let (Some(other), Some(consolidated)) = (cell.other.cumulative, cell.consolidated) {
                let known_sum = cell
                    .known_cumulative_sum()
                    .ok_or_else(|| overflow(account, period.to_string()))?;
                if known_sum.checked_add(other) != Some(consolidated) {
                    return Err(ConsolidationError::ReconciliationViolation {
                        account: account.clone(),
                        period: period.to_string(),
                        known_sum,
                        other,
                        consolidated,
                    });
                }
            }
        }

        if account_report.behavior != AccountBehavior::Flow {
            continue;
        }

        let years: Vec<i32> = account_report
            .periods
            .keys()
            .map(|p| p.fiscal_year)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        for fiscal_year in years {
            let cells: Vec<_> = account_report
                .periods
                .iter()
                .filter(|(p, _)| p.fiscal_year == fiscal_year)
                .map(|(_, cell)| cell)
                .collect();

            let Some(last) = cells.last() else {
                continue;
            };

            for entity in &report.entities {
                let discrete_sum = checked_sum(
                    cells
                        .iter()
                        .filter_map(|c| c.entities.get(entity))
                        .map(|v| v.discrete),
                )
                .ok_or_else(|| overflow(account, fiscal_year.to_string()))?;
                let cumulative = last
                    .entities
                    .get(entity)
                    .map(|v| v.cumulative)
                    .unwrap_or(Decimal::ZERO);

                if discrete_sum != cumulative {
                    return Err(ConsolidationError::AdditivityViolation {
                        account: account.clone(),
                        entity: entity.clone(),
                        fiscal_year,
                        discrete_sum,
                        cumulative,
                    });
                }
            }

            let other_discrete: Option<Vec<Decimal>> =
                cells.iter().map(|c| c.other.discrete).collect();
            if let (Some(discretes), Some(cumulative)) = (other_discrete, last.other.cumulative) {
                let discrete_sum = checked_sum(discretes)
                    .ok_or_else(|| overflow(account, fiscal_year.to_string()))?;
                if discrete_sum != cumulative {
                    return Err(ConsolidationError::AdditivityViolation {
                        account: account.clone(),
                        entity: report.other_entity.clone(),
                        fiscal_year,
                        discrete_sum,
                        cumulative,
                    });
                }
            }
        }
    }

    Ok(())
}

fn overflow(account: &str, period: String) -> ConsolidationError {
    ConsolidationError::ArithmeticOverflow {
        context: format!("{} / verification / {}", account, period),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Quarter;
    use rust_decimal_macros::dec;

    fn period(quarter: Quarter) -> FiscalQuarter {
        FiscalQuarter::new(2025, quarter)
    }

    fn fixture() -> (Vec<String>, CumulativeTable, ConsolidatedTotals) {
        let known = vec!["A".to_string(), "B".to_string()];

        let mut table = CumulativeTable::new();
        table.add("revenue", "A", period(Quarter::Q1), dec!(100)).unwrap();
        table.add("revenue", "B", period(Quarter::Q1), dec!(50)).unwrap();
        table.add("revenue", "A", period(Quarter::Q2), dec!(300)).unwrap();
        table.add("revenue", "B", period(Quarter::Q2), dec!(150)).unwrap();

        let mut totals = ConsolidatedTotals::new();
        totals.add("revenue", period(Quarter::Q1), dec!(170)).unwrap();
        totals.add("revenue", period(Quarter::Q2), dec!(500)).unwrap();

        (known, table, totals)
    }

    #[test]
    fn test_residual_is_exact() {
        let known = [dec!(333333333333.33), dec!(0.01), dec!(-12)];
        let consolidated = dec!(1000000000000);
        let other = residual(&known, consolidated).unwrap();
        assert_eq!(other + known.iter().sum::<Decimal>(), consolidated);
        assert_eq!(residual(&[Decimal::MAX, Decimal::MAX], Decimal::ZERO), None);
        assert_eq!(residual(&[Decimal::MAX], Decimal::MIN), None);
    }

    #[test]
    fn test_missing_total_is_not_negated_known_sum() {
        let period = FiscalQuarter::new(2024, Quarter::Q2);
        let result = reconcile_cell("cost", period, &[dec!(10), dec!(5)], None);
        assert!(matches!(
            result,
            Err(ConsolidationError::MissingReferenceData { quarter: 2, .. })
        ));

        let present = reconcile_cell("cost", period, &[dec!(10), dec!(5)], Some(dec!(15)));
        assert_eq!(present.unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_reconciliation_with_gap() {
        let (known, table, totals) = fixture();
        let reconciler = EntityReconciler::new(&known, &table, &totals);

        assert_eq!(reconciler.reconcile_cell("revenue", period(Quarter::Q1)).unwrap(), dec!(20));
        assert_eq!(reconciler.reconcile_cell("revenue", period(Quarter::Q2)).unwrap(), dec!(50));
    }

    #[test]
    fn test_missing_reference_is_reported() {
        let (known, table, totals) = fixture();
        let reconciler = EntityReconciler::new(&known, &table, &totals);

        let results = reconciler.reconcile_series(
            "revenue",
            &[period(Quarter::Q1), period(Quarter::Q2), period(Quarter::Q3)],
        );

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        match &results[2] {
            Err(ConsolidationError::MissingReferenceData {
                account,
                fiscal_year,
                quarter,
            }) => {
                assert_eq!(account, "revenue");
                assert_eq!(*fiscal_year, 2025);
                assert_eq!(*quarter, 3);
            }
            other => panic!("expected MissingReferenceData, got {:?}", other),
        }
    }

    #[test]
    fn test_only_known_entities_are_summed() {
        let (known, mut table, totals) = fixture();
        table.add("revenue", "Unlisted", period(Quarter::Q2), dec!(45)).unwrap();
        let reconciler = EntityReconciler::new(&known, &table, &totals);

        assert_eq!(reconciler.reconcile_cell("revenue", period(Quarter::Q2)).unwrap(), dec!(50));
    }
}
