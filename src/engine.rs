use crate::decomposer::PeriodDecomposer;
use crate::derived::{apply_derived_accounts, DerivedTables};
use crate::error::{ConsolidationError, Result};
use crate::period::{FiscalQuarter, Quarter};
use crate::reconciler::EntityReconciler;
use crate::report::{
    AccountReport, Diagnostic, EntityPeriodValue, PeriodCell, PeriodReport, ResidualPeriodValue,
};
use crate::schema::{AccountBehavior, ReportConfig};
use crate::table::{ConsolidatedTotals, CumulativeTable};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// Builds a [`PeriodReport`] from immutable input tables.
pub struct ReportEngine<'a> {
    config: &'a ReportConfig,
    known_entities: Vec<String>,
}

impl<'a> ReportEngine<'a> {
    pub fn new(config: &'a ReportConfig) -> Self {
        Self {
            config,
            known_entities: config.entity_keys(),
        }
    }

    pub fn build(
        &self,
        cumulative: &CumulativeTable,
        consolidated: &ConsolidatedTotals,
    ) -> Result<PeriodReport> {
        self.config.validate()?;

        let DerivedTables {
            cumulative,
            consolidated,
            diagnostics: derived_diagnostics,
        } = apply_derived_accounts(&self.config.derived_accounts, cumulative, consolidated)?;

        let behaviors = self.config.account_behaviors();
        let mut diagnostics = self.scope_diagnostics(&behaviors, &cumulative, &consolidated);
        diagnostics.extend(derived_diagnostics);
        let last_quarters = last_quarter_per_year(&cumulative, &consolidated);

        let mut accounts = BTreeMap::new();
        for (account, behavior) in &behaviors {
            let periods = account_coverage(account, &cumulative, &consolidated, &last_quarters);
            if periods.is_empty() {
                debug!("Account '{}' has no data; skipped", account);
                continue;
            }

            let report = self.build_account(
                account,
                *behavior,
                &periods,
                &cumulative,
                &consolidated,
                &mut diagnostics,
            )?;
            accounts.insert(account.clone(), report);
        }

        info!(
            "Built {} accounts for {} with {} diagnostics",
            accounts.len(),
            self.config.organization_name,
            diagnostics.len()
        );

        Ok(PeriodReport {
            organization_name: self.config.organization_name.clone(),
            other_entity: self.config.other_entity.clone(),
            entities: self.known_entities.clone(),
            accounts,
            diagnostics,
        })
    }

    fn scope_diagnostics(
        &self,
        behaviors: &BTreeMap<String, AccountBehavior>,
        cumulative: &CumulativeTable,
        consolidated: &ConsolidatedTotals,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        let input_accounts: BTreeSet<&str> =
            cumulative.accounts().chain(consolidated.accounts()).collect();

        for account in input_accounts {
            if !behaviors.contains_key(account) {
                warn!("Account '{}' is not configured and was skipped", account);
                diagnostics.push(Diagnostic::UnconfiguredAccount {
                    account: account.to_string(),
                });
                continue;
            }

            for entity in cumulative.entities_for(account) {
                if !self.known_entities.iter().any(|known| known == entity) {
                    warn!(
                        "Entity '{}' in '{}' is not configured; its amounts fall into '{}'",
                        entity, account, self.config.other_entity
                    );
                    diagnostics.push(Diagnostic::UnlistedEntity {
                        account: account.to_string(),
                        entity: entity.to_string(),
                    });
                }
            }
        }

        diagnostics
    }

    fn build_account(
        &self,
        account: &str,
        behavior: AccountBehavior,
        periods: &[FiscalQuarter],
        cumulative: &CumulativeTable,
        consolidated: &ConsolidatedTotals,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<AccountReport> {
        let decomposer = PeriodDecomposer::new(behavior);
        let reconciler = EntityReconciler::new(&self.known_entities, cumulative, consolidated);

        let mut cells = BTreeMap::new();

        let years: BTreeSet<i32> = periods.iter().map(|p| p.fiscal_year).collect();
        for fiscal_year in years {
            let year_periods: Vec<FiscalQuarter> = periods
                .iter()
                .copied()
                .filter(|p| p.fiscal_year == fiscal_year)
                .collect();

            let mut entity_series: BTreeMap<&str, (Vec<Decimal>, Vec<Decimal>)> = BTreeMap::new();
            let mut overflowed = false;
            for entity in &self.known_entities {
                let series: Vec<Decimal> = year_periods
                    .iter()
                    .map(|p| cumulative.amount(account, entity, *p))
                    .collect();
                match decomposer.discrete_values(&series) {
                    Some(discrete) => {
                        entity_series.insert(entity.as_str(), (series, discrete));
                    }
                    None => {
                        let context = format!("{} / {} / {}", account, entity, fiscal_year);
                        warn!("Quarter amount out of range at {}; year skipped", context);
                        diagnostics.push(Diagnostic::AmountOverflow { context });
                        overflowed = true;
                    }
                }
            }
            if overflowed {
                continue;
            }

            let mut other_cumulative: Vec<Option<Decimal>> = Vec::with_capacity(year_periods.len());
            for (period, result) in year_periods
                .iter()
                .zip(reconciler.reconcile_series(account, &year_periods))
            {
                match result {
                    Ok(other) => other_cumulative.push(Some(other)),
                    Err(ConsolidationError::MissingReferenceData { .. }) => {
                        warn!(
                            "No consolidated total for '{}' in {}; '{}' left empty",
                            account, period, self.config.other_entity
                        );
                        diagnostics.push(Diagnostic::MissingReferenceData {
                            account: account.to_string(),
                            fiscal_year: period.fiscal_year,
                            quarter: period.quarter,
                        });
                        other_cumulative.push(None);
                    }
                    Err(ConsolidationError::ArithmeticOverflow { context }) => {
                        warn!(
                            "Reconciliation out of range at {}; '{}' left empty",
                            context, self.config.other_entity
                        );
                        diagnostics.push(Diagnostic::AmountOverflow { context });
                        other_cumulative.push(None);
                    }
                    Err(e) => return Err(e),
                }
            }
            let other_discrete = decomposer.discrete_values_with_gaps(&other_cumulative);

            for (idx, period) in year_periods.iter().enumerate() {
                let entities = entity_series
                    .iter()
                    .map(|(entity, (series, discrete))| {
                        (
                            entity.to_string(),
                            EntityPeriodValue {
                                discrete: discrete[idx],
                                cumulative: series[idx],
                            },
                        )
                    })
                    .collect();

                cells.insert(
                    *period,
                    PeriodCell {
                        period_end: period.end_date(self.config.fiscal_year_end_month)?,
                        consolidated: consolidated.get(account, *period),
                        entities,
                        other: ResidualPeriodValue {
                            discrete: other_discrete[idx],
                            cumulative: other_cumulative[idx],
                        },
                    },
                );
            }
        }

        debug!(
            "Account '{}' ({:?}): {} quarters reconciled",
            account,
            behavior,
            cells.len()
        );

        Ok(AccountReport {
            account: account.to_string(),
            behavior,
            periods: cells,
        })
    }
}

/// The highest quarter reported for each fiscal year anywhere in the inputs.
fn last_quarter_per_year(
    cumulative: &CumulativeTable,
    consolidated: &ConsolidatedTotals,
) -> BTreeMap<i32, Quarter> {
    let mut last: BTreeMap<i32, Quarter> = BTreeMap::new();
    for period in cumulative.periods().into_iter().chain(consolidated.periods()) {
        let entry = last.entry(period.fiscal_year).or_insert(period.quarter);
        if period.quarter > *entry {
            *entry = period.quarter;
        }
    }
    last
}

/// Quarters reported for `account`: every year it has data in, from Q1 up
/// to the last quarter seen for that year.
fn account_coverage(
    account: &str,
    cumulative: &CumulativeTable,
    consolidated: &ConsolidatedTotals,
    last_quarters: &BTreeMap<i32, Quarter>,
) -> Vec<FiscalQuarter> {
    let years: BTreeSet<i32> = cumulative
        .account_cells(account)
        .map(|(_, period, _)| period.fiscal_year)
        .chain(
            consolidated
                .account_periods(account)
                .into_iter()
                .flat_map(|periods| periods.keys().map(|p| p.fiscal_year)),
        )
        .collect();

    years
        .into_iter()
        .filter_map(|year| last_quarters.get(&year).map(|last| (year, *last)))
        .flat_map(|(year, last)| last.through().map(move |q| FiscalQuarter::new(year, q)))
        .collect()
}

pub fn build_report(
    config: &ReportConfig,
    cumulative: &CumulativeTable,
    consolidated: &ConsolidatedTotals,
) -> Result<PeriodReport> {
    ReportEngine::new(config).build(cumulative, consolidated)
}
