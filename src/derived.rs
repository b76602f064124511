use crate::error::Result;
use crate::numeric::checked_sum;
use crate::period::FiscalQuarter;
use crate::report::Diagnostic;
use crate::schema::{DerivedAccount, TermSign};
use crate::table::{ConsolidatedTotals, CumulativeTable};
use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

fn signed(amount: Decimal, sign: TermSign) -> Decimal {
    match sign {
        TermSign::Add => amount,
        TermSign::Subtract => -amount,
    }
}

/// Input tables with the derived accounts added.
#[derive(Debug, Clone, Default)]
pub struct DerivedTables {
    pub cumulative: CumulativeTable,
    pub consolidated: ConsolidatedTotals,
    pub diagnostics: Vec<Diagnostic>,
}

/// Adds the derived accounts to both tables, in definition order, so a later
/// definition can build on an earlier one.
///
/// Entity amounts are computed from cumulative figures with absent terms
/// counting as zero. A consolidated figure is only produced for a quarter in
/// which every term has one; otherwise the derived total stays missing.
/// Any rows already present under a derived key are replaced.
///
/// A derived amount that leaves the `Decimal` range is left out and reported
/// as [`Diagnostic::AmountOverflow`].
pub fn apply_derived_accounts(
    derived_accounts: &[DerivedAccount],
    cumulative: &CumulativeTable,
    consolidated: &ConsolidatedTotals,
) -> Result<DerivedTables> {
    let mut cumulative = cumulative.clone();
    let mut consolidated = consolidated.clone();
    let mut diagnostics = Vec::new();

    for derived in derived_accounts {
        let mut entity_amounts: BTreeMap<(String, FiscalQuarter), Option<Decimal>> =
            BTreeMap::new();
        for term in &derived.terms {
            for (entity, period, amount) in cumulative.account_cells(&term.account) {
                let slot = entity_amounts
                    .entry((entity.to_string(), period))
                    .or_insert(Some(Decimal::ZERO));
                *slot = slot.and_then(|total| total.checked_add(signed(amount, term.sign)));
            }
        }

        let term_periods: BTreeSet<FiscalQuarter> = derived
            .terms
            .iter()
            .filter_map(|term| consolidated.account_periods(&term.account))
            .flat_map(|periods| periods.keys().copied())
            .collect();

        let mut totals: Vec<(FiscalQuarter, Decimal)> = Vec::new();
        for period in term_periods {
            let values: Option<Vec<Decimal>> = derived
                .terms
                .iter()
                .map(|term| {
                    consolidated
                        .get(&term.account, period)
                        .map(|amount| signed(amount, term.sign))
                })
                .collect();

            let Some(values) = values else {
                debug!(
                    "Derived account '{}' has no consolidated total for {}: a term is missing",
                    derived.key, period
                );
                continue;
            };

            match checked_sum(values) {
                Some(total) => totals.push((period, total)),
                None => {
                    let context = format!("{} / consolidated / {}", derived.key, period);
                    warn!("Derived total out of range at {}; left missing", context);
                    diagnostics.push(Diagnostic::AmountOverflow { context });
                }
            }
        }

        cumulative.remove_account(&derived.key);
        consolidated.remove_account(&derived.key);

        for ((entity, period), amount) in entity_amounts {
            match amount {
                Some(amount) => cumulative.add(&derived.key, &entity, period, amount)?,
                None => {
                    let context = format!("{} / {} / {}", derived.key, entity, period);
                    warn!("Derived amount out of range at {}; left out", context);
                    diagnostics.push(Diagnostic::AmountOverflow { context });
                }
            }
        }
        for (period, amount) in totals {
            consolidated.add(&derived.key, period, amount)?;
        }

        debug!(
            "Derived account '{}' built from {} terms",
            derived.key,
            derived.terms.len()
        );
    }

    Ok(DerivedTables {
        cumulative,
        consolidated,
        diagnostics,
    })
}
