use crate::error::Result;
use crate::numeric::checked_sum;
use crate::period::{FiscalQuarter, PeriodKey, Quarter};
use crate::scale::ScaleDeclaration;
use crate::schema::{AccountBehavior, ExportOptions};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPeriodValue {
    pub discrete: Decimal,
    pub cumulative: Decimal,
}

/// The reconciled "other" entity for one quarter.
///
/// `cumulative` is empty when the consolidated total was missing; `discrete`
/// is also empty when the previous quarter's residual was.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualPeriodValue {
    pub discrete: Option<Decimal>,
    pub cumulative: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodCell {
    pub period_end: NaiveDate,
    pub consolidated: Option<Decimal>,
    pub entities: BTreeMap<String, EntityPeriodValue>,
    pub other: ResidualPeriodValue,
}

impl PeriodCell {
    /// `None` when the sum leaves the `Decimal` range.
    pub fn known_cumulative_sum(&self) -> Option<Decimal> {
        checked_sum(self.entities.values().map(|v| v.cumulative))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountReport {
    pub account: String,
    pub behavior: AccountBehavior,
    pub periods: BTreeMap<FiscalQuarter, PeriodCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LabelKind {
    Account,
    Entity,
}

/// Data-quality findings that did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Amount text could not be parsed and was counted as zero.
    ParseFallback { context: String, original: String },
    /// No consolidated total for the cell; its "other" values are left empty.
    MissingReferenceData {
        account: String,
        fiscal_year: i32,
        quarter: Quarter,
    },
    /// The entity is not configured as known, so its amounts fall into "other".
    UnlistedEntity { account: String, entity: String },
    /// Data for an account the configuration does not report.
    UnconfiguredAccount { account: String },
    UnmappedLabel { kind: LabelKind, label: String },
    InvalidQuarter { context: String, quarter: u8 },
    /// An amount or sum left the `Decimal` range; the affected value is left out.
    AmountOverflow { context: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ParseFallback { context, original } => {
                write!(f, "unparseable amount '{}' at {} counted as 0", original, context)
            }
            Diagnostic::MissingReferenceData {
                account,
                fiscal_year,
                quarter,
            } => write!(
                f,
                "no consolidated total for '{}' in {} {}",
                account, fiscal_year, quarter
            ),
            Diagnostic::UnlistedEntity { account, entity } => write!(
                f,
                "entity '{}' in '{}' is not configured and is attributed to other",
                entity, account
            ),
            Diagnostic::UnconfiguredAccount { account } => {
                write!(f, "account '{}' is not configured and was skipped", account)
            }
            Diagnostic::UnmappedLabel { kind, label } => {
                write!(f, "{:?} label '{}' has no mapping", kind, label)
            }
            Diagnostic::InvalidQuarter { context, quarter } => {
                write!(f, "quarter {} at {} is not 1-4", quarter, context)
            }
            Diagnostic::AmountOverflow { context } => {
                write!(f, "amount at {} is out of range and was left out", context)
            }
        }
    }
}

/// One output row of the report, as consumed downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub account: String,
    pub entity: String,
    pub fiscal_year: i32,
    pub quarter: Quarter,
    pub discrete_amount: Decimal,
    pub cumulative_amount: Decimal,
}

/// Per-account, per-quarter results in unscaled source units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub organization_name: String,
    pub other_entity: String,
    pub entities: Vec<String>,
    pub accounts: BTreeMap<String, AccountReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PeriodReport {
    pub fn account(&self, account: &str) -> Option<&AccountReport> {
        self.accounts.get(account)
    }

    pub fn cell(&self, account: &str, period: FiscalQuarter) -> Option<&PeriodCell> {
        self.accounts
            .get(account)
            .and_then(|report| report.periods.get(&period))
    }

    pub fn missing_reference_cells(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::MissingReferenceData { .. }))
    }

    pub fn parse_fallback_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::ParseFallback { .. }))
            .count()
    }

    /// Flat rows for every known entity, plus the other entity wherever both
    /// of its values are known.
    pub fn records(&self) -> Vec<PeriodRecord> {
        let mut records = Vec::new();

        for (account, report) in &self.accounts {
            for (period, cell) in &report.periods {
                for (entity, value) in &cell.entities {
                    records.push(PeriodRecord {
                        account: account.clone(),
                        entity: entity.clone(),
                        fiscal_year: period.fiscal_year,
                        quarter: period.quarter,
                        discrete_amount: value.discrete,
                        cumulative_amount: value.cumulative,
                    });
                }

                if let (Some(discrete), Some(cumulative)) =
                    (cell.other.discrete, cell.other.cumulative)
                {
                    records.push(PeriodRecord {
                        account: account.clone(),
                        entity: self.other_entity.clone(),
                        fiscal_year: period.fiscal_year,
                        quarter: period.quarter,
                        discrete_amount: discrete,
                        cumulative_amount: cumulative,
                    });
                }
            }
        }

        records
    }

    /// Builds the `account -> period key -> entity -> value` structure the
    /// dashboard reads, scaling every value once from its unscaled amount.
    pub fn to_dashboard(
        &self,
        scale: &ScaleDeclaration,
        options: &ExportOptions,
    ) -> Result<DashboardExport> {
        scale.validate()?;

        let mut data: BTreeMap<String, BTreeMap<String, BTreeMap<String, i64>>> = BTreeMap::new();

        for (account, report) in &self.accounts {
            let periods = data.entry(account.clone()).or_default();

            for (period, cell) in &report.periods {
                let mut discrete = BTreeMap::new();
                let mut cumulative = BTreeMap::new();

                for (entity, value) in &cell.entities {
                    discrete.insert(entity.clone(), scale.apply(value.discrete)?);
                    cumulative.insert(entity.clone(), scale.apply(value.cumulative)?);
                }

                if let Some(value) = cell.other.discrete {
                    discrete.insert(self.other_entity.clone(), scale.apply(value)?);
                }
                if let Some(value) = cell.other.cumulative {
                    cumulative.insert(self.other_entity.clone(), scale.apply(value)?);
                }

                if let (Some(key), Some(total)) = (&options.consolidated_key, cell.consolidated) {
                    let scaled_total = scale.apply(total)?;
                    cumulative.insert(key.clone(), scaled_total);
                    if report.behavior == AccountBehavior::Stock {
                        discrete.insert(key.clone(), scaled_total);
                    }
                }

                periods.insert(period.discrete_key().to_string(), discrete);

                match period.year_alias() {
                    Some(alias) => {
                        if options.emit_q4_cumulative_key {
                            periods.insert(period.cumulative_key().to_string(), cumulative.clone());
                        }
                        periods.insert(alias.to_string(), cumulative);
                    }
                    None => {
                        periods.insert(period.cumulative_key().to_string(), cumulative);
                    }
                }
            }
        }

        Ok(DashboardExport {
            scale: scale.clone(),
            data,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Scaled integer values keyed the way the dashboard looks them up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardExport {
    pub scale: ScaleDeclaration,
    pub data: BTreeMap<String, BTreeMap<String, BTreeMap<String, i64>>>,
}

impl DashboardExport {
    pub fn value(&self, account: &str, key: &PeriodKey, entity: &str) -> Option<i64> {
        self.data
            .get(account)
            .and_then(|periods| periods.get(&key.to_string()))
            .and_then(|entities| entities.get(entity))
            .copied()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The bare data map, matching the layout of the legacy JSON files.
    pub fn data_to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.data)?)
    }
}
