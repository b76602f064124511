use crate::error::ConsolidationError;
use crate::numeric::{normalize_amount, NormalizedAmount};
use crate::period::{FiscalQuarter, Quarter};
use crate::report::{Diagnostic, LabelKind};
use crate::schema::ReportConfig;
use crate::table::{ConsolidatedTotals, CumulativeTable};
use crate::utils::normalize_label;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One extracted spreadsheet value for a subsidiary column, before mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCell {
    pub account_label: String,
    pub entity_label: String,
    pub fiscal_year: i32,
    pub quarter: u8,
    pub amount_text: String,
}

/// One extracted value of the consolidated column, before mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConsolidatedCell {
    pub account_label: String,
    pub fiscal_year: i32,
    pub quarter: u8,
    pub amount_text: String,
}

/// Maps raw row and column labels to canonical keys.
///
/// Built once per run from the configuration. Labels compare with all
/// whitespace removed.
#[derive(Debug, Clone, Default)]
pub struct LabelResolver {
    accounts: HashMap<String, String>,
    entities: HashMap<String, String>,
}

impl LabelResolver {
    pub fn from_config(config: &ReportConfig) -> Self {
        let mut resolver = Self::default();

        for account in &config.accounts {
            for label in std::iter::once(&account.key).chain(&account.aliases) {
                resolver
                    .accounts
                    .insert(normalize_label(label), account.key.clone());
            }
        }

        for entity in &config.entities {
            for label in std::iter::once(&entity.key).chain(&entity.aliases) {
                resolver
                    .entities
                    .insert(normalize_label(label), entity.key.clone());
            }
        }

        resolver
    }

    pub fn account(&self, label: &str) -> Option<&str> {
        self.accounts.get(&normalize_label(label)).map(String::as_str)
    }

    pub fn entity(&self, label: &str) -> Option<&str> {
        self.entities.get(&normalize_label(label)).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestedTables {
    pub cumulative: CumulativeTable,
    pub consolidated: ConsolidatedTotals,
    pub diagnostics: Vec<Diagnostic>,
}

/// Shared bookkeeping for both cell kinds: unmapped labels are reported once.
struct Ingestor<'a> {
    resolver: LabelResolver,
    config: &'a ReportConfig,
    reported_labels: BTreeSet<(LabelKind, String)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Ingestor<'a> {
    fn new(config: &'a ReportConfig) -> Self {
        Self {
            resolver: LabelResolver::from_config(config),
            config,
            reported_labels: BTreeSet::new(),
            diagnostics: Vec::new(),
        }
    }

    fn unmapped(&mut self, kind: LabelKind, label: &str) {
        if self.reported_labels.insert((kind, label.to_string())) {
            warn!("{:?} label '{}' has no mapping; cell skipped", kind, label);
            self.diagnostics.push(Diagnostic::UnmappedLabel {
                kind,
                label: label.to_string(),
            });
        }
    }

    fn account(&mut self, label: &str) -> Option<String> {
        match self.resolver.account(label) {
            Some(key) => Some(key.to_string()),
            None => {
                self.unmapped(LabelKind::Account, label);
                None
            }
        }
    }

    fn entity(&mut self, label: &str) -> Option<String> {
        match self.resolver.entity(label) {
            Some(key) => Some(key.to_string()),
            None => {
                self.unmapped(LabelKind::Entity, label);
                None
            }
        }
    }

    fn quarter(&mut self, context: &str, quarter: u8) -> Option<Quarter> {
        match Quarter::try_from(quarter) {
            Ok(quarter) => Some(quarter),
            Err(_) => {
                warn!("Quarter {} at {} is not 1-4; cell skipped", quarter, context);
                self.diagnostics.push(Diagnostic::InvalidQuarter {
                    context: context.to_string(),
                    quarter,
                });
                None
            }
        }
    }

    fn amount(&mut self, context: &str, text: &str) -> rust_decimal::Decimal {
        let normalized = normalize_amount(text);
        if let NormalizedAmount::Fallback { original } = &normalized {
            warn!("Unparseable amount '{}' at {} counted as 0", original, context);
            self.diagnostics.push(Diagnostic::ParseFallback {
                context: context.to_string(),
                original: original.clone(),
            });
        }
        normalized.value()
    }

    fn overflow(&mut self, context: &str, error: ConsolidationError) {
        warn!("{}; amount at {} left out", error, context);
        self.diagnostics.push(Diagnostic::AmountOverflow {
            context: context.to_string(),
        });
    }
}

/// Resolves labels, quarters and amount text into typed tables.
///
/// Cells with an unmapped label or an invalid quarter are skipped; text that
/// does not parse counts as zero. Every such case is reported as a
/// diagnostic. Several labels mapping to one entity are summed; a label whose
/// amount would push that sum out of range is left out and reported.
///
/// A blank consolidated cell is absent, not zero, so the quarter is reported
/// as missing reference data instead of being reconciled against 0.
pub fn ingest_raw_cells(
    config: &ReportConfig,
    cells: &[RawCell],
    consolidated_cells: &[RawConsolidatedCell],
) -> IngestedTables {
    let mut ingestor = Ingestor::new(config);
    let mut cumulative = CumulativeTable::new();
    let mut consolidated = ConsolidatedTotals::new();

    for cell in cells {
        let context = format!(
            "{} / {} / {} Q{}",
            cell.account_label, cell.entity_label, cell.fiscal_year, cell.quarter
        );

        let Some(account) = ingestor.account(&cell.account_label) else {
            continue;
        };
        let Some(entity) = ingestor.entity(&cell.entity_label) else {
            continue;
        };
        let Some(quarter) = ingestor.quarter(&context, cell.quarter) else {
            continue;
        };

        let amount = ingestor.amount(&context, &cell.amount_text);
        let period = FiscalQuarter::new(cell.fiscal_year, quarter);
        if let Err(e) = cumulative.add(&account, &entity, period, amount) {
            ingestor.overflow(&context, e);
        }
    }

    for cell in consolidated_cells {
        let context = format!(
            "{} / consolidated / {} Q{}",
            cell.account_label, cell.fiscal_year, cell.quarter
        );

        let Some(account) = ingestor.account(&cell.account_label) else {
            continue;
        };
        let Some(quarter) = ingestor.quarter(&context, cell.quarter) else {
            continue;
        };

        if cell.amount_text.trim().is_empty() {
            debug!("Blank consolidated amount at {}; treated as absent", context);
            continue;
        }

        let amount = ingestor.amount(&context, &cell.amount_text);
        let period = FiscalQuarter::new(cell.fiscal_year, quarter);
        if let Err(e) = consolidated.add(&account, period, amount) {
            ingestor.overflow(&context, e);
        }
    }

    debug!(
        "Ingested {} entity cells and {} consolidated cells for {}",
        cumulative.len(),
        consolidated.len(),
        ingestor.config.organization_name
    );

    IngestedTables {
        cumulative,
        consolidated,
        diagnostics: ingestor.diagnostics,
    }
}
