//! # Entity Period Builder
//!
//! Turns year-to-date figures of consolidated financial statements into
//! per-quarter report cells for every reporting entity, plus a reconciled
//! "other" entity holding whatever the known entities do not explain.
//!
//! ## Core Concepts
//!
//! - **Cumulative Table**: Year-to-date amounts per account, known entity and fiscal quarter
//! - **Consolidated Totals**: The authoritative group figure per account and fiscal quarter
//! - **Decomposition**: Quarter amounts are differences of consecutive year-to-date amounts
//! - **Reconciliation**: `other = consolidated - sum(known entities)`, exact, per quarter
//! - **Scaling**: Applied once, at dashboard export, never to report values
//!
//! ## Example
//!
//! ```rust,ignore
//! use entity_period_builder::*;
//! use rust_decimal_macros::dec;
//!
//! let config = ReportConfig::from_json_str(r#"{
//!     "organization_name": "ACME Group",
//!     "entities": [{ "key": "Domestic" }, { "key": "China" }],
//!     "accounts": [{ "key": "revenue" }],
//!     "scale": { "unit_label": "millions", "divisor": 1000000 }
//! }"#)?;
//!
//! let cumulative = CumulativeTable::from_records(&[CumulativeRecord {
//!     account: "revenue".to_string(),
//!     entity: "Domestic".to_string(),
//!     fiscal_year: 2025,
//!     quarter: Quarter::Q1,
//!     cumulative_amount: dec!(1200000000),
//! }])?;
//! let consolidated = ConsolidatedTotals::from_records(&[ConsolidatedRecord {
//!     account: "revenue".to_string(),
//!     fiscal_year: 2025,
//!     quarter: Quarter::Q1,
//!     consolidated_cumulative_amount: dec!(1500000000),
//! }])?;
//!
//! let report = process_with_verification(&config, &cumulative, &consolidated)?;
//! let export = report.to_dashboard(&config.scale, &config.export)?;
//! ```

pub mod decomposer;
pub mod derived;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod numeric;
pub mod period;
pub mod reconciler;
pub mod report;
pub mod scale;
pub mod schema;
pub mod table;
pub mod utils;

pub use decomposer::{decompose_cumulative, decompose_with_gaps, PeriodDecomposer};
pub use derived::{apply_derived_accounts, DerivedTables};
pub use engine::{build_report, ReportEngine};
pub use error::{ConsolidationError, Result};
pub use ingestion::*;
pub use numeric::{checked_sum, normalize_amount, parse_amount, NormalizedAmount};
pub use period::{FiscalQuarter, PeriodKey, Quarter};
pub use reconciler::{reconcile_cell, residual, verify_report, EntityReconciler};
pub use report::*;
pub use scale::{RoundingRule, ScaleDeclaration};
pub use schema::*;
pub use table::*;
pub use utils::*;

use log::{debug, info};

pub struct ConsolidationProcessor;

impl ConsolidationProcessor {
    pub fn process(
        config: &ReportConfig,
        cumulative: &CumulativeTable,
        consolidated: &ConsolidatedTotals,
    ) -> Result<PeriodReport> {
        info!(
            "Building quarterly entity report for organization: {}",
            config.organization_name
        );
        debug!(
            "Input contains {} entity cells and {} consolidated cells across {} known entities",
            cumulative.len(),
            consolidated.len(),
            config.entities.len()
        );

        let report = build_report(config, cumulative, consolidated)?;

        for diagnostic in &report.diagnostics {
            debug!("Diagnostic: {}", diagnostic);
        }

        Ok(report)
    }

    /// Ingests raw extracted cells, then builds the report. Ingestion
    /// diagnostics come first in the report.
    pub fn process_raw(
        config: &ReportConfig,
        cells: &[RawCell],
        consolidated_cells: &[RawConsolidatedCell],
    ) -> Result<PeriodReport> {
        config.validate()?;

        let ingested = ingest_raw_cells(config, cells, consolidated_cells);
        let mut report = Self::process(config, &ingested.cumulative, &ingested.consolidated)?;

        let mut diagnostics = ingested.diagnostics;
        diagnostics.append(&mut report.diagnostics);
        report.diagnostics = diagnostics;

        Ok(report)
    }

    pub fn process_with_verification(
        config: &ReportConfig,
        cumulative: &CumulativeTable,
        consolidated: &ConsolidatedTotals,
    ) -> Result<PeriodReport> {
        let report = Self::process(config, cumulative, consolidated)?;

        verify_report(&report)?;

        Ok(report)
    }
}

pub fn build_period_report(
    config: &ReportConfig,
    cumulative: &CumulativeTable,
    consolidated: &ConsolidatedTotals,
) -> Result<PeriodReport> {
    ConsolidationProcessor::process(config, cumulative, consolidated)
}

pub fn process_with_verification(
    config: &ReportConfig,
    cumulative: &CumulativeTable,
    consolidated: &ConsolidatedTotals,
) -> Result<PeriodReport> {
    ConsolidationProcessor::process_with_verification(config, cumulative, consolidated)
}
