use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsolidationError {
    #[error("Invalid quarter {0}: must be between 1 and 4")]
    InvalidQuarter(u8),

    #[error("Invalid fiscal year end month {0}: must be between 1 and 12")]
    InvalidFiscalYearEndMonth(u32),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Invalid period key '{0}': expected '<year>_<q>Q', '<year>_<q>Q_Year' or '<year>_Year'")]
    InvalidPeriodKey(String),

    #[error("Invalid scale declaration: {0}")]
    InvalidScale(String),

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("Derived account '{derived}' references unknown account '{account}'")]
    UnknownAccountReference { derived: String, account: String },

    #[error("No consolidated total for account '{account}' in {fiscal_year} Q{quarter}")]
    MissingReferenceData {
        account: String,
        fiscal_year: i32,
        quarter: u8,
    },

    #[error("Reconciliation violation for '{account}' in {period}: known entities ({known_sum}) + other ({other}) != consolidated ({consolidated})")]
    ReconciliationViolation {
        account: String,
        period: String,
        known_sum: Decimal,
        other: Decimal,
        consolidated: Decimal,
    },

    #[error("Additivity violation for '{account}' / '{entity}' in {fiscal_year}: discrete sum {discrete_sum} != cumulative {cumulative}")]
    AdditivityViolation {
        account: String,
        entity: String,
        fiscal_year: i32,
        discrete_sum: Decimal,
        cumulative: Decimal,
    },

    #[error("Arithmetic overflow at {context}")]
    ArithmeticOverflow { context: String },

    #[error("Amount {0} does not fit the export integer range after scaling")]
    AmountOverflow(Decimal),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConsolidationError>;
