use crate::error::{ConsolidationError, Result};
use crate::period::Quarter;
use chrono::{Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .ok_or_else(|| {
            ConsolidationError::DateError(format!(
                "No month end exists for {:04}-{:02}",
                year, month
            ))
        })
}

pub fn validate_fiscal_year_end_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(ConsolidationError::InvalidFiscalYearEndMonth(month));
    }
    Ok(())
}

/// Returns the last calendar day of `quarter` within `fiscal_year`.
///
/// Fiscal years are named by the calendar year they end in, so with a March
/// year end, Q1 of fiscal 2025 ends on 2024-06-30.
///
/// # Examples
/// - FY ends Dec: 2024 Q1 -> 2024-03-31, 2024 Q4 -> 2024-12-31
/// - FY ends Mar: 2025 Q1 -> 2024-06-30, 2025 Q4 -> 2025-03-31
pub fn quarter_end_date(
    fiscal_year: i32,
    quarter: Quarter,
    fiscal_year_end_month: u32,
) -> Result<NaiveDate> {
    validate_fiscal_year_end_month(fiscal_year_end_month)?;

    let quarters_before_year_end = 4 - i32::from(quarter.number());
    let mut month = fiscal_year_end_month as i32 - 3 * quarters_before_year_end;
    let mut year = fiscal_year;
    if month <= 0 {
        month += 12;
        year -= 1;
    }

    last_day_of_month(year, month as u32)
}

/// Strips every whitespace character, including the ideographic space used
/// in Korean spreadsheet exports, so labels like `"Ⅰ. 매출액"` and
/// `"Ⅰ.매출액"` compare equal.
pub fn normalize_label(label: &str) -> String {
    label.chars().filter(|c| !c.is_whitespace()).collect()
}
