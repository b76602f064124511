//! Normalization of spreadsheet number text.
//!
//! Exported statements mix thousands separators, accounting-style
//! parenthesized negatives and stray spaces. The rules below are applied in
//! order:
//!
//! 1. Trim. Empty text is zero. A lone dash is the exports' zero placeholder.
//! 2. Drop `,` separators and every embedded whitespace character.
//! 3. `(1234)` becomes `-1234`.
//! 4. Parse as a decimal. Text that still does not parse becomes zero, but
//!    the result is marked as a fallback so callers can report it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizedAmount {
    Parsed(Decimal),
    /// The text was not a number; the amount counts as zero.
    Fallback { original: String },
}

impl NormalizedAmount {
    pub fn value(&self) -> Decimal {
        match self {
            NormalizedAmount::Parsed(value) => *value,
            NormalizedAmount::Fallback { .. } => Decimal::ZERO,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, NormalizedAmount::Fallback { .. })
    }
}

pub fn normalize_amount(text: &str) -> NormalizedAmount {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return NormalizedAmount::Parsed(Decimal::ZERO);
    }

    let compact: String = trimmed
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let signed = match compact
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
    {
        Some(inner) => format!("-{}", inner),
        None => compact,
    };

    match parse_decimal(&signed) {
        Some(value) => NormalizedAmount::Parsed(value),
        None => NormalizedAmount::Fallback {
            original: text.to_string(),
        },
    }
}

/// Shorthand for callers that do not audit fallbacks.
pub fn parse_amount(text: &str) -> Decimal {
    normalize_amount(text).value()
}

/// Sums without panicking; `None` when the total leaves the `Decimal` range.
pub fn checked_sum<I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |total, value| total.checked_add(value))
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    let unsigned_plus = text.strip_prefix('+').unwrap_or(text);
    if unsigned_plus.is_empty() {
        return None;
    }

    Decimal::from_str(unsigned_plus)
        .or_else(|_| Decimal::from_scientific(unsigned_plus))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parenthesized_negative() {
        assert_eq!(normalize_amount("(1,234)"), NormalizedAmount::Parsed(dec!(-1234)));
        assert_eq!(normalize_amount("1,234"), NormalizedAmount::Parsed(dec!(1234)));
        assert_eq!(normalize_amount(""), NormalizedAmount::Parsed(Decimal::ZERO));
    }

    #[test]
    fn test_whitespace_and_separators() {
        assert_eq!(parse_amount("  12 345 678  "), dec!(12345678));
        assert_eq!(parse_amount("\t( 1,000,000 )\n"), dec!(-1000000));
        assert_eq!(parse_amount("1\u{3000}000"), dec!(1000));
        assert_eq!(parse_amount("   "), Decimal::ZERO);
        assert_eq!(parse_amount("-"), Decimal::ZERO);
    }

    #[test]
    fn test_decimal_forms() {
        assert_eq!(parse_amount("-1234.50"), dec!(-1234.50));
        assert_eq!(parse_amount("+42"), dec!(42));
        assert_eq!(parse_amount("1.5e6"), dec!(1500000));
        assert_eq!(parse_amount("987,654,321,012"), dec!(987654321012));
    }

    #[test]
    fn test_fallback_is_zero_and_marked() {
        let result = normalize_amount("n/a");
        assert!(result.is_fallback());
        assert_eq!(result.value(), Decimal::ZERO);
        assert_eq!(
            result,
            NormalizedAmount::Fallback {
                original: "n/a".to_string()
            }
        );

        assert!(normalize_amount("(12").is_fallback());
        assert!(normalize_amount("(-5)").is_fallback());
        assert!(normalize_amount("+").is_fallback());
    }

    #[test]
    fn test_checked_sum_reports_overflow() {
        assert_eq!(checked_sum([dec!(1), dec!(2.5), dec!(-4)]), Some(dec!(-0.5)));
        assert_eq!(checked_sum(Vec::new()), Some(Decimal::ZERO));
        assert_eq!(checked_sum([Decimal::MAX, Decimal::MAX]), None);
        assert_eq!(checked_sum([Decimal::MAX, Decimal::MIN]), Some(Decimal::ZERO));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for text in ["(1,234)", "1,234", "", "0", "-987654321012", " 42 "] {
            let once = parse_amount(text);
            let twice = parse_amount(&once.to_string());
            assert_eq!(once, twice, "normalizing '{}' twice changed the value", text);
        }
    }
}
