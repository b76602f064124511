use crate::error::{ConsolidationError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum RoundingRule {
    #[schemars(description = "Round half to even (banker's rounding). 1234.5 -> 1234, 1235.5 -> 1236.")]
    HalfEven,

    #[schemars(description = "Truncate toward zero. -1234.9 -> -1234.")]
    Truncate,
}

impl RoundingRule {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingRule::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingRule::Truncate => RoundingStrategy::ToZero,
        }
    }
}

impl Default for RoundingRule {
    fn default() -> Self {
        Self::HalfEven
    }
}

/// The single unit every exported value is expressed in.
///
/// Report amounts stay unscaled; the declaration is applied once, per value,
/// when the dashboard export is produced. Because each value is rounded on its
/// own, scaled entity quarters may not add up to the scaled consolidated figure.
/// That residue is expected and is not corrected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScaleDeclaration {
    #[schemars(description = "Human readable unit of the exported values (e.g. '백만원', 'millions of KRW').")]
    pub unit_label: String,

    #[schemars(description = "Source amounts are divided by this factor (e.g. 1000000 for millions). Must be positive.")]
    pub divisor: u64,

    #[serde(default)]
    pub rounding: RoundingRule,
}

impl Default for ScaleDeclaration {
    fn default() -> Self {
        Self {
            unit_label: "currency units".to_string(),
            divisor: 1,
            rounding: RoundingRule::HalfEven,
        }
    }
}

impl ScaleDeclaration {
    pub fn new(unit_label: impl Into<String>, divisor: u64, rounding: RoundingRule) -> Self {
        Self {
            unit_label: unit_label.into(),
            divisor,
            rounding,
        }
    }

    pub fn millions(unit_label: impl Into<String>) -> Self {
        Self::new(unit_label, 1_000_000, RoundingRule::HalfEven)
    }

    pub fn validate(&self) -> Result<()> {
        if self.divisor == 0 {
            return Err(ConsolidationError::InvalidScale(format!(
                "divisor for '{}' must be positive",
                self.unit_label
            )));
        }
        Ok(())
    }

    pub fn apply(&self, amount: Decimal) -> Result<i64> {
        self.validate()?;

        let scaled = (amount / Decimal::from(self.divisor))
            .round_dp_with_strategy(0, self.rounding.strategy());

        scaled
            .to_i64()
            .ok_or(ConsolidationError::AmountOverflow(amount))
    }
}
