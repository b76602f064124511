use crate::error::{ConsolidationError, Result};
use crate::utils::quarter_end_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::Q1, Quarter::Q2, Quarter::Q3, Quarter::Q4];

    pub fn number(self) -> u8 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 2,
            Quarter::Q3 => 3,
            Quarter::Q4 => 4,
        }
    }

    /// 0-based position within the fiscal year.
    pub fn index(self) -> usize {
        usize::from(self.number() - 1)
    }

    /// Quarters 1 through `self`, ascending.
    pub fn through(self) -> impl Iterator<Item = Quarter> {
        Self::ALL.into_iter().take(self.index() + 1)
    }
}

impl TryFrom<u8> for Quarter {
    type Error = ConsolidationError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Quarter::Q1),
            2 => Ok(Quarter::Q2),
            3 => Ok(Quarter::Q3),
            4 => Ok(Quarter::Q4),
            other => Err(ConsolidationError::InvalidQuarter(other)),
        }
    }
}

impl From<Quarter> for u8 {
    fn from(quarter: Quarter) -> Self {
        quarter.number()
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.number())
    }
}

/// A quarter of a named fiscal year. Orders by year, then quarter.
///
/// Serializes as its discrete period key (`"2025_3Q"`) so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FiscalQuarter {
    pub fiscal_year: i32,
    pub quarter: Quarter,
}

impl FiscalQuarter {
    pub fn new(fiscal_year: i32, quarter: Quarter) -> Self {
        Self {
            fiscal_year,
            quarter,
        }
    }

    pub fn discrete_key(&self) -> PeriodKey {
        PeriodKey::Discrete(*self)
    }

    pub fn cumulative_key(&self) -> PeriodKey {
        PeriodKey::Cumulative(*self)
    }

    /// `"<year>_Year"` for the fourth quarter, which dashboards use for the
    /// full-year snapshot.
    pub fn year_alias(&self) -> Option<PeriodKey> {
        (self.quarter == Quarter::Q4).then_some(PeriodKey::Year(self.fiscal_year))
    }

    pub fn end_date(&self, fiscal_year_end_month: u32) -> Result<NaiveDate> {
        quarter_end_date(self.fiscal_year, self.quarter, fiscal_year_end_month)
    }
}

impl fmt::Display for FiscalQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}Q", self.fiscal_year, self.quarter.number())
    }
}

impl From<FiscalQuarter> for String {
    fn from(period: FiscalQuarter) -> Self {
        period.to_string()
    }
}

impl TryFrom<String> for FiscalQuarter {
    type Error = ConsolidationError;

    fn try_from(value: String) -> Result<Self> {
        match value.parse::<PeriodKey>()? {
            PeriodKey::Discrete(period) => Ok(period),
            _ => Err(ConsolidationError::InvalidPeriodKey(value)),
        }
    }
}

/// The period key naming convention the dashboard reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    /// `"2025_3Q"`: amount for the quarter alone.
    Discrete(FiscalQuarter),
    /// `"2025_3Q_Year"`: year-to-date snapshot at quarter end.
    Cumulative(FiscalQuarter),
    /// `"2025_Year"`: alias of the Q4 cumulative snapshot.
    Year(i32),
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Discrete(period) => write!(f, "{}", period),
            PeriodKey::Cumulative(period) => write!(f, "{}_Year", period),
            PeriodKey::Year(year) => write!(f, "{}_Year", year),
        }
    }
}

impl FromStr for PeriodKey {
    type Err = ConsolidationError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ConsolidationError::InvalidPeriodKey(s.to_string());

        let (year_part, rest) = s.split_once('_').ok_or_else(invalid)?;
        let fiscal_year: i32 = year_part.parse().map_err(|_| invalid())?;

        if rest == "Year" {
            return Ok(PeriodKey::Year(fiscal_year));
        }

        let (quarter_part, cumulative) = match rest.strip_suffix("_Year") {
            Some(q) => (q, true),
            None => (rest, false),
        };

        let quarter_number: u8 = quarter_part
            .strip_suffix('Q')
            .and_then(|n| n.parse().ok())
            .ok_or_else(invalid)?;
        let quarter = Quarter::try_from(quarter_number).map_err(|_| invalid())?;
        let period = FiscalQuarter::new(fiscal_year, quarter);

        Ok(if cumulative {
            PeriodKey::Cumulative(period)
        } else {
            PeriodKey::Discrete(period)
        })
    }
}
