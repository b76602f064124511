use crate::schema::AccountBehavior;
use rust_decimal::Decimal;

/// Turns a year-to-date series into per-quarter amounts.
///
/// `cumulative[0]` is the first quarter. The value before the first quarter
/// is zero. No sign or monotonicity check is made: a later correction that
/// lowers the running total yields a negative quarter, which is the intended
/// result. `None` when a quarter amount falls outside the `Decimal` range.
pub fn decompose_cumulative(cumulative: &[Decimal]) -> Option<Vec<Decimal>> {
    cumulative
        .iter()
        .scan(Decimal::ZERO, |previous, &current| {
            let discrete = current.checked_sub(*previous);
            *previous = current;
            Some(discrete)
        })
        .collect()
}

/// Like [`decompose_cumulative`], for a series with unknown quarters.
///
/// A quarter is unknown when its own cumulative value or the preceding one is
/// unknown, or when the difference overflows.
pub fn decompose_with_gaps(cumulative: &[Option<Decimal>]) -> Vec<Option<Decimal>> {
    cumulative
        .iter()
        .scan(Some(Decimal::ZERO), |previous, &current| {
            let discrete = match (*previous, current) {
                (Some(prev), Some(curr)) => curr.checked_sub(prev),
                _ => None,
            };
            *previous = current;
            Some(discrete)
        })
        .collect()
}

pub struct PeriodDecomposer {
    behavior: AccountBehavior,
}

impl PeriodDecomposer {
    pub fn new(behavior: AccountBehavior) -> Self {
        Self { behavior }
    }

    /// Flow accounts are decomposed; a stock balance is its own quarter value.
    pub fn discrete_values(&self, cumulative: &[Decimal]) -> Option<Vec<Decimal>> {
        match self.behavior {
            AccountBehavior::Flow => decompose_cumulative(cumulative),
            AccountBehavior::Stock => Some(cumulative.to_vec()),
        }
    }

    pub fn discrete_values_with_gaps(&self, cumulative: &[Option<Decimal>]) -> Vec<Option<Decimal>> {
        match self.behavior {
            AccountBehavior::Flow => decompose_with_gaps(cumulative),
            AccountBehavior::Stock => cumulative.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ordering_sensitivity() {
        let discrete = decompose_cumulative(&[dec!(100), dec!(250), dec!(250), dec!(400)]).unwrap();
        assert_eq!(discrete, vec![dec!(100), dec!(150), dec!(0), dec!(150)]);
    }

    #[test]
    fn test_additivity() {
        let series = [
            vec![dec!(100), dec!(250), dec!(250), dec!(400)],
            vec![dec!(-5), dec!(12.5), dec!(0), dec!(-3)],
            vec![dec!(987654321012), dec!(1), dec!(999999999999), dec!(1000000000000)],
        ];

        for cumulative in &series {
            let total: Decimal = decompose_cumulative(cumulative).unwrap().iter().sum();
            assert_eq!(total, cumulative[3], "discrete quarters must add up to Q4 YTD");
        }
    }

    #[test]
    fn test_non_monotonic_series_is_not_an_error() {
        let discrete = decompose_cumulative(&[dec!(500), dec!(300), dec!(300), dec!(350)]).unwrap();
        assert_eq!(discrete, vec![dec!(500), dec!(-200), dec!(0), dec!(50)]);
    }

    #[test]
    fn test_missing_values_decompose_as_zero() {
        // Callers substitute zero for absent cells before decomposing.
        let discrete = decompose_cumulative(&[dec!(100), Decimal::ZERO, dec!(300)]).unwrap();
        assert_eq!(discrete, vec![dec!(100), dec!(-100), dec!(300)]);
    }

    #[test]
    fn test_gaps_propagate_to_neighbours() {
        let discrete = decompose_with_gaps(&[Some(dec!(20)), None, Some(dec!(90)), Some(dec!(120))]);
        assert_eq!(discrete, vec![Some(dec!(20)), None, None, Some(dec!(30))]);
    }

    #[test]
    fn test_first_quarter_gap() {
        let discrete = decompose_with_gaps(&[None, Some(dec!(50))]);
        assert_eq!(discrete, vec![None, None]);
    }

    #[test]
    fn test_stock_accounts_are_not_decomposed() {
        let decomposer = PeriodDecomposer::new(AccountBehavior::Stock);
        let balances = [dec!(1000), dec!(1200), dec!(900)];
        assert_eq!(decomposer.discrete_values(&balances), Some(balances.to_vec()));

        let flow = PeriodDecomposer::new(AccountBehavior::Flow);
        assert_eq!(
            flow.discrete_values(&balances),
            Some(vec![dec!(1000), dec!(200), dec!(-300)])
        );
    }

    #[test]
    fn test_overflowing_quarter_is_reported() {
        assert_eq!(decompose_cumulative(&[Decimal::MIN, Decimal::MAX]), None);
        assert_eq!(
            decompose_with_gaps(&[Some(Decimal::MIN), Some(Decimal::MAX), Some(Decimal::MAX)]),
            vec![Some(Decimal::MIN), None, Some(Decimal::ZERO)]
        );
    }
}
