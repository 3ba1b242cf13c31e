use rust_decimal::Decimal;

use crate::error::ProjectEvalError;
use crate::types::Money;
use crate::valuation::evaluation::Periodicity;
use crate::ProjectEvalResult;

use super::snapshot::ProjectState;

const MONTHS_PER_YEAR: u32 = 12;

impl ProjectState {
    /// Re-express every item in the target periodicity.
    ///
    /// Yearly to monthly multiplies the horizon by 12 and splits each year
    /// evenly. Monthly to yearly rounds the horizon up to whole years and sums
    /// each 12-month chunk; with `propagate_first_year` every year then takes
    /// the first year's total. The investment period is carried over as is.
    pub fn change_periodicity(
        &self,
        target: Periodicity,
        propagate_first_year: bool,
    ) -> ProjectEvalResult<ProjectState> {
        if self.config.periodicity == target {
            return Ok(self.clone());
        }

        let horizon = self.config.horizon;
        let new_horizon = match target {
            Periodicity::Monthly => horizon.checked_mul(MONTHS_PER_YEAR).ok_or_else(|| {
                ProjectEvalError::InvalidInput {
                    field: "horizon".into(),
                    reason: format!("Horizon {horizon} is too long to express in months"),
                }
            })?,
            Periodicity::Yearly => horizon.div_ceil(MONTHS_PER_YEAR),
        };

        let mut next = self.clone();
        next.config.periodicity = target;
        next.config.horizon = new_horizon;

        for item in next.categories.iter_mut().flat_map(|c| c.items.iter_mut()) {
            item.values = match target {
                Periodicity::Monthly => expand_to_monthly(&item.values, horizon),
                Periodicity::Yearly => {
                    collapse_to_yearly(&item.values, horizon, new_horizon, propagate_first_year)
                }
            };
        }

        Ok(next)
    }
}

/// `[v0, y1 .. yN]` to `[v0, y1/12 × 12, .., yN/12 × 12]`.
pub fn expand_to_monthly(values: &[Money], years: u32) -> Vec<Money> {
    let twelve = Decimal::from(MONTHS_PER_YEAR);
    let mut monthly = Vec::with_capacity(years as usize * MONTHS_PER_YEAR as usize + 1);
    monthly.push(value_at(values, 0));

    for year in 1..=years as usize {
        let month_value = value_at(values, year) / twelve;
        monthly.extend(std::iter::repeat(month_value).take(MONTHS_PER_YEAR as usize));
    }
    monthly
}

/// `[v0, m1 .. mN]` to `[v0, Σ m1..m12, ..]` with `years` yearly values.
pub fn collapse_to_yearly(
    values: &[Money],
    months: u32,
    years: u32,
    propagate_first_year: bool,
) -> Vec<Money> {
    let operating: Vec<Money> = (1..=months as usize).map(|m| value_at(values, m)).collect();

    let mut yearly: Vec<Money> = operating
        .chunks(MONTHS_PER_YEAR as usize)
        .map(|chunk| chunk.iter().sum())
        .collect();
    yearly.resize(years as usize, Decimal::ZERO);

    if propagate_first_year {
        if let Some(&first) = yearly.first() {
            yearly.iter_mut().for_each(|v| *v = first);
        }
    }

    let mut collapsed = Vec::with_capacity(yearly.len() + 1);
    collapsed.push(value_at(values, 0));
    collapsed.extend(yearly);
    collapsed
}

fn value_at(values: &[Money], index: usize) -> Money {
    values.get(index).copied().unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cash_flow::aggregation::CategoryKind;
    use crate::valuation::evaluation::EvaluationConfiguration;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn yearly_state() -> ProjectState {
        ProjectState::new(EvaluationConfiguration {
            horizon: 2,
            ..Default::default()
        })
        .set_item_values(CategoryKind::Revenue, "1", vec![dec!(-50), dec!(1200), dec!(2400)])
        .unwrap()
    }

    #[test]
    fn test_yearly_to_monthly_splits_evenly() {
        let monthly = yearly_state()
            .change_periodicity(Periodicity::Monthly, false)
            .unwrap();
        assert_eq!(monthly.config.horizon, 24);
        assert_eq!(monthly.config.periodicity, Periodicity::Monthly);

        let values = &monthly.item(CategoryKind::Revenue, "1").unwrap().values;
        assert_eq!(values.len(), 25);
        assert_eq!(values[0], dec!(-50));
        assert_eq!(values[1], dec!(100));
        assert_eq!(values[12], dec!(100));
        assert_eq!(values[13], dec!(200));
        assert_eq!(values[24], dec!(200));
    }

    #[test]
    fn test_round_trip_preserves_yearly_totals() {
        let original = yearly_state();
        let back = original
            .change_periodicity(Periodicity::Monthly, false)
            .unwrap()
            .change_periodicity(Periodicity::Yearly, false)
            .unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_partial_year_rounds_horizon_up() {
        let months: Vec<Money> = (0..=14i64).map(Decimal::from).collect();
        let collapsed = collapse_to_yearly(&months, 14, 2, false);
        // 1..=12 sums to 78, 13 + 14 = 27
        assert_eq!(collapsed, vec![dec!(0), dec!(78), dec!(27)]);
    }

    #[test]
    fn test_first_year_propagation() {
        let months: Vec<Money> = (0..=14i64).map(Decimal::from).collect();
        let collapsed = collapse_to_yearly(&months, 14, 2, true);
        assert_eq!(collapsed, vec![dec!(0), dec!(78), dec!(78)]);
    }

    #[test]
    fn test_same_periodicity_is_identity() {
        let state = yearly_state();
        assert_eq!(state.change_periodicity(Periodicity::Yearly, true).unwrap(), state);
    }

    #[test]
    fn test_monthly_horizon_to_yearly() {
        let state = ProjectState::new(EvaluationConfiguration {
            periodicity: Periodicity::Monthly,
            horizon: 18,
            ..Default::default()
        });
        let yearly = state.change_periodicity(Periodicity::Yearly, false).unwrap();
        assert_eq!(yearly.config.horizon, 2);
        assert_eq!(yearly.categories[0].items[0].values.len(), 3);
    }
}
