use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ProjectEvalError;
use crate::types::{Money, Rate};
use crate::ProjectEvalResult;

const IRR_LOWER_BOUND: Decimal = dec!(-0.9999);
const IRR_INITIAL_UPPER_BOUND: Decimal = dec!(1.0);
const IRR_UPPER_BOUND_CAP: Decimal = dec!(100);
const IRR_NPV_THRESHOLD: Decimal = dec!(0.00001);
const MAX_IRR_ITERATIONS: u32 = 100;

/// Residual NPV above which a bisection estimate is not treated as a root.
pub const IRR_RESIDUAL_TOLERANCE: Decimal = dec!(0.0001);

/// Result of the bisection IRR search.
///
/// The search always produces a rate. When the flows never change sign inside
/// the search interval the rate is only the boundary the bisection collapsed
/// onto, and `converged` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrrEstimate {
    pub rate: Rate,
    pub residual_npv: Money,
    pub converged: bool,
}

/// Payback period, or the explicit sentinel for flows that never recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "periods", rename_all = "snake_case")]
pub enum Payback {
    Recovered(Decimal),
    NotRecovered,
}

impl Payback {
    pub fn periods(&self) -> Option<Decimal> {
        match self {
            Payback::Recovered(p) => Some(*p),
            Payback::NotRecovered => None,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, Payback::Recovered(_))
    }
}

/// Net Present Value of a series of cash flows, flow `t` discounted by `(1+rate)^t`.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> ProjectEvalResult<Money> {
    if rate <= dec!(-1) {
        return Err(ProjectEvalError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    discounted_sum(rate, cash_flows).ok_or_else(|| ProjectEvalError::ArithmeticOverflow {
        context: format!("NPV at rate {rate}"),
    })
}

/// Checked discounting. `None` when a term is not representable, which only
/// happens for rates close to -100% over long horizons.
fn discounted_sum(rate: Rate, cash_flows: &[Money]) -> Option<Money> {
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut result = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            match discount.checked_mul(one_plus_r) {
                Some(d) => discount = d,
                // Only reachable when 1+r > 1: every remaining term is below
                // the smallest representable Decimal.
                None => break,
            }
        }
        if discount.is_zero() {
            return None;
        }
        result = result.checked_add(cf.checked_div(discount)?)?;
    }

    Some(result)
}

/// NPV for the bisection: substitutes the limit as the rate approaches -100%,
/// where the highest-order non-zero flow dominates.
fn npv_or_limit(rate: Rate, cash_flows: &[Money]) -> Money {
    discounted_sum(rate, cash_flows).unwrap_or_else(|| {
        match cash_flows.iter().rev().find(|cf| !cf.is_zero()) {
            Some(cf) if cf.is_sign_negative() => Decimal::MIN,
            Some(_) => Decimal::MAX,
            None => Decimal::ZERO,
        }
    })
}

/// Internal Rate of Return by bisection over `[-0.9999, high]`.
///
/// `high` starts at 1.0 and doubles while NPV is still positive there, up to
/// 100. Bisection runs for at most 100 iterations or until |NPV| < 1e-5.
/// The midpoint is always returned; check `converged` before relying on it.
/// Flows with several sign changes may have several roots and the one found
/// here is not canonical.
pub fn irr(cash_flows: &[Money]) -> IrrEstimate {
    let mut low = IRR_LOWER_BOUND;
    let mut high = IRR_INITIAL_UPPER_BOUND;

    while npv_or_limit(high, cash_flows) > Decimal::ZERO && high < IRR_UPPER_BOUND_CAP {
        high *= dec!(2);
    }

    for _ in 0..MAX_IRR_ITERATIONS {
        let mid = (low + high) / dec!(2);
        let npv_mid = npv_or_limit(mid, cash_flows);

        if npv_mid.abs() < IRR_NPV_THRESHOLD {
            return estimate_at(mid, cash_flows);
        }

        if npv_mid > Decimal::ZERO {
            low = mid;
        } else {
            high = mid;
        }
    }

    estimate_at((low + high) / dec!(2), cash_flows)
}

fn estimate_at(rate: Rate, cash_flows: &[Money]) -> IrrEstimate {
    let residual_npv = npv_or_limit(rate, cash_flows);
    IrrEstimate {
        rate,
        residual_npv,
        converged: residual_npv.abs() < IRR_RESIDUAL_TOLERANCE,
    }
}

/// Payback period with linear interpolation inside the recovery period.
pub fn payback(cash_flows: &[Money]) -> Payback {
    let mut cumulative = Decimal::ZERO;

    for (i, cf) in cash_flows.iter().enumerate() {
        let prev = cumulative;
        cumulative += cf;
        if i > 0 && cumulative >= Decimal::ZERO {
            if prev < Decimal::ZERO {
                // cf > 0 here: the running sum crossed from negative to >= 0
                return Payback::Recovered(Decimal::from(i as u64 - 1) + prev.abs() / cf);
            }
            return Payback::Recovered(Decimal::from(i as u64));
        }
    }

    Payback::NotRecovered
}

/// Number of sign changes in a flow sequence, ignoring zeros.
pub fn count_sign_changes(cash_flows: &[Money]) -> usize {
    cash_flows
        .iter()
        .filter(|cf| !cf.is_zero())
        .map(|cf| cf.is_sign_negative())
        .collect::<Vec<_>>()
        .windows(2)
        .filter(|w| w[0] != w[1])
        .count()
}

/// `(1 + rate)^nper` with overflow reported instead of panicking.
pub fn compound_factor(rate: Rate, nper: u32) -> ProjectEvalResult<Decimal> {
    (Decimal::ONE + rate)
        .checked_powu(u64::from(nper))
        .ok_or_else(|| ProjectEvalError::ArithmeticOverflow {
            context: format!("compound factor (1 + {rate})^{nper}"),
        })
}

/// Capital recovery factor `r / (1 - (1+r)^-n)`; `1/n` when `r` is zero.
pub fn capital_recovery_factor(rate: Rate, nper: u32) -> ProjectEvalResult<Decimal> {
    if nper == 0 {
        return Err(ProjectEvalError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.is_zero() {
        return Ok(Decimal::ONE / Decimal::from(nper));
    }

    let factor = compound_factor(rate, nper)?;
    if factor.is_zero() {
        return Err(ProjectEvalError::DivisionByZero {
            context: "capital recovery compound factor".into(),
        });
    }

    let denom = Decimal::ONE - Decimal::ONE / factor;
    if denom.is_zero() {
        return Err(ProjectEvalError::DivisionByZero {
            context: "capital recovery factor".into(),
        });
    }

    Ok(rate / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(0.01));
    }

    #[test]
    fn test_npv_zero_rate_is_plain_sum() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(Decimal::ZERO, &cfs).unwrap(), dec!(50));
    }

    #[test]
    fn test_npv_annuity_scenario() {
        let cfs = vec![
            dec!(-1000),
            dec!(300),
            dec!(300),
            dec!(300),
            dec!(300),
            dec!(300),
        ];
        let result = npv(dec!(0.10), &cfs).unwrap();
        assert!((result - dec!(137.236)).abs() < dec!(0.001), "got {result}");
    }

    #[test]
    fn test_npv_rejects_rate_at_minus_one() {
        assert!(npv(dec!(-1), &[dec!(1)]).is_err());
    }

    #[test]
    fn test_npv_large_rate_does_not_overflow() {
        let cfs = vec![dec!(-1000); 40];
        let result = npv(dec!(150), &cfs).unwrap();
        assert!((result - dec!(-1006.6)).abs() < dec!(0.1));
    }

    #[test]
    fn test_irr_conventional_flows() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let est = irr(&cfs);
        // IRR ≈ 9.7%
        assert!((est.rate - dec!(0.097)).abs() < dec!(0.001));
        assert!(est.converged);
        assert!(npv(est.rate, &cfs).unwrap().abs() < IRR_RESIDUAL_TOLERANCE);
    }

    #[test]
    fn test_irr_above_initial_bracket() {
        // Root near 250%: requires doubling the upper bound twice.
        let cfs = vec![dec!(-100), dec!(350)];
        let est = irr(&cfs);
        assert!(est.converged);
        assert!((est.rate - dec!(2.5)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_irr_negative_root() {
        let cfs = vec![dec!(-1000), dec!(200), dec!(200)];
        let est = irr(&cfs);
        assert!(est.converged);
        assert!(est.rate < Decimal::ZERO);
    }

    #[test]
    fn test_irr_without_sign_change_is_flagged() {
        let cfs = vec![dec!(-500); 12];
        let est = irr(&cfs);
        assert!(!est.converged);
        assert!(est.rate >= IRR_LOWER_BOUND);
    }

    #[test]
    fn test_irr_all_positive_hits_upper_boundary() {
        let est = irr(&[dec!(10), dec!(10), dec!(10)]);
        assert!(!est.converged);
        assert!(est.rate > dec!(100));
    }

    #[test]
    fn test_payback_exact_period() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(payback(&cfs), Payback::Recovered(dec!(2)));
    }

    #[test]
    fn test_payback_fractional() {
        let cfs = vec![dec!(-100), dec!(40), dec!(40), dec!(40)];
        // after 2: -20, recovered 20/40 into period 3
        assert_eq!(payback(&cfs), Payback::Recovered(dec!(2.5)));
    }

    #[test]
    fn test_payback_already_non_negative() {
        let cfs = vec![dec!(0), dec!(10)];
        assert_eq!(payback(&cfs), Payback::Recovered(dec!(1)));
    }

    #[test]
    fn test_payback_not_recovered() {
        let cfs = vec![dec!(-100), dec!(10), dec!(10)];
        let p = payback(&cfs);
        assert_eq!(p, Payback::NotRecovered);
        assert!(p.periods().is_none());
    }

    #[test]
    fn test_count_sign_changes() {
        assert_eq!(count_sign_changes(&[dec!(-1), dec!(0), dec!(2), dec!(3)]), 1);
        assert_eq!(count_sign_changes(&[dec!(-1), dec!(2), dec!(-3)]), 2);
        assert_eq!(count_sign_changes(&[dec!(0), dec!(0)]), 0);
    }

    #[test]
    fn test_capital_recovery_factor_zero_rate() {
        assert_eq!(capital_recovery_factor(Decimal::ZERO, 4).unwrap(), dec!(0.25));
        assert!(capital_recovery_factor(dec!(0.1), 0).is_err());
    }

    proptest! {
        #[test]
        fn property_npv_at_zero_is_plain_sum(
            flows in prop::collection::vec(-1_000_000i64..1_000_000, 1..60),
        ) {
            let flows: Vec<Money> = flows.into_iter().map(Decimal::from).collect();
            let total: Decimal = flows.iter().sum();
            prop_assert_eq!(npv(Decimal::ZERO, &flows).unwrap(), total);
        }

        #[test]
        fn property_conventional_irr_sign_follows_undiscounted_sum(
            outlay in 100i64..1_000_000,
            inflow in 1i64..500_000,
            periods in 1usize..30,
        ) {
            let mut flows = vec![Decimal::from(-outlay)];
            flows.extend(std::iter::repeat(Decimal::from(inflow)).take(periods));
            let total: Decimal = flows.iter().sum();
            let est = irr(&flows);
            if est.converged && !total.is_zero() {
                prop_assert_eq!(est.rate > Decimal::ZERO, total > Decimal::ZERO);
            }
        }

        #[test]
        fn property_conventional_irr_zeroes_npv(
            outlay in 100i64..1_000_000,
            inflow_pcts in prop::collection::vec(10i64..=100, 1..30),
        ) {
            // Each inflow at most the outlay keeps the root below 100; a
            // non-negative undiscounted sum keeps it at or above zero.
            let outlay = Decimal::from(outlay);
            let mut flows = vec![-outlay];
            flows.extend(
                inflow_pcts
                    .iter()
                    .map(|pct| outlay * Decimal::from(*pct) / Decimal::ONE_HUNDRED),
            );
            let total: Decimal = flows.iter().sum();
            prop_assume!(total >= Decimal::ZERO);

            let est = irr(&flows);
            prop_assert!(est.converged);
            prop_assert!(npv(est.rate, &flows).unwrap().abs() < IRR_RESIDUAL_TOLERANCE);
        }
    }
}
