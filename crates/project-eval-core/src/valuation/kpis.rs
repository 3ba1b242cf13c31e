use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ProjectEvalError;
use crate::time_value::{capital_recovery_factor, count_sign_changes, irr, npv, payback, Payback};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::ProjectEvalResult;

/// A bare flow series to score, outside of any project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiInput {
    pub cash_flows: Vec<Money>,
    /// Discount rate as a decimal (0.10 = 10%)
    pub discount_rate: Rate,
}

/// Decision indicators for one flow series at one discount rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSet {
    /// Net present value (VAN)
    pub npv: Money,
    /// Internal rate of return (TIR), bisection estimate
    pub irr: Rate,
    /// False when no root was bracketed; `irr` is then a boundary value
    pub irr_converged: bool,
    /// Payback period (PRI), in periods
    pub payback: Payback,
    /// Discounted benefits over initial investment (B/C)
    pub benefit_cost_ratio: Decimal,
    /// NPV / initial investment + 1 (IR)
    pub profitability_index: Decimal,
    /// NPV / initial investment (IVAN)
    pub npv_index: Decimal,
    /// NPV spread as an equivalent per-period annuity (VAE)
    pub annual_equivalent_value: Money,
    /// |flows[0]|, or 1 when the first flow is zero
    pub initial_investment: Money,
    /// Present value of flows[1..]
    pub discounted_benefits: Money,
}

pub fn run_kpis(input: &KpiInput) -> ProjectEvalResult<ComputationOutput<KpiSet>> {
    let start = Instant::now();
    let kpis = compute_kpis(&input.cash_flows, input.discount_rate)?;

    let mut warnings = Vec::new();
    if !kpis.irr_converged {
        warnings.push(format!("IRR did not converge; {} is a boundary value", kpis.irr));
    }
    if !kpis.payback.is_recovered() {
        warnings.push("Investment is not recovered within the series".into());
    }
    if count_sign_changes(&input.cash_flows) > 1 {
        warnings.push("Several sign changes: IRR may not be unique".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Discounted cash flow indicators (NPV, IRR, payback, B/C, PI, AEV)",
        input,
        warnings,
        elapsed,
        kpis,
    ))
}

/// Compute every indicator for `cash_flows` discounted at `rate`.
///
/// A zero initial flow makes the ratio denominators fall back to 1 instead
/// of failing. With a single flow there is no period to spread the NPV over
/// and the annual equivalent value equals the NPV.
pub fn compute_kpis(cash_flows: &[Money], rate: Rate) -> ProjectEvalResult<KpiSet> {
    let Some(first) = cash_flows.first() else {
        return Err(ProjectEvalError::InsufficientData(
            "At least one cash flow is required".into(),
        ));
    };

    let van = npv(rate, cash_flows)?;

    let mut benefit_flows = cash_flows.to_vec();
    benefit_flows[0] = Decimal::ZERO;
    let discounted_benefits = npv(rate, &benefit_flows)?;

    let initial_investment = if first.is_zero() {
        Decimal::ONE
    } else {
        first.abs()
    };

    let npv_index = van / initial_investment;
    let irr_estimate = irr(cash_flows);

    Ok(KpiSet {
        npv: van,
        irr: irr_estimate.rate,
        irr_converged: irr_estimate.converged,
        payback: payback(cash_flows),
        benefit_cost_ratio: discounted_benefits / initial_investment,
        profitability_index: npv_index + Decimal::ONE,
        npv_index,
        annual_equivalent_value: annual_equivalent_value(van, rate, cash_flows.len())?,
        initial_investment,
        discounted_benefits,
    })
}

fn annual_equivalent_value(van: Money, rate: Rate, n_flows: usize) -> ProjectEvalResult<Money> {
    let periods = n_flows.saturating_sub(1);
    if periods == 0 {
        return Ok(van);
    }

    if rate > Decimal::ZERO {
        let nper = u32::try_from(periods).map_err(|_| ProjectEvalError::InvalidInput {
            field: "cash_flows".into(),
            reason: "Too many periods".into(),
        })?;
        Ok(van * capital_recovery_factor(rate, nper)?)
    } else {
        Ok(van / Decimal::from(periods as u64))
    }
}
