use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::cash_flow::aggregation::{CashFlowTotals, Category};
use crate::debt::schedule::{build_schedule, DebtParameters};
use crate::error::ProjectEvalError;
use crate::time_value::count_sign_changes;
use crate::types::*;
use crate::ProjectEvalResult;

use super::kpis::{compute_kpis, KpiSet};
use super::wacc::{calculate_wacc, WaccInput};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which flow series is discounted, and at which rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// FCFF discounted at WACC
    #[default]
    Project,
    /// FCFE discounted at Ke
    Equity,
}

/// Length of one period. Rates are applied per period as entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Periodicity {
    Monthly,
    #[default]
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfiguration {
    pub periodicity: Periodicity,
    /// Number of operating periods; series hold `horizon + 1` values
    pub horizon: u32,
    /// Cost of equity in percent
    #[serde(alias = "ke")]
    pub ke_pct: Percent,
    /// Income tax rate in percent
    #[serde(alias = "taxRate")]
    pub tax_rate_pct: Percent,
    pub debt: DebtParameters,
    #[serde(alias = "evalMode")]
    pub eval_mode: EvaluationMode,
}

impl Default for EvaluationConfiguration {
    fn default() -> Self {
        EvaluationConfiguration {
            periodicity: Periodicity::Yearly,
            horizon: 5,
            ke_pct: Decimal::from(15),
            tax_rate_pct: Decimal::from(35),
            debt: DebtParameters::default(),
            eval_mode: EvaluationMode::Project,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Positive NPV and IRR above the discount rate
    Viable,
    /// Non-positive NPV but a positive return
    Marginal,
    NotViable,
}

impl Verdict {
    pub fn assess(kpis: &KpiSet, discount_rate: Rate) -> Self {
        if kpis.npv > Decimal::ZERO && kpis.irr > discount_rate {
            Verdict::Viable
        } else if kpis.npv <= Decimal::ZERO && kpis.irr > Decimal::ZERO {
            Verdict::Marginal
        } else {
            Verdict::NotViable
        }
    }
}

/// Per-period statements and indicators. Every series has `horizon + 1` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutput {
    pub eval_mode: EvaluationMode,
    pub ebitda: PeriodSeries,
    /// No depreciation is modelled, so EBIT equals EBITDA
    pub ebit: PeriodSeries,
    pub taxes: PeriodSeries,
    pub interest: PeriodSeries,
    pub principal: PeriodSeries,
    pub fcff: PeriodSeries,
    pub fcfe: PeriodSeries,
    pub wacc: Rate,
    pub discount_rate: Rate,
    pub total_investment: Money,
    pub kpis: KpiSet,
    pub verdict: Verdict,
}

impl EvaluationOutput {
    /// The series the indicators were computed on.
    pub fn active_flows(&self) -> &[Money] {
        match self.eval_mode {
            EvaluationMode::Project => &self.fcff,
            EvaluationMode::Equity => &self.fcfe,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Full evaluation wrapped in the standard envelope, with warnings about
/// results that need care when read.
pub fn run_evaluation(
    config: &EvaluationConfiguration,
    categories: &[Category],
) -> ProjectEvalResult<ComputationOutput<EvaluationOutput>> {
    let start = Instant::now();

    let output = evaluate(config, categories)?;
    let warnings = evaluation_warnings(config, &output);

    if !output.kpis.irr_converged {
        warn!(
            irr = %output.kpis.irr,
            "IRR did not converge; the reported rate is a search boundary"
        );
    }

    let methodology = match config.eval_mode {
        EvaluationMode::Project => "DCF evaluation: FCFF discounted at WACC",
        EvaluationMode::Equity => "DCF evaluation: FCFE discounted at cost of equity",
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(methodology, config, warnings, elapsed, output))
}

/// Aggregate the categories, build the statements for both evaluation
/// modes and compute the indicators on the active one.
///
/// Pure: identical inputs produce identical outputs.
pub fn evaluate(
    config: &EvaluationConfiguration,
    categories: &[Category],
) -> ProjectEvalResult<EvaluationOutput> {
    validate_configuration(config)?;

    let totals = CashFlowTotals::from_categories(categories, config.horizon);
    let n_periods = totals.periods();

    let ebitda = totals.ebitda();
    let ebit = ebitda.clone();
    let (interest, principal) = debt_service(&config.debt, n_periods)?;

    let tax_rate = pct_to_rate(config.tax_rate_pct);
    let taxes: PeriodSeries = ebit
        .iter()
        .zip(&interest)
        .map(|(e, i)| {
            let base = match config.eval_mode {
                EvaluationMode::Project => *e,
                EvaluationMode::Equity => e - i.abs(),
            };
            base.max(Decimal::ZERO) * tax_rate
        })
        .collect();

    let investment = totals.investment_flows();
    let fcff: PeriodSeries = (0..n_periods)
        .map(|t| ebit[t] - taxes[t] + investment[t])
        .collect();

    let fcfe: PeriodSeries = if config.debt.enabled {
        (0..n_periods)
            .map(|t| {
                let disbursement = if t == 0 {
                    config.debt.amount
                } else {
                    Decimal::ZERO
                };
                fcff[t] + disbursement - interest[t].abs() - principal[t].abs()
            })
            .collect()
    } else {
        fcff.clone()
    };

    let wacc = calculate_wacc(&WaccInput::from_config(config)?).wacc;
    let discount_rate = match config.eval_mode {
        EvaluationMode::Project => wacc,
        EvaluationMode::Equity => pct_to_rate(config.ke_pct),
    };

    let active = match config.eval_mode {
        EvaluationMode::Project => &fcff,
        EvaluationMode::Equity => &fcfe,
    };
    let kpis = compute_kpis(active, discount_rate)?;
    let verdict = Verdict::assess(&kpis, discount_rate);

    debug!(
        mode = ?config.eval_mode,
        horizon = config.horizon,
        npv = %kpis.npv,
        discount_rate = %discount_rate,
        "project evaluated"
    );

    Ok(EvaluationOutput {
        eval_mode: config.eval_mode,
        ebitda,
        ebit,
        taxes,
        interest,
        principal,
        fcff,
        fcfe,
        wacc,
        discount_rate,
        total_investment: totals.total_investment(),
        kpis,
        verdict,
    })
}

/// Interest and principal aligned to period indices. Schedule period `p`
/// lands at index `p`; payments past the horizon are dropped.
fn debt_service(
    debt: &DebtParameters,
    n_periods: usize,
) -> ProjectEvalResult<(PeriodSeries, PeriodSeries)> {
    let mut interest = vec![Decimal::ZERO; n_periods];
    let mut principal = vec![Decimal::ZERO; n_periods];

    if !debt.enabled {
        return Ok((interest, principal));
    }

    let rate = debt.effective_annual_rate()?;
    for entry in build_schedule(debt.amount, debt.term, rate, debt.system)? {
        let p = entry.period as usize;
        if p < n_periods {
            interest[p] = entry.interest;
            principal[p] = entry.principal;
        }
    }

    Ok((interest, principal))
}

pub fn validate_configuration(config: &EvaluationConfiguration) -> ProjectEvalResult<()> {
    if config.horizon < 1 {
        return Err(ProjectEvalError::InvalidInput {
            field: "horizon".into(),
            reason: "Horizon must be at least one period".into(),
        });
    }
    if config.ke_pct <= -Decimal::ONE_HUNDRED {
        return Err(ProjectEvalError::InvalidInput {
            field: "ke_pct".into(),
            reason: "Cost of equity must be greater than -100%".into(),
        });
    }
    if config.tax_rate_pct < Decimal::ZERO || config.tax_rate_pct > Decimal::ONE_HUNDRED {
        return Err(ProjectEvalError::InvalidInput {
            field: "tax_rate_pct".into(),
            reason: "Tax rate must be between 0 and 100".into(),
        });
    }
    if config.debt.enabled && config.debt.term < 1 {
        return Err(ProjectEvalError::InvalidInput {
            field: "debt.term".into(),
            reason: "Debt term must be at least one period".into(),
        });
    }
    Ok(())
}

fn evaluation_warnings(config: &EvaluationConfiguration, output: &EvaluationOutput) -> Vec<String> {
    let mut warnings = Vec::new();
    let flows = output.active_flows();

    if !output.kpis.irr_converged {
        warnings.push(format!(
            "IRR search did not bracket a root; {} is a boundary value, not a return",
            output.kpis.irr
        ));
    }
    if !output.kpis.payback.is_recovered() {
        warnings.push("Investment is not recovered within the horizon".into());
    }
    if flows.first().is_some_and(|cf| cf.is_zero()) {
        warnings.push(
            "Initial flow is zero: ratio indicators use 1 as the investment denominator".into(),
        );
    }
    let sign_changes = count_sign_changes(flows);
    if sign_changes > 1 {
        warnings.push(format!(
            "Cash flows change sign {sign_changes} times: IRR may not be unique"
        ));
    }

    let debt = &config.debt;
    if debt.enabled {
        if debt.term > config.horizon {
            warnings.push(format!(
                "Debt term ({}) exceeds horizon ({}): payments after the horizon are excluded",
                debt.term, config.horizon
            ));
        }
        let financing = debt.amount + debt.equity;
        if financing != output.total_investment {
            warnings.push(format!(
                "Debt plus equity ({financing}) differs from total investment ({})",
                output.total_investment
            ));
        }
    }

    warnings
}
