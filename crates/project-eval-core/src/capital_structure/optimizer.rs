use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::cash_flow::aggregation::{CashFlowTotals, Category};
use crate::debt::schedule::AmortizationSystem;
use crate::types::*;
use crate::valuation::evaluation::{evaluate, validate_configuration, EvaluationConfiguration};
use crate::valuation::kpis::KpiSet;
use crate::ProjectEvalResult;

use super::search_space::{Candidate, OptimizerSettings, SearchSpace, TargetMetric};

/// Lowest FCFE tolerated in any operating period before a point is
/// considered unable to service its debt.
pub const FEASIBILITY_TOLERANCE: Money = dec!(-0.01);

impl TargetMetric {
    pub fn extract(self, kpis: &KpiSet) -> Money {
        match self {
            TargetMetric::Npv => kpis.npv,
            TargetMetric::AnnualEquivalent => kpis.annual_equivalent_value,
        }
    }
}

/// Best financing found, or the original one when nothing beat it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutput {
    pub target: TargetMetric,
    pub debt_amount: Money,
    pub equity_amount: Money,
    pub debt_ratio: Rate,
    pub amortization_system: AmortizationSystem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizon: Option<u32>,
    pub metric_value: Money,
    pub baseline_metric: Money,
    /// False when the original structure was kept
    pub improved: bool,
    pub evaluated_points: usize,
    pub feasible_points: usize,
}

/// Search wrapped in the standard envelope.
pub fn run_optimization(
    config: &EvaluationConfiguration,
    categories: &[Category],
    settings: &OptimizerSettings,
) -> ProjectEvalResult<ComputationOutput<OptimizationOutput>> {
    let start = Instant::now();

    let output = optimize(config, categories, settings)?;

    let mut warnings = Vec::new();
    if !output.improved {
        warnings.push(
            "No feasible structure improved on the current one; it is returned unchanged".into(),
        );
    }
    if output.feasible_points == 0 {
        warnings.push("No grid point kept FCFE non-negative in every operating period".into());
    }
    let chosen_horizon = output.horizon.unwrap_or(config.horizon);
    if output.debt_ratio > Decimal::ZERO && config.debt.term > chosen_horizon {
        warnings.push(format!(
            "Debt term ({}) exceeds horizon ({}): repayments after the horizon are not evaluated",
            config.debt.term, chosen_horizon
        ));
    }
    if settings.horizon_range.is_some() && settings.target == TargetMetric::Npv {
        warnings.push(
            "NPV grows with the horizon; compare horizons on the annual equivalent value".into(),
        );
    }

    let assumptions = serde_json::json!({
        "configuration": config,
        "settings": settings,
        "feasibility_tolerance": FEASIBILITY_TOLERANCE.to_string(),
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Grid search over debt ratio and amortization system",
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// Exhaustive grid search for the financing that maximizes the target.
///
/// A point is feasible when its FCFE is at least `FEASIBILITY_TOLERANCE` in
/// every period after the first. Only a strictly
/// better feasible point replaces the running best, which starts at the
/// current configuration's metric, so ties keep the current structure.
pub fn optimize(
    config: &EvaluationConfiguration,
    categories: &[Category],
    settings: &OptimizerSettings,
) -> ProjectEvalResult<OptimizationOutput> {
    validate_configuration(config)?;
    let space = SearchSpace::new(settings)?;

    let baseline = evaluate(config, categories)?;
    let baseline_metric = settings.target.extract(&baseline.kpis);

    let total_capital = {
        let v = config.debt.amount + config.debt.equity;
        if v.is_zero() {
            CashFlowTotals::from_categories(categories, config.horizon).total_investment()
        } else {
            v
        }
    };

    let mut best: Option<(Candidate, Money)> = None;
    let mut best_metric = baseline_metric;
    let mut evaluated_points = 0usize;
    let mut feasible_points = 0usize;

    for candidate in space.candidates() {
        evaluated_points += 1;
        let candidate_config = candidate.apply(config, total_capital);

        let evaluation = match evaluate(&candidate_config, categories) {
            Ok(e) => e,
            Err(e) => {
                debug!(?candidate, error = %e, "candidate skipped");
                continue;
            }
        };

        let feasible = is_feasible(&evaluation.fcfe);
        let metric = settings.target.extract(&evaluation.kpis);
        debug!(
            debt_ratio = %candidate.debt_ratio,
            system = ?candidate.system,
            horizon = ?candidate.horizon,
            metric = %metric,
            feasible,
            "candidate evaluated"
        );

        if !feasible {
            continue;
        }
        feasible_points += 1;

        if metric > best_metric {
            best_metric = metric;
            best = Some((candidate, metric));
        }
    }

    let searched_horizon = settings.horizon_range.map(|_| config.horizon);

    let output = match best {
        Some((candidate, metric)) => {
            let applied = candidate.apply(config, total_capital);
            OptimizationOutput {
                target: settings.target,
                debt_amount: applied.debt.amount,
                equity_amount: applied.debt.equity,
                debt_ratio: candidate.debt_ratio,
                amortization_system: candidate.system,
                horizon: candidate.horizon,
                metric_value: metric,
                baseline_metric,
                improved: true,
                evaluated_points,
                feasible_points,
            }
        }
        None => OptimizationOutput {
            target: settings.target,
            debt_amount: config.debt.amount,
            equity_amount: config.debt.equity,
            debt_ratio: current_debt_ratio(config),
            amortization_system: config.debt.system,
            horizon: searched_horizon,
            metric_value: baseline_metric,
            baseline_metric,
            improved: false,
            evaluated_points,
            feasible_points,
        },
    };

    info!(
        evaluated = evaluated_points,
        feasible = feasible_points,
        improved = output.improved,
        metric = %output.metric_value,
        "capital structure search finished"
    );

    Ok(output)
}

/// FCFE never falls below the tolerance after the investment period.
pub fn is_feasible(fcfe: &[Money]) -> bool {
    fcfe.iter().skip(1).all(|cf| *cf >= FEASIBILITY_TOLERANCE)
}

fn current_debt_ratio(config: &EvaluationConfiguration) -> Rate {
    let v = config.debt.amount + config.debt.equity;
    if !config.debt.enabled || v.is_zero() {
        Decimal::ZERO
    } else {
        config.debt.amount / v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cash_flow::aggregation::{CategoryKind, LineItem};
    use crate::capital_structure::search_space::HorizonRange;
    use crate::debt::schedule::DebtParameters;
    use pretty_assertions::assert_eq;

    fn category(kind: CategoryKind, values: Vec<Money>) -> Category {
        Category {
            id: kind,
            label: String::new(),
            items: vec![LineItem {
                id: "1".into(),
                label: String::new(),
                values,
            }],
        }
    }

    fn project(revenue: Money) -> Vec<Category> {
        vec![
            category(CategoryKind::Revenue, vec![Decimal::ZERO, revenue, revenue, revenue, revenue, revenue]),
            category(CategoryKind::Capex, vec![dec!(1000)]),
        ]
    }

    fn config() -> EvaluationConfiguration {
        EvaluationConfiguration {
            ke_pct: dec!(15),
            tax_rate_pct: dec!(30),
            debt: DebtParameters {
                enabled: false,
                amount: Decimal::ZERO,
                equity: dec!(1000),
                term: 5,
                annual_rate_pct: dec!(8),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_cheap_debt_is_used_when_serviceable() {
        // Kd after tax 5.6% against Ke 15%: leverage lowers WACC
        let out = optimize(&config(), &project(dec!(400)), &OptimizerSettings::default()).unwrap();
        assert!(out.improved);
        assert!(out.debt_ratio > Decimal::ZERO);
        assert!(out.metric_value > out.baseline_metric);
        assert_eq!(out.evaluated_points, 63);
        assert_eq!(out.debt_amount + out.equity_amount, dec!(1000));
    }

    #[test]
    fn test_best_point_is_feasible() {
        let settings = OptimizerSettings::default();
        let base = config();
        let cats = project(dec!(300));
        let out = optimize(&base, &cats, &settings).unwrap();

        let mut applied = base.clone();
        applied.debt.enabled = out.debt_amount > Decimal::ZERO;
        applied.debt.amount = out.debt_amount;
        applied.debt.equity = out.equity_amount;
        applied.debt.system = out.amortization_system;
        let check = evaluate(&applied, &cats).unwrap();
        assert!(is_feasible(&check.fcfe));
        assert_eq!(settings.target.extract(&check.kpis), out.metric_value);
    }

    #[test]
    fn test_nothing_better_keeps_original_structure() {
        // Debt costlier than equity: every leveraged point raises WACC
        let mut base = config();
        base.ke_pct = dec!(5);
        base.debt.annual_rate_pct = dec!(40);
        let out = optimize(&base, &project(dec!(400)), &OptimizerSettings::default()).unwrap();
        assert!(!out.improved);
        assert_eq!(out.debt_amount, Decimal::ZERO);
        assert_eq!(out.equity_amount, dec!(1000));
        assert_eq!(out.metric_value, out.baseline_metric);
        assert!(out.horizon.is_none());
    }

    #[test]
    fn test_zero_capital_falls_back_to_total_investment() {
        let mut base = config();
        base.debt.equity = Decimal::ZERO;
        let out = optimize(&base, &project(dec!(400)), &OptimizerSettings::default()).unwrap();
        assert!(out.improved);
        assert_eq!(out.debt_amount + out.equity_amount, dec!(1000));
    }

    #[test]
    fn test_horizon_search_reports_horizon() {
        let settings = OptimizerSettings {
            target: TargetMetric::AnnualEquivalent,
            debt_ratio_step_pct: 25,
            horizon_range: Some(HorizonRange { min: 3, max: 5 }),
        };
        let out = optimize(&config(), &project(dec!(400)), &settings).unwrap();
        assert_eq!(out.evaluated_points, 5 * 3 * 3);
        let horizon = out.horizon.unwrap();
        assert!((3..=5).contains(&horizon));
    }

    #[test]
    fn test_loan_longer_than_horizon_can_win() {
        // 10-period loan over a 5-period project: equity flows stay positive
        let mut base = config();
        base.debt.term = 10;
        let out = optimize(&base, &project(dec!(400)), &OptimizerSettings::default()).unwrap();
        assert!(out.improved);
        assert!(out.debt_amount > Decimal::ZERO);
        assert!(out.metric_value > out.baseline_metric);

        let envelope =
            run_optimization(&base, &project(dec!(400)), &OptimizerSettings::default()).unwrap();
        assert!(envelope.warnings.iter().any(|w| w.contains("exceeds horizon")));
    }

    #[test]
    fn test_feasibility_tolerance() {
        assert!(is_feasible(&[dec!(-1000), dec!(-0.01), dec!(5)]));
        assert!(!is_feasible(&[dec!(-1000), dec!(-0.02), dec!(5)]));
        assert!(is_feasible(&[dec!(-1000)]));
    }

    #[test]
    fn test_envelope_warns_when_unchanged() {
        let mut base = config();
        base.ke_pct = dec!(5);
        base.debt.annual_rate_pct = dec!(40);
        let out = run_optimization(&base, &project(dec!(400)), &OptimizerSettings::default()).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("unchanged")));
    }

    #[test]
    fn test_search_is_deterministic() {
        let settings = OptimizerSettings::default();
        let a = optimize(&config(), &project(dec!(350)), &settings).unwrap();
        let b = optimize(&config(), &project(dec!(350)), &settings).unwrap();
        assert_eq!(a, b);
    }
}
