use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::debt::schedule::AmortizationSystem;
use crate::error::ProjectEvalError;
use crate::types::{pct_to_rate, Money, Rate};
use crate::valuation::evaluation::EvaluationConfiguration;
use crate::ProjectEvalResult;

/// Indicator the optimizer maximizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMetric {
    /// Net present value
    #[default]
    #[serde(alias = "van")]
    Npv,
    /// Annual equivalent value
    #[serde(alias = "vae")]
    AnnualEquivalent,
}

/// Inclusive range of horizons to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub target: TargetMetric,
    /// Spacing of the debt-ratio grid in percentage points
    pub debt_ratio_step_pct: u32,
    /// Also search the horizon when present. The caller bounds the grid size.
    pub horizon_range: Option<HorizonRange>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        OptimizerSettings {
            target: TargetMetric::Npv,
            debt_ratio_step_pct: 5,
            horizon_range: None,
        }
    }
}

/// One point of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub debt_ratio: Rate,
    pub system: AmortizationSystem,
    pub horizon: Option<u32>,
}

impl Candidate {
    /// The base configuration with this point's financing applied.
    ///
    /// Total capital is split into `debt_ratio` debt and the rest equity;
    /// debt is enabled only when its amount is positive. The base term and
    /// rate are kept.
    pub fn apply(&self, base: &EvaluationConfiguration, total_capital: Money) -> EvaluationConfiguration {
        let mut config = base.clone();
        let debt_amount = total_capital * self.debt_ratio;

        config.debt.amount = debt_amount;
        config.debt.equity = total_capital - debt_amount;
        config.debt.enabled = debt_amount > Decimal::ZERO;
        config.debt.system = self.system;
        if let Some(h) = self.horizon {
            config.horizon = h;
        }
        config
    }
}

/// Grid of debt ratios × amortization systems × (optional) horizons.
#[derive(Debug, Clone)]
pub struct SearchSpace {
    debt_ratios: Vec<Rate>,
    systems: Vec<AmortizationSystem>,
    horizons: Vec<Option<u32>>,
}

impl SearchSpace {
    pub fn new(settings: &OptimizerSettings) -> ProjectEvalResult<Self> {
        let step = settings.debt_ratio_step_pct;
        if step == 0 || step > 100 {
            return Err(ProjectEvalError::InvalidInput {
                field: "debt_ratio_step_pct".into(),
                reason: "Step must be between 1 and 100 percentage points".into(),
            });
        }

        let mut ratios_pct: Vec<u32> = (0..=100).step_by(step as usize).collect();
        if ratios_pct.last() != Some(&100) {
            ratios_pct.push(100);
        }

        let horizons = match settings.horizon_range {
            None => vec![None],
            Some(range) => {
                if range.min < 1 || range.max < range.min {
                    return Err(ProjectEvalError::InvalidInput {
                        field: "horizon_range".into(),
                        reason: format!(
                            "Invalid range {}..={}: need 1 <= min <= max",
                            range.min, range.max
                        ),
                    });
                }
                (range.min..=range.max).map(Some).collect()
            }
        };

        Ok(SearchSpace {
            debt_ratios: ratios_pct
                .into_iter()
                .map(|p| pct_to_rate(Decimal::from(p)))
                .collect(),
            systems: AmortizationSystem::ALL.to_vec(),
            horizons,
        })
    }

    pub fn len(&self) -> usize {
        self.debt_ratios.len() * self.systems.len() * self.horizons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every candidate, ratio-major, without materializing the grid.
    pub fn candidates(&self) -> impl Iterator<Item = Candidate> + '_ {
        self.debt_ratios.iter().flat_map(move |&debt_ratio| {
            self.systems.iter().flat_map(move |&system| {
                self.horizons.iter().map(move |&horizon| Candidate {
                    debt_ratio,
                    system,
                    horizon,
                })
            })
        })
    }
}
