use clap::{Args, ValueEnum};
use serde_json::Value;

use project_eval_core::capital_structure::optimizer::run_optimization;
use project_eval_core::capital_structure::search_space::{
    HorizonRange, OptimizerSettings, TargetMetric,
};

use super::load_project;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TargetArg {
    /// Net present value
    Van,
    /// Annual equivalent value
    Vae,
}

impl From<TargetArg> for TargetMetric {
    fn from(t: TargetArg) -> Self {
        match t {
            TargetArg::Van => TargetMetric::Npv,
            TargetArg::Vae => TargetMetric::AnnualEquivalent,
        }
    }
}

/// Arguments for the capital-structure search
#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to a project file (JSON or YAML); stdin is read when omitted
    #[arg(long)]
    pub input: Option<String>,

    /// Metric to maximize
    #[arg(long, default_value = "van")]
    pub target: TargetArg,

    /// Debt-ratio grid spacing in percentage points
    #[arg(long, default_value = "5")]
    pub step: u32,

    /// Smallest horizon to search (requires --horizon-max)
    #[arg(long, requires = "horizon_max")]
    pub horizon_min: Option<u32>,

    /// Largest horizon to search (requires --horizon-min)
    #[arg(long, requires = "horizon_min")]
    pub horizon_max: Option<u32>,
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let state = load_project(args.input.as_deref())?;

    let horizon_range = match (args.horizon_min, args.horizon_max) {
        (Some(min), Some(max)) => Some(HorizonRange { min, max }),
        _ => None,
    };
    let settings = OptimizerSettings {
        target: args.target.into(),
        debt_ratio_step_pct: args.step,
        horizon_range,
    };

    let result = run_optimization(&state.config, &state.categories, &settings)?;
    Ok(serde_json::to_value(result)?)
}
