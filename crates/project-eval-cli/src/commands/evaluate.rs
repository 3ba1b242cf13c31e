use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use project_eval_core::project::snapshot::ProjectState;
use project_eval_core::valuation::evaluation::run_evaluation;

use super::{load_project, ModeArg};

/// Arguments for a full project evaluation
#[derive(Args)]
pub struct EvaluateArgs {
    /// Path to a project file (JSON or YAML); stdin is read when omitted
    #[arg(long)]
    pub input: Option<String>,

    /// Override the horizon; item values are resized to match
    #[arg(long)]
    pub horizon: Option<u32>,

    /// Override the evaluation mode
    #[arg(long)]
    pub mode: Option<ModeArg>,

    /// Override the cost of equity, in percent (15 = 15%)
    #[arg(long)]
    pub ke: Option<Decimal>,

    /// Override the tax rate, in percent
    #[arg(long)]
    pub tax_rate: Option<Decimal>,
}

pub fn run_evaluate(args: EvaluateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let state = apply_overrides(load_project(args.input.as_deref())?, &args)?;
    let result = run_evaluation(&state.config, &state.categories)?;
    Ok(serde_json::to_value(result)?)
}

fn apply_overrides(
    state: ProjectState,
    args: &EvaluateArgs,
) -> Result<ProjectState, Box<dyn std::error::Error>> {
    let mut state = match args.horizon {
        Some(h) => state.set_horizon(h)?,
        None => state,
    };
    if let Some(mode) = args.mode {
        state.config.eval_mode = mode.into();
    }
    if let Some(ke) = args.ke {
        state.config.ke_pct = ke;
    }
    if let Some(tax) = args.tax_rate {
        state.config.tax_rate_pct = tax;
    }
    Ok(state)
}
