use clap::Args;
use serde_json::{json, Value};

use project_eval_core::cash_flow::aggregation::{aggregate, CashFlowTotals};

use super::load_project;

/// Arguments for per-category totals
#[derive(Args)]
pub struct AggregateArgs {
    /// Path to a project file (JSON or YAML); stdin is read when omitted
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_aggregate(args: AggregateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let state = load_project(args.input.as_deref())?;
    let horizon = state.config.horizon;
    let totals = CashFlowTotals::from_categories(&state.categories, horizon);

    Ok(json!({
        "result": {
            "horizon": horizon,
            "categories": aggregate(&state.categories, horizon),
            "ebitda": totals.ebitda(),
            "investment_flows": totals.investment_flows(),
            "total_investment": totals.total_investment(),
        },
        "methodology": "Per-period sum of line items by category",
        "warnings": [],
    }))
}
