use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use project_eval_core::capital_structure::{optimizer, search_space::OptimizerSettings};
use project_eval_core::cash_flow::aggregation::{self, CashFlowTotals, CategoryKind};
use project_eval_core::debt::schedule::{self, DebtParameters};
use project_eval_core::project::snapshot::{ProjectState, PropagationMode};
use project_eval_core::valuation::evaluation::{self, Periodicity};
use project_eval_core::valuation::kpis::{self, KpiInput};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse<'a, T: Deserialize<'a>>(input_json: &'a str) -> NapiResult<T> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

fn render<T: serde::Serialize>(output: &T) -> NapiResult<String> {
    serde_json::to_string(output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[napi]
pub fn evaluate(input_json: String) -> NapiResult<String> {
    let state: ProjectState = parse(&input_json)?;
    let output =
        evaluation::run_evaluation(&state.config, &state.categories).map_err(to_napi_error)?;
    render(&output)
}

#[derive(Deserialize)]
struct OptimizeRequest {
    #[serde(flatten)]
    project: ProjectState,
    #[serde(default)]
    settings: OptimizerSettings,
}

#[napi]
pub fn optimize(input_json: String) -> NapiResult<String> {
    let request: OptimizeRequest = parse(&input_json)?;
    let output = optimizer::run_optimization(
        &request.project.config,
        &request.project.categories,
        &request.settings,
    )
    .map_err(to_napi_error)?;
    render(&output)
}

#[napi]
pub fn compute_kpis(input_json: String) -> NapiResult<String> {
    let input: KpiInput = parse(&input_json)?;
    let output = kpis::run_kpis(&input).map_err(to_napi_error)?;
    render(&output)
}

// ---------------------------------------------------------------------------
// Debt and cash flows
// ---------------------------------------------------------------------------

#[napi]
pub fn generate_schedule(input_json: String) -> NapiResult<String> {
    let params: DebtParameters = parse(&input_json)?;
    let output = schedule::generate_schedule(&params).map_err(to_napi_error)?;
    render(&output)
}

#[napi]
pub fn aggregate(input_json: String) -> NapiResult<String> {
    let state: ProjectState = parse(&input_json)?;
    let horizon = state.config.horizon;
    let totals = CashFlowTotals::from_categories(&state.categories, horizon);
    render(&serde_json::json!({
        "horizon": horizon,
        "categories": aggregation::aggregate(&state.categories, horizon),
        "ebitda": totals.ebitda(),
        "investment_flows": totals.investment_flows(),
        "total_investment": totals.total_investment(),
    }))
}

// ---------------------------------------------------------------------------
// Project editing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct PropagateRequest {
    project: ProjectState,
    category: CategoryKind,
    item_id: String,
    index: usize,
    value: Decimal,
    #[serde(default)]
    mode: PropagationMode,
}

#[napi]
pub fn propagate_value(input_json: String) -> NapiResult<String> {
    let request: PropagateRequest = parse(&input_json)?;
    let next = request
        .project
        .propagate_value(
            request.category,
            &request.item_id,
            request.index,
            request.value,
            request.mode,
        )
        .map_err(to_napi_error)?;
    render(&next)
}

#[derive(Deserialize)]
struct HorizonRequest {
    project: ProjectState,
    horizon: u32,
}

#[napi]
pub fn set_horizon(input_json: String) -> NapiResult<String> {
    let request: HorizonRequest = parse(&input_json)?;
    let next = request
        .project
        .set_horizon(request.horizon)
        .map_err(to_napi_error)?;
    render(&next)
}

#[derive(Deserialize)]
struct PeriodicityRequest {
    project: ProjectState,
    target: Periodicity,
    #[serde(default)]
    propagate_first_year: bool,
}

#[napi]
pub fn change_periodicity(input_json: String) -> NapiResult<String> {
    let request: PeriodicityRequest = parse(&input_json)?;
    let next = request
        .project
        .change_periodicity(request.target, request.propagate_first_year)
        .map_err(to_napi_error)?;
    render(&next)
}
