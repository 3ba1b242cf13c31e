use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use project_eval_core::types::pct_to_rate;
use project_eval_core::valuation::kpis::{run_kpis, KpiInput};

use crate::input;

/// Arguments for scoring a bare cash-flow series
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct KpisArgs {
    /// Cash flows, comma separated, period 0 first (e.g. -1000,300,300)
    #[arg(long, value_delimiter = ',')]
    pub flows: Vec<Decimal>,

    /// Discount rate in percent (10 = 10%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Path to a JSON/YAML file with `cash_flows` and `discount_rate`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_kpis_command(args: KpisArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let kpi_input: KpiInput = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if !args.flows.is_empty() {
        KpiInput {
            cash_flows: args.flows,
            discount_rate: pct_to_rate(args.rate.ok_or("--rate is required with --flows")?),
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("provide --flows and --rate, --input, or pipe JSON on stdin".into());
    };

    let result = run_kpis(&kpi_input)?;
    Ok(serde_json::to_value(result)?)
}
