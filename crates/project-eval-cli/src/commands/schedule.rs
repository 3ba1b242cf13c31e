use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use project_eval_core::debt::schedule::{
    generate_schedule, AmortizationSystem, Capitalization, DebtParameters, RateType,
};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SystemArg {
    French,
    German,
    Bullet,
}

impl From<SystemArg> for AmortizationSystem {
    fn from(s: SystemArg) -> Self {
        match s {
            SystemArg::French => AmortizationSystem::French,
            SystemArg::German => AmortizationSystem::German,
            SystemArg::Bullet => AmortizationSystem::Bullet,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CapitalizationArg {
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl From<CapitalizationArg> for Capitalization {
    fn from(c: CapitalizationArg) -> Self {
        match c {
            CapitalizationArg::Monthly => Capitalization::Monthly,
            CapitalizationArg::Quarterly => Capitalization::Quarterly,
            CapitalizationArg::SemiAnnual => Capitalization::SemiAnnual,
            CapitalizationArg::Annual => Capitalization::Annual,
        }
    }
}

/// Arguments for a loan amortization schedule
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to a JSON/YAML file with debt parameters (overrides flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Principal borrowed
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Number of repayment periods
    #[arg(long, default_value = "5")]
    pub term: u32,

    /// Annual rate in percent (10 = 10%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Treat the rate as nominal, compounded at --capitalization
    #[arg(long)]
    pub nominal: bool,

    #[arg(long, default_value = "annual")]
    pub capitalization: CapitalizationArg,

    #[arg(long, default_value = "french")]
    pub system: SystemArg,
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params: DebtParameters = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        DebtParameters {
            enabled: true,
            amount: args
                .amount
                .ok_or("--amount is required (or provide --input)")?,
            equity: Decimal::ZERO,
            term: args.term,
            annual_rate_pct: args.rate.unwrap_or(dec!(10)),
            rate_type: if args.nominal {
                RateType::Nominal
            } else {
                RateType::Effective
            },
            capitalization: args.capitalization.into(),
            system: args.system.into(),
        }
    };

    let result = generate_schedule(&params)?;
    Ok(serde_json::to_value(result)?)
}
