pub mod aggregate;
pub mod evaluate;
pub mod kpis;
pub mod optimize;
pub mod schedule;

use clap::ValueEnum;
use project_eval_core::project::snapshot::ProjectState;
use project_eval_core::valuation::evaluation::EvaluationMode;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// FCFF discounted at WACC
    Project,
    /// FCFE discounted at the cost of equity
    Equity,
}

impl From<ModeArg> for EvaluationMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Project => EvaluationMode::Project,
            ModeArg::Equity => EvaluationMode::Equity,
        }
    }
}

/// Load a project from `--input` or piped stdin.
pub fn load_project(path: Option<&str>) -> Result<ProjectState, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        input::file::read_document(path)
    } else if let Some(data) = input::stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err("a project is required: pass --input <file> or pipe JSON/YAML on stdin".into())
    }
}
