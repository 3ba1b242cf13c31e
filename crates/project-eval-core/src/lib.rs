pub mod cash_flow;
pub mod debt;
pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "capital_structure")]
pub mod capital_structure;

#[cfg(feature = "project")]
pub mod project;

pub use error::ProjectEvalError;
pub use types::*;

/// Standard result type for all project-eval operations
pub type ProjectEvalResult<T> = Result<T, ProjectEvalError>;
