pub mod evaluation;
pub mod kpis;
pub mod wacc;
