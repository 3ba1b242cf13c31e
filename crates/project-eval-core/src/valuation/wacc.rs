use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::*;
use crate::valuation::evaluation::EvaluationConfiguration;
use crate::ProjectEvalResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Inputs for the weighted average cost of capital. Rates are decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaccInput {
    pub cost_of_equity: Rate,
    /// Effective annual rate of the loan
    pub cost_of_debt: Rate,
    pub tax_rate: Rate,
    pub debt: Money,
    pub equity: Money,
    pub debt_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaccOutput {
    pub wacc: Rate,
    pub cost_of_equity: Rate,
    pub after_tax_cost_of_debt: Rate,
    pub equity_weight: Rate,
    pub debt_weight: Rate,
}

impl WaccInput {
    /// Build the WACC inputs from a project configuration, converting the
    /// user-facing percentages and resolving the effective debt rate. The
    /// debt rate is left at zero, and never converted, while debt is disabled.
    pub fn from_config(config: &EvaluationConfiguration) -> ProjectEvalResult<Self> {
        let cost_of_debt = if config.debt.enabled {
            config.debt.effective_annual_rate()?
        } else {
            Decimal::ZERO
        };
        Ok(WaccInput {
            cost_of_equity: pct_to_rate(config.ke_pct),
            cost_of_debt,
            tax_rate: pct_to_rate(config.tax_rate_pct),
            debt: config.debt.amount,
            equity: config.debt.equity,
            debt_enabled: config.debt.enabled,
        })
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// WACC = Ke·E/V + Kd·(1−T)·D/V with V = D + E.
///
/// Without debt, or when V is zero, the result is exactly Ke.
pub fn calculate_wacc(input: &WaccInput) -> WaccOutput {
    let after_tax_cost_of_debt = input.cost_of_debt * (Decimal::ONE - input.tax_rate);
    let total_capital = input.debt + input.equity;

    if !input.debt_enabled || total_capital.is_zero() {
        return WaccOutput {
            wacc: input.cost_of_equity,
            cost_of_equity: input.cost_of_equity,
            after_tax_cost_of_debt,
            equity_weight: Decimal::ONE,
            debt_weight: Decimal::ZERO,
        };
    }

    let equity_weight = input.equity / total_capital;
    let debt_weight = input.debt / total_capital;

    WaccOutput {
        wacc: input.cost_of_equity * equity_weight + after_tax_cost_of_debt * debt_weight,
        cost_of_equity: input.cost_of_equity,
        after_tax_cost_of_debt,
        equity_weight,
        debt_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debt::schedule::{Capitalization, RateType};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn input(debt: Money, equity: Money, enabled: bool) -> WaccInput {
        WaccInput {
            cost_of_equity: dec!(0.15),
            cost_of_debt: dec!(0.10),
            tax_rate: dec!(0.35),
            debt,
            equity,
            debt_enabled: enabled,
        }
    }

    #[test]
    fn test_disabled_debt_returns_ke() {
        let out = calculate_wacc(&input(dec!(100000), dec!(50000), false));
        assert_eq!(out.wacc, dec!(0.15));
        assert_eq!(out.debt_weight, Decimal::ZERO);
    }

    #[test]
    fn test_zero_capital_returns_ke() {
        let out = calculate_wacc(&input(Decimal::ZERO, Decimal::ZERO, true));
        assert_eq!(out.wacc, dec!(0.15));
    }

    #[test]
    fn test_blended_rate() {
        // E/V = 0.5, D/V = 0.5: 0.15*0.5 + 0.10*0.65*0.5 = 0.075 + 0.0325
        let out = calculate_wacc(&input(dec!(50000), dec!(50000), true));
        assert_eq!(out.after_tax_cost_of_debt, dec!(0.065));
        assert_eq!(out.wacc, dec!(0.1075));
    }

    #[test]
    fn test_all_debt_is_after_tax_kd() {
        let out = calculate_wacc(&input(dec!(80000), Decimal::ZERO, true));
        assert_eq!(out.wacc, dec!(0.065));
        assert_eq!(out.equity_weight, Decimal::ZERO);
    }

    #[test]
    fn test_from_config_converts_percentages() {
        let config = EvaluationConfiguration::default();
        let wacc_input = WaccInput::from_config(&config).unwrap();
        assert_eq!(wacc_input.cost_of_equity, dec!(0.15));
        assert_eq!(wacc_input.tax_rate, dec!(0.35));
        assert_eq!(wacc_input.cost_of_debt, Decimal::ZERO);
        assert!(!wacc_input.debt_enabled);
        assert_eq!(calculate_wacc(&wacc_input).wacc, dec!(0.15));

        let mut leveraged = config;
        leveraged.debt.enabled = true;
        let wacc_input = WaccInput::from_config(&leveraged).unwrap();
        assert_eq!(wacc_input.cost_of_debt, dec!(0.10));
    }

    #[test]
    fn test_disabled_debt_ignores_unrepresentable_rate() {
        let mut config = EvaluationConfiguration::default();
        config.debt.annual_rate_pct = dec!(1000000000000);
        config.debt.rate_type = RateType::Nominal;
        config.debt.capitalization = Capitalization::Monthly;
        assert!(config.debt.effective_annual_rate().is_err());

        let wacc_input = WaccInput::from_config(&config).unwrap();
        assert_eq!(calculate_wacc(&wacc_input).wacc, dec!(0.15));
    }
}
