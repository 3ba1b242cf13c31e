use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ProjectEvalError;
use crate::time_value::capital_recovery_factor;
use crate::types::*;
use crate::ProjectEvalResult;

/// Repayment system for the project loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmortizationSystem {
    /// Level installment: interest falls, principal rises
    #[default]
    French,
    /// Level principal: installment falls with the balance
    German,
    /// Interest only, whole balance repaid in the final period
    Bullet,
}

impl AmortizationSystem {
    /// Every system, in the order the optimizer visits them.
    pub const ALL: [AmortizationSystem; 3] = [
        AmortizationSystem::French,
        AmortizationSystem::German,
        AmortizationSystem::Bullet,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AmortizationSystem::French => "French (level payment)",
            AmortizationSystem::German => "German (level amortization)",
            AmortizationSystem::Bullet => "Bullet (balloon at maturity)",
        }
    }
}

/// How the quoted annual rate should be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    Nominal,
    #[default]
    Effective,
}

/// Compounding frequency of a nominal rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capitalization {
    Monthly,
    Quarterly,
    #[serde(alias = "semi-annual")]
    SemiAnnual,
    #[default]
    Annual,
}

impl Capitalization {
    pub fn periods_per_year(self) -> u32 {
        match self {
            Capitalization::Monthly => 12,
            Capitalization::Quarterly => 4,
            Capitalization::SemiAnnual => 2,
            Capitalization::Annual => 1,
        }
    }
}

/// Financing side of the project configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtParameters {
    pub enabled: bool,
    /// Principal disbursed at period 0
    pub amount: Money,
    /// Shareholder contribution
    pub equity: Money,
    /// Number of repayment periods
    pub term: u32,
    /// Quoted annual rate in percent (10 = 10%)
    #[serde(alias = "annualRate")]
    pub annual_rate_pct: Percent,
    #[serde(default, alias = "rateType")]
    pub rate_type: RateType,
    #[serde(default)]
    pub capitalization: Capitalization,
    #[serde(default)]
    pub system: AmortizationSystem,
}

impl Default for DebtParameters {
    fn default() -> Self {
        DebtParameters {
            enabled: false,
            amount: Decimal::from(100_000),
            equity: Decimal::from(50_000),
            term: 5,
            annual_rate_pct: Decimal::TEN,
            rate_type: RateType::Effective,
            capitalization: Capitalization::Annual,
            system: AmortizationSystem::French,
        }
    }
}

impl DebtParameters {
    /// Effective annual rate used both for the schedule and as Kd.
    ///
    /// Nominal rates are compounded: `(1 + j/m)^m - 1`.
    pub fn effective_annual_rate(&self) -> ProjectEvalResult<Rate> {
        let quoted = pct_to_rate(self.annual_rate_pct);
        match self.rate_type {
            RateType::Effective => Ok(quoted),
            RateType::Nominal => {
                let m = self.capitalization.periods_per_year();
                let periodic = Decimal::ONE + quoted / Decimal::from(m);
                periodic
                    .checked_powu(u64::from(m))
                    .map(|f| f - Decimal::ONE)
                    .ok_or_else(|| ProjectEvalError::ArithmeticOverflow {
                        context: "nominal to effective rate conversion".into(),
                    })
            }
        }
    }
}

/// A single period in the amortization schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub period: u32,
    pub interest: Money,
    pub principal: Money,
    pub total_payment: Money,
    pub remaining_balance: Money,
}

/// Schedule plus totals for a full debt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtScheduleOutput {
    pub system: AmortizationSystem,
    pub principal: Money,
    pub effective_rate: Rate,
    /// Level installment, French system only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installment: Option<Money>,
    pub entries: Vec<ScheduleEntry>,
    pub total_interest: Money,
    pub total_principal: Money,
    pub total_paid: Money,
}

/// Build the period-by-period schedule for `principal` over `term` periods.
///
/// Entry `p` is aligned with global period `p`; the loan is disbursed at
/// period 0. The final entry always repays the whole remaining balance so the
/// principal column sums to `principal` and the closing balance is zero.
pub fn build_schedule(
    principal: Money,
    term: u32,
    rate: Rate,
    system: AmortizationSystem,
) -> ProjectEvalResult<Vec<ScheduleEntry>> {
    validate_schedule_input(principal, term, rate)?;

    let installment = match system {
        AmortizationSystem::French => principal * capital_recovery_factor(rate, term)?,
        AmortizationSystem::German | AmortizationSystem::Bullet => Decimal::ZERO,
    };
    let level_principal = principal / Decimal::from(term);

    let mut entries = Vec::with_capacity(term as usize);
    let mut balance = principal;

    for period in 1..=term {
        let interest = balance * rate;
        let repayment = if period == term {
            balance
        } else {
            match system {
                AmortizationSystem::French => installment - interest,
                AmortizationSystem::German => level_principal,
                AmortizationSystem::Bullet => Decimal::ZERO,
            }
        };

        balance -= repayment;
        entries.push(ScheduleEntry {
            period,
            interest,
            principal: repayment,
            total_payment: interest + repayment,
            remaining_balance: balance,
        });
    }

    Ok(entries)
}

/// Build the schedule for a full debt configuration, with totals.
pub fn generate_schedule(
    params: &DebtParameters,
) -> ProjectEvalResult<ComputationOutput<DebtScheduleOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if !params.enabled {
        warnings.push("Debt is disabled; schedule shown for reference only".into());
    }

    let rate = params.effective_annual_rate()?;
    let entries = build_schedule(params.amount, params.term, rate, params.system)?;

    let installment = match params.system {
        AmortizationSystem::French => entries.first().map(|e| e.total_payment),
        AmortizationSystem::German | AmortizationSystem::Bullet => None,
    };
    let total_interest: Money = entries.iter().map(|e| e.interest).sum();
    let total_principal: Money = entries.iter().map(|e| e.principal).sum();

    let output = DebtScheduleOutput {
        system: params.system,
        principal: params.amount,
        effective_rate: rate,
        installment,
        entries,
        total_interest,
        total_principal,
        total_paid: total_interest + total_principal,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        params.system.label(),
        &serde_json::json!({
            "principal": params.amount.to_string(),
            "term": params.term,
            "annual_rate_pct": params.annual_rate_pct.to_string(),
            "rate_type": params.rate_type,
            "capitalization": params.capitalization,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn validate_schedule_input(principal: Money, term: u32, rate: Rate) -> ProjectEvalResult<()> {
    if principal < Decimal::ZERO {
        return Err(ProjectEvalError::InvalidInput {
            field: "amount".into(),
            reason: "Debt principal cannot be negative".into(),
        });
    }
    if term == 0 {
        return Err(ProjectEvalError::InvalidInput {
            field: "term".into(),
            reason: "Term must be at least 1 period".into(),
        });
    }
    if rate < Decimal::ZERO {
        return Err(ProjectEvalError::InvalidInput {
            field: "annual_rate_pct".into(),
            reason: "Interest rate cannot be negative".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn french_params() -> DebtParameters {
        DebtParameters {
            enabled: true,
            amount: dec!(100000),
            equity: dec!(50000),
            term: 5,
            annual_rate_pct: dec!(10),
            rate_type: RateType::Effective,
            capitalization: Capitalization::Annual,
            system: AmortizationSystem::French,
        }
    }

    #[test]
    fn test_french_reference_loan() {
        let out = generate_schedule(&french_params()).unwrap();
        let sched = &out.result;
        assert_eq!(sched.entries.len(), 5);

        let installment = sched.installment.unwrap();
        assert!((installment - dec!(26379.75)).abs() < dec!(0.01));

        let first = &sched.entries[0];
        assert_eq!(first.interest, dec!(10000));
        assert!((first.principal - dec!(16379.75)).abs() < dec!(0.01));

        assert_eq!(sched.entries[4].remaining_balance, Decimal::ZERO);
        assert_eq!(sched.total_principal, dec!(100000));
    }

    #[test]
    fn test_french_zero_rate_splits_evenly() {
        let entries = build_schedule(dec!(1200), 4, Decimal::ZERO, AmortizationSystem::French).unwrap();
        for e in &entries {
            assert_eq!(e.interest, Decimal::ZERO);
            assert_eq!(e.principal, dec!(300));
        }
        assert_eq!(entries[3].remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_german_level_principal() {
        let entries = build_schedule(dec!(1000), 4, dec!(0.10), AmortizationSystem::German).unwrap();
        assert_eq!(entries[0].interest, dec!(100));
        assert_eq!(entries[0].principal, dec!(250));
        assert_eq!(entries[0].total_payment, dec!(350));
        // interest on the balance entering the period
        assert_eq!(entries[1].interest, dec!(75));
        assert_eq!(entries[3].interest, dec!(25));
        assert_eq!(entries[3].remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_bullet_schedule() {
        let entries = build_schedule(dec!(1000), 5, dec!(0.05), AmortizationSystem::Bullet).unwrap();
        for e in &entries[..4] {
            assert_eq!(e.principal, Decimal::ZERO);
            assert_eq!(e.interest, dec!(50));
            assert_eq!(e.remaining_balance, dec!(1000));
        }
        let last = &entries[4];
        assert_eq!(last.principal, dec!(1000));
        assert_eq!(last.total_payment, dec!(1050));
        assert_eq!(last.remaining_balance, Decimal::ZERO);
    }

    #[test]
    fn test_single_period_term() {
        for system in AmortizationSystem::ALL {
            let entries = build_schedule(dec!(500), 1, dec!(0.08), system).unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].principal, dec!(500));
            assert_eq!(entries[0].interest, dec!(40));
        }
    }

    #[test]
    fn test_zero_principal_schedule_is_all_zero() {
        let entries = build_schedule(Decimal::ZERO, 3, dec!(0.1), AmortizationSystem::French).unwrap();
        assert!(entries.iter().all(|e| e.total_payment.is_zero()));
    }

    #[test]
    fn test_nominal_rate_conversion() {
        let mut params = french_params();
        params.rate_type = RateType::Nominal;
        params.capitalization = Capitalization::SemiAnnual;
        // (1 + 0.05)^2 - 1 = 0.1025
        assert_eq!(params.effective_annual_rate().unwrap(), dec!(0.1025));

        params.capitalization = Capitalization::Annual;
        assert_eq!(params.effective_annual_rate().unwrap(), dec!(0.10));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(build_schedule(dec!(-1), 5, dec!(0.1), AmortizationSystem::French).is_err());
        assert!(build_schedule(dec!(100), 0, dec!(0.1), AmortizationSystem::German).is_err());
        assert!(build_schedule(dec!(100), 5, dec!(-0.01), AmortizationSystem::Bullet).is_err());
    }

    #[test]
    fn test_legacy_field_names_deserialize() {
        let json = r#"{"enabled":true,"amount":"1000","equity":"500","term":3,
            "annualRate":"12","rateType":"nominal","capitalization":"semi-annual","system":"german"}"#;
        let params: DebtParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.annual_rate_pct, dec!(12));
        assert_eq!(params.rate_type, RateType::Nominal);
        assert_eq!(params.capitalization, Capitalization::SemiAnnual);
        assert_eq!(params.system, AmortizationSystem::German);
    }

    fn system_strategy() -> impl Strategy<Value = AmortizationSystem> {
        prop_oneof![
            Just(AmortizationSystem::French),
            Just(AmortizationSystem::German),
            Just(AmortizationSystem::Bullet),
        ]
    }

    proptest! {
        #[test]
        fn property_principal_sums_to_loan(
            principal in 0i64..10_000_000,
            term in 1u32..40,
            rate_bp in 0i64..3000,
            system in system_strategy(),
        ) {
            let principal = Decimal::from(principal);
            let rate = Decimal::new(rate_bp, 4);
            let entries = build_schedule(principal, term, rate, system).unwrap();

            prop_assert_eq!(entries.len(), term as usize);
            let repaid: Decimal = entries.iter().map(|e| e.principal).sum();
            prop_assert!((repaid - principal).abs() < dec!(0.000001));
            prop_assert_eq!(entries.last().unwrap().remaining_balance, Decimal::ZERO);
        }

        #[test]
        fn property_german_principal_constant_and_interest_falls(
            principal in 1_000i64..10_000_000,
            term in 2u32..40,
            rate_bp in 1i64..3000,
        ) {
            let principal = Decimal::from(principal);
            let rate = Decimal::new(rate_bp, 4);
            let entries = build_schedule(principal, term, rate, AmortizationSystem::German).unwrap();

            let first = entries[0].principal;
            for e in &entries {
                prop_assert!((e.principal - first).abs() < dec!(0.000001));
            }
            for w in entries.windows(2) {
                prop_assert!(w[1].interest < w[0].interest);
            }
        }

        #[test]
        fn property_bullet_repays_only_at_maturity(
            principal in 0i64..10_000_000,
            term in 1u32..40,
            rate_bp in 0i64..3000,
        ) {
            let principal = Decimal::from(principal);
            let rate = Decimal::new(rate_bp, 4);
            let entries = build_schedule(principal, term, rate, AmortizationSystem::Bullet).unwrap();

            for e in &entries[..entries.len() - 1] {
                prop_assert_eq!(e.principal, Decimal::ZERO);
            }
            prop_assert_eq!(entries.last().unwrap().principal, principal);
        }
    }
}
