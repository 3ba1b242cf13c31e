use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Money, PeriodSeries};

// ---------------------------------------------------------------------------
// Categories and line items
// ---------------------------------------------------------------------------

/// The five cash-flow categories a project is entered in.
///
/// Aliases accept the identifiers used by older project files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    #[serde(alias = "ingresos")]
    Revenue,
    #[serde(alias = "costos_var")]
    VariableCosts,
    #[serde(alias = "costos_fijos")]
    FixedCosts,
    Capex,
    #[serde(alias = "delta_ct")]
    WorkingCapital,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 5] = [
        CategoryKind::Revenue,
        CategoryKind::VariableCosts,
        CategoryKind::FixedCosts,
        CategoryKind::Capex,
        CategoryKind::WorkingCapital,
    ];

    /// Cash effect of an aggregated period value.
    ///
    /// Revenue counts as entered. Costs and capex are outflows whatever sign
    /// was typed. Working capital keeps its sign: negative ties cash up,
    /// positive releases it.
    pub fn cash_effect(self, value: Money) -> Money {
        match self {
            CategoryKind::Revenue | CategoryKind::WorkingCapital => value,
            CategoryKind::VariableCosts | CategoryKind::FixedCosts | CategoryKind::Capex => {
                -value.abs()
            }
        }
    }

    pub fn default_label(self) -> &'static str {
        match self {
            CategoryKind::Revenue => "Revenue",
            CategoryKind::VariableCosts => "Variable costs",
            CategoryKind::FixedCosts => "Fixed costs",
            CategoryKind::Capex => "CAPEX / Investment",
            CategoryKind::WorkingCapital => "Δ Working capital",
        }
    }
}

/// A single user-entered row inside a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub values: Vec<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryKind,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl Category {
    /// Category with a single zero-filled item, as a fresh project starts.
    pub fn empty(kind: CategoryKind, horizon: u32) -> Self {
        Category {
            id: kind,
            label: kind.default_label().to_string(),
            items: vec![LineItem {
                id: "1".into(),
                label: String::new(),
                values: vec![Decimal::ZERO; horizon as usize + 1],
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Sum every line item of `kind` per period. The result always has
/// `horizon + 1` entries; absent periods and missing categories are zero and
/// values beyond the horizon are ignored.
pub fn aggregate_category(categories: &[Category], kind: CategoryKind, horizon: u32) -> PeriodSeries {
    let n_periods = horizon as usize + 1;
    let mut totals = vec![Decimal::ZERO; n_periods];

    if let Some(category) = categories.iter().find(|c| c.id == kind) {
        for item in &category.items {
            for (total, value) in totals.iter_mut().zip(item.values.iter()) {
                *total += value;
            }
        }
    }

    totals
}

/// Aggregated series for every category, keyed by category.
pub fn aggregate(categories: &[Category], horizon: u32) -> BTreeMap<CategoryKind, PeriodSeries> {
    CategoryKind::ALL
        .iter()
        .map(|&kind| (kind, aggregate_category(categories, kind, horizon)))
        .collect()
}

/// Per-category totals for one horizon, as entered (before sign normalization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowTotals {
    pub revenue: PeriodSeries,
    pub variable_costs: PeriodSeries,
    pub fixed_costs: PeriodSeries,
    pub capex: PeriodSeries,
    pub working_capital: PeriodSeries,
}

impl CashFlowTotals {
    pub fn from_categories(categories: &[Category], horizon: u32) -> Self {
        CashFlowTotals {
            revenue: aggregate_category(categories, CategoryKind::Revenue, horizon),
            variable_costs: aggregate_category(categories, CategoryKind::VariableCosts, horizon),
            fixed_costs: aggregate_category(categories, CategoryKind::FixedCosts, horizon),
            capex: aggregate_category(categories, CategoryKind::Capex, horizon),
            working_capital: aggregate_category(categories, CategoryKind::WorkingCapital, horizon),
        }
    }

    pub fn periods(&self) -> usize {
        self.revenue.len()
    }

    /// Operating result: revenue minus the magnitude of both cost categories.
    pub fn ebitda(&self) -> PeriodSeries {
        (0..self.periods())
            .map(|i| {
                self.revenue[i]
                    + CategoryKind::VariableCosts.cash_effect(self.variable_costs[i])
                    + CategoryKind::FixedCosts.cash_effect(self.fixed_costs[i])
            })
            .collect()
    }

    /// Investment flow per period: capex outflow plus signed working-capital movement.
    pub fn investment_flows(&self) -> PeriodSeries {
        (0..self.periods())
            .map(|i| {
                CategoryKind::Capex.cash_effect(self.capex[i])
                    + CategoryKind::WorkingCapital.cash_effect(self.working_capital[i])
            })
            .collect()
    }

    /// Magnitude of the net investment over the whole horizon.
    pub fn total_investment(&self) -> Money {
        self.investment_flows().iter().sum::<Decimal>().abs()
    }
}
