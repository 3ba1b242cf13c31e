use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::cash_flow::aggregation::{Category, CategoryKind, LineItem};
use crate::error::ProjectEvalError;
use crate::types::*;
use crate::valuation::evaluation::{evaluate, EvaluationConfiguration, EvaluationOutput};
use crate::ProjectEvalResult;

/// Share of the previous period's magnitude above which a working-capital
/// entry looks like a stock rather than a change.
const WORKING_CAPITAL_JUMP: Decimal = dec!(0.2);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything a project file holds. Every transition returns a new snapshot
/// and leaves the receiver untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    #[serde(default)]
    pub config: EvaluationConfiguration,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// How an edited value carries forward to later periods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationMode {
    /// Only the edited cell changes
    #[default]
    None,
    /// Every later period takes the new value
    Fixed,
    /// Every later period is scaled by new / old
    Proportional,
}

/// What an interactive editor should do with a cell edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EditDecision {
    /// Apply directly with this propagation
    Apply { mode: PropagationMode },
    /// Working-capital entry large against the previous period; ask the
    /// user whether a change (not a stock) was meant, then apply without
    /// propagation
    ConfirmWorkingCapital { previous: Money },
    /// Let the user pick fixed or proportional propagation
    ChoosePropagation { change_pct: Decimal },
}

impl Default for ProjectState {
    fn default() -> Self {
        ProjectState::new(EvaluationConfiguration::default())
    }
}

/// Sign convention for typed values. Costs and capex are outflows, so a
/// positive entry is stored negated; working capital is negated only in the
/// investment period.
pub fn normalize_entry(kind: CategoryKind, index: usize, value: Money) -> Money {
    if value <= Decimal::ZERO {
        return value;
    }
    match kind {
        CategoryKind::Revenue => value,
        CategoryKind::WorkingCapital if index > 0 => value,
        _ => -value,
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

impl ProjectState {
    /// A fresh project: one zero-filled item per category.
    pub fn new(config: EvaluationConfiguration) -> Self {
        let categories = CategoryKind::ALL
            .iter()
            .map(|&kind| Category::empty(kind, config.horizon))
            .collect();
        ProjectState { config, categories }
    }

    pub fn evaluate(&self) -> ProjectEvalResult<EvaluationOutput> {
        evaluate(&self.config, &self.categories)
    }

    fn n_periods(&self) -> usize {
        self.config.horizon as usize + 1
    }

    pub fn item(&self, kind: CategoryKind, item_id: &str) -> ProjectEvalResult<&LineItem> {
        self.categories
            .iter()
            .find(|c| c.id == kind)
            .and_then(|c| c.items.iter().find(|i| i.id == item_id))
            .ok_or_else(|| item_not_found(kind, item_id))
    }

    /// Clone, then edit one item of the clone in place. The item's values are
    /// sized to the horizon before `edit` runs.
    fn with_item<F>(&self, kind: CategoryKind, item_id: &str, edit: F) -> ProjectEvalResult<ProjectState>
    where
        F: FnOnce(&mut LineItem) -> ProjectEvalResult<()>,
    {
        let n_periods = self.n_periods();
        let mut next = self.clone();
        let item = next
            .categories
            .iter_mut()
            .find(|c| c.id == kind)
            .and_then(|c| c.items.iter_mut().find(|i| i.id == item_id))
            .ok_or_else(|| item_not_found(kind, item_id))?;
        item.values.resize(n_periods, Decimal::ZERO);
        edit(item)?;
        Ok(next)
    }

    fn check_index(&self, index: usize) -> ProjectEvalResult<()> {
        if index >= self.n_periods() {
            return Err(ProjectEvalError::InvalidInput {
                field: "index".into(),
                reason: format!("Period {index} is beyond the horizon ({})", self.config.horizon),
            });
        }
        Ok(())
    }

    /// Append a zero-filled item. The category is created when absent.
    pub fn add_item(&self, kind: CategoryKind) -> ProjectState {
        let n_periods = self.n_periods();
        let mut next = self.clone();

        let position = match next.categories.iter().position(|c| c.id == kind) {
            Some(p) => p,
            None => {
                next.categories.push(Category {
                    id: kind,
                    label: kind.default_label().into(),
                    items: Vec::new(),
                });
                next.categories.len() - 1
            }
        };
        let category = &mut next.categories[position];

        let next_number = category
            .items
            .iter()
            .filter_map(|i| trailing_number(&i.id))
            .max()
            .unwrap_or(0)
            + 1;
        category.items.push(LineItem {
            id: format!("item-{next_number}"),
            label: "New item".into(),
            values: vec![Decimal::ZERO; n_periods],
        });
        next
    }

    pub fn update_item_label(
        &self,
        kind: CategoryKind,
        item_id: &str,
        label: &str,
    ) -> ProjectEvalResult<ProjectState> {
        self.with_item(kind, item_id, |item| {
            item.label = label.to_string();
            Ok(())
        })
    }

    /// Replace an item's values, truncated or zero-filled to the horizon.
    pub fn set_item_values(
        &self,
        kind: CategoryKind,
        item_id: &str,
        values: Vec<Money>,
    ) -> ProjectEvalResult<ProjectState> {
        let n_periods = self.n_periods();
        self.with_item(kind, item_id, |item| {
            item.values = values;
            item.values.resize(n_periods, Decimal::ZERO);
            Ok(())
        })
    }

    pub fn set_value(
        &self,
        kind: CategoryKind,
        item_id: &str,
        index: usize,
        value: Money,
    ) -> ProjectEvalResult<ProjectState> {
        self.propagate_value(kind, item_id, index, value, PropagationMode::None)
    }

    /// Remove an item. The last item of a category is never removed and an
    /// unknown id leaves the snapshot unchanged.
    pub fn delete_item(&self, kind: CategoryKind, item_id: &str) -> ProjectState {
        let mut next = self.clone();
        if let Some(category) = next.categories.iter_mut().find(|c| c.id == kind) {
            if category.items.len() > 1 {
                category.items.retain(|i| i.id != item_id);
            }
        }
        next
    }

    /// Change the horizon, resizing every item to `horizon + 1` values.
    pub fn set_horizon(&self, horizon: u32) -> ProjectEvalResult<ProjectState> {
        if horizon < 1 {
            return Err(ProjectEvalError::InvalidInput {
                field: "horizon".into(),
                reason: "Horizon must be at least one period".into(),
            });
        }

        let mut next = self.clone();
        next.config.horizon = horizon;
        let n_periods = horizon as usize + 1;
        for item in next.categories.iter_mut().flat_map(|c| c.items.iter_mut()) {
            item.values.resize(n_periods, Decimal::ZERO);
        }
        Ok(next)
    }

    /// Write `new_value` at `index` and carry it forward according to `mode`.
    pub fn propagate_value(
        &self,
        kind: CategoryKind,
        item_id: &str,
        index: usize,
        new_value: Money,
        mode: PropagationMode,
    ) -> ProjectEvalResult<ProjectState> {
        self.check_index(index)?;
        let new_value = normalize_entry(kind, index, new_value);

        self.with_item(kind, item_id, |item| {
            let old_value = item.values[index];
            let mode = match mode {
                PropagationMode::Proportional if old_value.is_zero() => PropagationMode::Fixed,
                m => m,
            };

            match mode {
                PropagationMode::None => item.values[index] = new_value,
                PropagationMode::Fixed => {
                    for v in &mut item.values[index..] {
                        *v = new_value;
                    }
                }
                PropagationMode::Proportional => {
                    let factor = new_value / old_value;
                    item.values[index] = new_value;
                    for v in &mut item.values[index + 1..] {
                        *v = v.checked_mul(factor).ok_or_else(|| {
                            ProjectEvalError::ArithmeticOverflow {
                                context: "proportional propagation".into(),
                            }
                        })?;
                    }
                }
            }
            Ok(())
        })
    }

    /// Decide how an edit of one cell should be applied.
    ///
    /// Investment-period edits propagate as fixed values, except working
    /// capital, which never propagates. A later working-capital entry larger
    /// than 20% of the previous period's magnitude needs confirmation.
    /// Anything else leaves the choice to the user.
    pub fn classify_edit(
        &self,
        kind: CategoryKind,
        item_id: &str,
        index: usize,
        new_value: Money,
    ) -> ProjectEvalResult<EditDecision> {
        self.check_index(index)?;
        let item = self.item(kind, item_id)?;
        let value_at = |i: usize| item.values.get(i).copied().unwrap_or(Decimal::ZERO);
        let new_value = normalize_entry(kind, index, new_value);

        let decision = match (kind, index) {
            (CategoryKind::WorkingCapital, 0) => EditDecision::Apply {
                mode: PropagationMode::None,
            },
            (CategoryKind::WorkingCapital, _) => {
                let previous = value_at(index - 1);
                if !new_value.is_zero() && new_value.abs() > previous.abs() * WORKING_CAPITAL_JUMP {
                    EditDecision::ConfirmWorkingCapital { previous }
                } else {
                    EditDecision::Apply {
                        mode: PropagationMode::None,
                    }
                }
            }
            (_, 0) => EditDecision::Apply {
                mode: PropagationMode::Fixed,
            },
            _ => {
                let old = value_at(index);
                let change_pct = if old.is_zero() {
                    Decimal::ZERO
                } else {
                    (new_value - old) / old.abs() * Decimal::ONE_HUNDRED
                };
                EditDecision::ChoosePropagation { change_pct }
            }
        };
        Ok(decision)
    }

    /// Split total capital so equity holds `equity_pct` percent of it.
    pub fn set_equity_share(&self, equity_pct: Percent) -> ProjectEvalResult<ProjectState> {
        if equity_pct < Decimal::ZERO || equity_pct > Decimal::ONE_HUNDRED {
            return Err(ProjectEvalError::InvalidInput {
                field: "equity_pct".into(),
                reason: "Equity share must be between 0 and 100".into(),
            });
        }

        let mut next = self.clone();
        let debt = &mut next.config.debt;
        let total_capital = debt.amount + debt.equity;
        debt.equity = total_capital * pct_to_rate(equity_pct);
        debt.amount = total_capital - debt.equity;
        debt.enabled = debt.amount > Decimal::ZERO;
        Ok(next)
    }
}

fn item_not_found(kind: CategoryKind, item_id: &str) -> ProjectEvalError {
    ProjectEvalError::InvalidInput {
        field: "item_id".into(),
        reason: format!("No item '{item_id}' in category {kind:?}"),
    }
}

fn trailing_number(id: &str) -> Option<u64> {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    id[digits_start..].parse().ok()
}
