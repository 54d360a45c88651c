//! Rebalancing plan computation.
//!
//! The non-core targets are sized against the account total minus the core
//! minimum, so the non-core differences always net out to the core excess or
//! deficit. Sells fund buys without any balancing pass beyond the final
//! cent-level residual correction.

use std::cmp::Reverse;

use tracing::{debug, warn};

use crate::{
    Action, Dollar, Percent,
    error::{DataError, PlanError},
    target::AccountTarget,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Holding {
    pub symbol: String,
    pub current_value: Dollar,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, current_value: Dollar) -> Self {
        Self {
            symbol: symbol.into(),
            current_value,
        }
    }
}

/// One line of a plan. `None` means the cell does not apply, which is
/// different from a zero amount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanRow {
    pub symbol: String,
    pub current_value: Dollar,
    pub percent_of_total: Percent,
    /// Normalized target share; `None` for the core position.
    pub target_percent: Option<Percent>,
    /// Amount left in place; only set for the core position.
    pub retain: Option<Dollar>,
    pub sell: Option<Dollar>,
    pub buy: Option<Dollar>,
}

impl PlanRow {
    pub fn action(&self) -> Action {
        match (self.sell, self.buy) {
            (Some(val), _) => Action::Sell(val),
            (None, Some(val)) => Action::Buy(val),
            (None, None) => Action::Nothing,
        }
    }

    /// Rows sized from a target weight absorb the rounding residual.
    fn is_adjustable(&self) -> bool {
        self.target_percent.is_some_and(|p| !p.is_zero())
    }

    fn amount(&self, side: Side) -> Option<Dollar> {
        match side {
            Side::Sell => self.sell,
            Side::Buy => self.buy,
        }
    }

    fn amount_mut(&mut self, side: Side) -> &mut Option<Dollar> {
        match side {
            Side::Sell => &mut self.sell,
            Side::Buy => &mut self.buy,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Sell,
    Buy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    rows: Vec<PlanRow>,
    total_value: Dollar,
    unfunded: Dollar,
}

impl Plan {
    /// Core position first, then held symbols, then target-only symbols.
    pub fn rows(&self) -> &[PlanRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<PlanRow> {
        self.rows
    }

    pub fn core(&self) -> &PlanRow {
        &self.rows[0]
    }

    pub fn total_value(&self) -> Dollar {
        self.total_value
    }

    /// Part of the core deficit that selling everything else cannot cover.
    pub fn unfunded(&self) -> Dollar {
        self.unfunded
    }

    pub fn total_sells(&self) -> Dollar {
        self.rows.iter().filter_map(|r| r.sell).sum()
    }

    pub fn total_buys(&self) -> Dollar {
        self.rows.iter().filter_map(|r| r.buy).sum()
    }
}

/// Validates holdings, collapsing exact duplicates, and rounds each value to
/// the cent.
fn unique_holdings(holdings: &[Holding]) -> Result<Vec<Holding>, DataError> {
    if holdings.is_empty() {
        return Err(DataError::Empty);
    }
    let mut unique: Vec<&Holding> = Vec::with_capacity(holdings.len());
    for holding in holdings {
        if holding.symbol.trim().is_empty() {
            return Err(DataError::EmptySymbol);
        }
        if holding.current_value.is_negative() {
            return Err(DataError::NegativeValue {
                symbol: holding.symbol.clone(),
                value: holding.current_value,
            });
        }
        match unique.iter().find(|h| h.symbol == holding.symbol) {
            Some(existing) if existing.current_value != holding.current_value => {
                return Err(DataError::ConflictingDuplicate {
                    symbol: holding.symbol.clone(),
                    first: existing.current_value,
                    second: holding.current_value,
                });
            }
            Some(_) => debug!(symbol = %holding.symbol, "skipping duplicate holding"),
            None => unique.push(holding),
        }
    }
    Ok(unique
        .into_iter()
        .map(|h| Holding::new(h.symbol.clone(), h.current_value.round_cents()))
        .collect())
}

pub fn compute_plan(holdings: &[Holding], target: &AccountTarget) -> Result<Plan, PlanError> {
    target.validate()?;
    let holdings = unique_holdings(holdings)?;
    let core_symbol = target.core_position.symbol.as_str();
    let minimum = target.core_position.minimum.round_cents();

    let total_value = Dollar::checked_sum(holdings.iter().map(|h| h.current_value))
        .ok_or(DataError::ValueOverflow)?;
    let core_value = holdings
        .iter()
        .find(|h| h.symbol == core_symbol)
        .map(|h| h.current_value)
        .unwrap_or_default();
    let investable = (total_value - minimum).max(Dollar::ZERO);
    let weight_total = target.weight_total()?;
    debug!(%total_value, %core_value, %investable, %weight_total, "computing plan");

    let held = holdings
        .iter()
        .filter(|h| h.symbol != core_symbol)
        .map(|h| (h.symbol.as_str(), h.current_value));
    let target_only = target
        .targets()
        .iter()
        .filter(|t| !holdings.iter().any(|h| h.symbol == t.symbol))
        .map(|t| (t.symbol.as_str(), Dollar::ZERO));

    let mut rows = Vec::with_capacity(holdings.len() + target.targets().len() + 1);
    let mut net_sells = Dollar::ZERO;
    for (symbol, current_value) in held.chain(target_only) {
        let weight = target.weight(symbol).unwrap_or(Percent::ZERO);
        if weight.is_zero() && current_value.is_zero() {
            debug!(%symbol, "nothing held or targeted, omitting");
            continue;
        }
        let target_value = investable * Percent::fraction(weight, weight_total);
        let diff = target_value - current_value;
        net_sells -= diff;
        rows.push(PlanRow {
            symbol: symbol.to_string(),
            current_value,
            percent_of_total: Percent::of(current_value, total_value),
            target_percent: Some(Percent::normalized(weight, weight_total)),
            retain: None,
            sell: diff
                .is_negative()
                .then(|| diff.abs().round_cents())
                .and_then(Dollar::non_zero),
            buy: diff
                .is_positive()
                .then(|| diff.round_cents())
                .and_then(Dollar::non_zero),
        });
    }

    let core_delta = core_value - minimum;
    let mut unfunded = Dollar::ZERO;
    let mut core = PlanRow {
        symbol: core_symbol.to_string(),
        current_value: core_value,
        percent_of_total: Percent::of(core_value, total_value),
        target_percent: None,
        retain: Some(minimum),
        sell: None,
        buy: None,
    };
    if core_delta.is_positive() {
        core.sell = Some(core_delta);
    } else if core_delta.is_negative() {
        let deficit = core_delta.abs();
        let raised = net_sells.min(deficit).max(Dollar::ZERO).round_cents();
        unfunded = deficit - raised;
        if unfunded.is_positive() {
            warn!(%deficit, %raised, "Sells cannot fully restore the core position minimum");
        }
        core.retain = Some(core_value);
        core.buy = raised.non_zero();
    }
    rows.insert(0, core);

    reconcile_residual(&mut rows);
    let plan = Plan {
        rows,
        total_value,
        unfunded,
    };
    debug!(?plan, "computed plan");
    Ok(plan)
}

/// Makes sells and buys agree to the cent after per-row rounding.
///
/// The residual is settled one cent at a time. Each cent comes off the
/// largest adjustable amount on the heavier side; failing that, it goes onto
/// the largest adjustable amount on the lighter side, starting from zero if
/// no row has one yet. A row that already took a cent yields to rows that
/// took fewer, and equal amounts resolve to the row that comes first. A row
/// never gains an amount on the side opposite to the one it already has, and
/// a sell never grows past the value held.
fn reconcile_residual(rows: &mut [PlanRow]) {
    let mut taken = vec![0u32; rows.len()];
    loop {
        let sells: Dollar = rows.iter().filter_map(|r| r.sell).sum();
        let buys: Dollar = rows.iter().filter_map(|r| r.buy).sum();
        let residual = sells - buys;
        if residual.is_zero() {
            return;
        }
        let step = residual.abs().min(Dollar::CENT);
        let (heavy, light) = if residual.is_positive() {
            (Side::Sell, Side::Buy)
        } else {
            (Side::Buy, Side::Sell)
        };

        let shrink = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.is_adjustable())
            .filter_map(|(idx, row)| row.amount(heavy).map(|val| (idx, val)))
            .filter(|&(_, val)| val >= step)
            .min_by_key(|&(idx, val)| (taken[idx], Reverse(val), idx))
            .map(|(idx, _)| idx);
        if let Some(idx) = shrink {
            let slot = rows[idx].amount_mut(heavy);
            *slot = slot.map(|val| val - step).and_then(Dollar::non_zero);
            taken[idx] += 1;
            debug!(%residual, symbol = %rows[idx].symbol, ?heavy, "reduced row by a cent");
            continue;
        }

        let grow = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.is_adjustable() && row.amount(heavy).is_none())
            .map(|(idx, row)| (idx, row, row.amount(light).unwrap_or_default()))
            .filter(|&(_, row, val)| light == Side::Buy || val + step <= row.current_value)
            .min_by_key(|&(idx, _, val)| (taken[idx], Reverse(val), idx))
            .map(|(idx, _, _)| idx);
        match grow {
            Some(idx) => {
                let slot = rows[idx].amount_mut(light);
                *slot = Some(slot.unwrap_or_default() + step);
                taken[idx] += 1;
                debug!(%residual, symbol = %rows[idx].symbol, ?light, "increased row by a cent");
            }
            None => {
                warn!(%residual, "No row can absorb the rounding residual");
                return;
            }
        }
    }
}
