use std::fmt::Display;

use tabled::{
    Table, Tabled,
    settings::{Alignment, Style, object::Columns},
};

use crate::{Action, Dollar, Percent, Plan, PlanRow, error::ConfigError, target::AccountTarget};

#[derive(Debug, PartialEq, Eq, Tabled)]
struct ReportRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "% of Total")]
    percent_of_total: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Retain")]
    retain: String,
    #[tabled(rename = "Sell")]
    sell: String,
    #[tabled(rename = "Buy")]
    buy: String,
}

/// Empty for cells that don't apply.
fn cell<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl From<&PlanRow> for ReportRow {
    fn from(row: &PlanRow) -> Self {
        Self {
            symbol: row.symbol.clone(),
            value: row.current_value.to_string(),
            percent_of_total: row.percent_of_total.to_string(),
            target: cell(row.target_percent),
            retain: cell(row.retain),
            sell: cell(row.sell),
            buy: cell(row.buy),
        }
    }
}

pub fn render(account_number: &str, plan: &Plan) -> String {
    let mut table = Table::new(plan.rows().iter().map(ReportRow::from));
    table
        .with(Style::rounded())
        .modify(Columns::new(1..), Alignment::right());
    format!(
        "Account {account_number} Rebalancing Plan\n{table}\nTotal value: {}",
        plan.total_value()
    )
}

pub fn render_targets(target: &AccountTarget) -> Result<String, ConfigError> {
    let total = target.weight_total()?;
    let core = &target.core_position;
    let targets: String = target
        .targets()
        .iter()
        .map(|pos| {
            format!(
                "   - {}: {}\n",
                pos.symbol,
                Percent::normalized(pos.percent, total)
            )
        })
        .collect();
    Ok(format!(
        "Account {} Target Allocations\n - Core position\n   - {}: {} Minimum\n - Allocation targets\n{targets}",
        target.account_number, core.symbol, core.minimum
    ))
}

/// The plan as plain sell and buy lists.
pub fn render_actions(plan: &Plan) -> String {
    let list = |pick: fn(Action) -> Option<Dollar>| -> String {
        plan.rows()
            .iter()
            .filter_map(|row| pick(row.action()).map(|val| format!(" - {}: {val}\n", row.symbol)))
            .collect()
    };
    let sells = list(|action| match action {
        Action::Sell(val) => Some(val),
        _ => None,
    });
    let buys = list(|action| match action {
        Action::Buy(val) => Some(val),
        _ => None,
    });
    format!(
        "In order to maintain your target allocations, the following actions are necessary.\nSell:\n{sells}Buy:\n{buys}"
    )
}
