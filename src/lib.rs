pub mod error;
mod money;
pub mod plan;
pub mod portfolio;
pub mod report;
pub mod target;

pub use money::{Dollar, Percent};
pub use plan::{Holding, Plan, PlanRow, compute_plan};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Nothing,
    Sell(Dollar),
    Buy(Dollar),
}
