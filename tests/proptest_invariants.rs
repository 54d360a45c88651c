//! Property-based tests for plan invariants.
//!
//! Holdings are whole cents, weights are whole percentage points.

use corebalance::{
    Dollar, Holding, Percent, compute_plan,
    target::{AccountTarget, CorePosition, PositionTarget},
};
use proptest::prelude::*;
use rust_decimal::Decimal;

const CORE: &str = "FZFXX";

#[derive(Debug, Clone)]
struct Scenario {
    core: Option<i64>,
    minimum: i64,
    held: Vec<i64>,
    weights: Vec<u32>,
}

impl Scenario {
    fn holdings(&self) -> Vec<Holding> {
        self.core
            .map(|cents| Holding::new(CORE, Dollar::from_cents(cents)))
            .into_iter()
            .chain(
                self.held
                    .iter()
                    .enumerate()
                    .map(|(i, &cents)| Holding::new(format!("S{i}"), Dollar::from_cents(cents))),
            )
            .collect()
    }

    /// Targets overlap the first held symbols and may add unheld ones.
    fn target(&self, scale: u32) -> AccountTarget {
        AccountTarget::new(
            "X12345678",
            CorePosition::new(CORE, Dollar::from_cents(self.minimum)),
            self.weights
                .iter()
                .enumerate()
                .map(|(i, &w)| PositionTarget::new(format!("S{i}"), Percent::new(Decimal::from(w * scale))))
                .collect(),
        )
        .unwrap()
    }
}

fn scenario_strategy() -> impl Strategy<Value = Scenario> {
    (
        prop::option::of(0i64..1_000_000),
        0i64..1_000_000,
        prop::collection::vec(0i64..500_000, 0..6),
        prop::collection::vec(0u32..=100, 1..6),
    )
        .prop_filter("needs a positive weight", |(_, _, _, weights)| {
            weights.iter().any(|&w| w > 0)
        })
        .prop_filter("needs a holding", |(core, _, held, _)| {
            core.is_some() || !held.is_empty()
        })
        .prop_map(|(core, minimum, held, weights)| Scenario {
            core,
            minimum,
            held,
            weights,
        })
}

/// A few cents spread over many targets, so rounding moves several cents.
fn cent_scenario_strategy() -> impl Strategy<Value = Scenario> {
    (
        prop::option::of(0i64..10),
        0i64..10,
        prop::collection::vec(0i64..10, 0..6),
        prop::collection::vec(1u32..=3, 4..7),
    )
        .prop_filter("needs a holding", |(core, _, held, _)| {
            core.is_some() || !held.is_empty()
        })
        .prop_map(|(core, minimum, held, weights)| Scenario {
            core,
            minimum,
            held,
            weights,
        })
}

fn any_scenario() -> impl Strategy<Value = Scenario> {
    prop_oneof![scenario_strategy(), cent_scenario_strategy()]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Sells fund buys to the cent.
    #[test]
    fn conservation(scenario in any_scenario()) {
        let plan = compute_plan(&scenario.holdings(), &scenario.target(1)).unwrap();
        prop_assert_eq!(plan.total_sells(), plan.total_buys());
    }

    #[test]
    fn never_buy_and_sell_together(scenario in any_scenario()) {
        let plan = compute_plan(&scenario.holdings(), &scenario.target(1)).unwrap();
        for row in plan.rows() {
            prop_assert!(row.sell.is_none() || row.buy.is_none(), "{:?}", row);
            prop_assert!(row.sell.is_none_or(|v| v.is_positive()));
            prop_assert!(row.buy.is_none_or(|v| v.is_positive()));
        }
    }

    #[test]
    fn percent_of_total_sums_to_100(scenario in scenario_strategy()) {
        let plan = compute_plan(&scenario.holdings(), &scenario.target(1)).unwrap();
        let total: Decimal = plan.rows().iter().map(|r| r.percent_of_total.points()).sum();
        if plan.total_value().is_zero() {
            prop_assert!(total.is_zero());
        } else {
            prop_assert!((total - Decimal::ONE_HUNDRED).abs() < Decimal::new(1, 6), "{}", total);
        }
    }

    /// Weights are relative, so scaling all of them changes nothing.
    #[test]
    fn normalization_idempotence(scenario in scenario_strategy(), scale in 2u32..=10) {
        let holdings = scenario.holdings();
        let plan = compute_plan(&holdings, &scenario.target(1)).unwrap();
        let scaled = compute_plan(&holdings, &scenario.target(scale)).unwrap();
        prop_assert_eq!(plan, scaled);
    }

    #[test]
    fn core_priority(scenario in any_scenario()) {
        let plan = compute_plan(&scenario.holdings(), &scenario.target(1)).unwrap();
        let core = plan.core();
        let core_value = Dollar::from_cents(scenario.core.unwrap_or(0));
        let minimum = Dollar::from_cents(scenario.minimum);
        prop_assert_eq!(&core.symbol, CORE);
        if core_value > minimum {
            prop_assert_eq!(core.sell, Some(core_value - minimum));
            prop_assert_eq!(core.buy, None);
            prop_assert_eq!(core.retain, Some(minimum));
        } else if core_value < minimum {
            prop_assert_eq!(core.sell, None);
            prop_assert!(core.buy.is_none_or(|buy| buy <= minimum - core_value));
            prop_assert_eq!(core.retain, Some(core_value));
            let raised = core.buy.unwrap_or_default();
            prop_assert_eq!(plan.unfunded(), minimum - core_value - raised);
        } else {
            prop_assert_eq!(core.sell, None);
            prop_assert_eq!(core.buy, None);
        }
    }

    #[test]
    fn untargeted_holdings_are_liquidated(scenario in scenario_strategy()) {
        let plan = compute_plan(&scenario.holdings(), &scenario.target(1)).unwrap();
        for (i, &cents) in scenario.held.iter().enumerate() {
            let weight = scenario.weights.get(i).copied().unwrap_or(0);
            let symbol = format!("S{i}");
            let row = plan.rows().iter().find(|r| r.symbol == symbol);
            if weight > 0 {
                prop_assert!(row.is_some());
            } else if cents == 0 {
                prop_assert!(row.is_none());
            } else {
                let row = row.unwrap();
                prop_assert_eq!(row.sell, Some(Dollar::from_cents(cents)));
                prop_assert_eq!(row.buy, None);
                prop_assert_eq!(row.target_percent, Some(Percent::ZERO));
            }
        }
    }
}
