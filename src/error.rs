use std::path::PathBuf;

use thiserror::Error;

use crate::{Dollar, Percent};

/// Problems with the target allocation configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open target file {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse target file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Target configuration is missing {0}")]
    Missing(&'static str),
    #[error("Failed to determine the default target path")]
    NoDefaultPath,
    #[error("Core position minimum cannot be negative: {0}")]
    NegativeMinimum(Dollar),
    #[error("No target allocations are configured")]
    NoTargets,
    #[error("Target allocation for {symbol} cannot be negative: {percent}")]
    NegativeTarget { symbol: String, percent: Percent },
    #[error("Target allocations add up to zero")]
    ZeroTotal,
    #[error("Target allocations are too large to add up")]
    WeightOverflow,
    #[error("Core position {0} cannot be in target list")]
    CoreInTargets(String),
    #[error("Symbol {0} is listed more than once in the target allocations")]
    DuplicateTarget(String),
    #[error("Can't ignore symbol '{0}': it is specified in the target allocation")]
    IgnoredTarget(String),
}

/// Problems with the holdings input.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to read positions: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unexpected csv file format")]
    UnexpectedFormat,
    #[error("Row {row} is missing {field}")]
    MissingField { row: u64, field: &'static str },
    #[error("Row {row} has an invalid value for {field}: {value:?}")]
    InvalidValue {
        row: u64,
        field: &'static str,
        value: String,
    },
    #[error("Found pending activity for account {0} but no core position")]
    PendingWithoutCore(String),
    #[error("Failed to find any positions for account {0}")]
    AccountNotFound(String),
    #[error("No holdings to rebalance")]
    Empty,
    #[error("Holding with an empty symbol")]
    EmptySymbol,
    #[error("Holding {symbol} has a negative value: {value}")]
    NegativeValue { symbol: String, value: Dollar },
    #[error("Holding {symbol} is listed twice with different values: {first} and {second}")]
    ConflictingDuplicate {
        symbol: String,
        first: Dollar,
        second: Dollar,
    },
    #[error("Holding values are too large to add up")]
    ValueOverflow,
}

/// Failure to compute a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
}
