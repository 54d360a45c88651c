use std::{io::Read, path::Path};

use clap::ValueEnum;

use crate::{Dollar, error::DataError, plan::Holding};

mod provider {
    pub(crate) mod fidelity {
        use std::io::Read;

        use tracing::{debug, warn};

        use crate::{
            Dollar,
            error::DataError,
            portfolio::{AccountBalance, Position},
        };

        pub enum Columns {
            AccountNumber = 0,
            AccountName = 1,
            Symbol = 2,
            CurrentValue = 7,
        }

        const PENDING_ACTIVITY: &str = "Pending activity";
        const CORE_MARKER: &str = "**";

        fn field<'r>(
            row: &'r csv::StringRecord,
            line: u64,
            column: Columns,
            name: &'static str,
        ) -> Result<&'r str, DataError> {
            row.get(column as usize)
                .map(str::trim)
                .ok_or(DataError::MissingField { row: line, field: name })
        }

        pub(crate) fn parse_accounts<R: Read>(reader: R) -> Result<Vec<AccountBalance>, DataError> {
            let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
            let headers = csv_reader.headers()?;
            if headers.get(Columns::AccountNumber as usize) != Some("Account Number")
                || headers.get(Columns::AccountName as usize) != Some("Account Name")
                || headers.get(Columns::Symbol as usize) != Some("Symbol")
                || headers.get(Columns::CurrentValue as usize) != Some("Current Value")
            {
                warn!(?headers, "Unexpected headers");
                return Err(DataError::UnexpectedFormat);
            }
            let mut accounts: Vec<AccountBalance> = Vec::new();
            let mut pending: Vec<(String, Dollar)> = Vec::new();
            for row in csv_reader.records() {
                let row = row?;
                debug!(?row, "parsed row");
                if row.len() <= Columns::CurrentValue as usize {
                    debug!(?row, "Row doesn't have enough fields to be a position");
                    break;
                }
                let line = row.position().map(|p| p.line()).unwrap_or_default();
                let account_number = field(&row, line, Columns::AccountNumber, "Account Number")?;
                let symbol = field(&row, line, Columns::Symbol, "Symbol")?;
                let raw_value = field(&row, line, Columns::CurrentValue, "Current Value")?;
                let current_value =
                    raw_value
                        .parse::<Dollar>()
                        .map_err(|_| DataError::InvalidValue {
                            row: line,
                            field: "Current Value",
                            value: raw_value.to_string(),
                        })?;

                let idx = match accounts
                    .iter()
                    .position(|a| a.account_number == account_number)
                {
                    Some(idx) => idx,
                    None => {
                        accounts.push(AccountBalance {
                            account_number: account_number.to_string(),
                            positions: Default::default(),
                        });
                        accounts.len() - 1
                    }
                };
                if symbol == PENDING_ACTIVITY {
                    pending.push((account_number.to_string(), current_value));
                } else {
                    let pos = Position {
                        symbol: symbol.trim_end_matches(CORE_MARKER).to_string(),
                        current_value,
                        is_core: symbol.ends_with(CORE_MARKER),
                    };
                    debug!(account = %account_number, ?pos, "adding regular position");
                    accounts[idx].positions.push(pos);
                }
            }
            // Pending activity can precede the core row, so it is settled last.
            for (account_number, value) in pending {
                let core = accounts
                    .iter_mut()
                    .filter(|a| a.account_number == account_number)
                    .flat_map(|a| a.positions.iter_mut())
                    .find(|p| p.is_core)
                    .ok_or_else(|| DataError::PendingWithoutCore(account_number.clone()))?;
                debug!(%account_number, %value, "Adding pending activity to core position");
                core.current_value += value;
            }
            Ok(accounts)
        }
    }
}

#[derive(Debug)]
pub struct AccountBalance {
    pub account_number: String,
    pub positions: Vec<Position>,
}

impl AccountBalance {
    fn is_ignored(symbol: &str, ignore: &[String]) -> bool {
        ignore.iter().any(|i| i.eq_ignore_ascii_case(symbol))
    }

    /// Positions to rebalance, leaving out the ignored symbols.
    pub fn holdings(&self, ignore: &[String]) -> Vec<Holding> {
        self.positions
            .iter()
            .filter(|pos| !Self::is_ignored(&pos.symbol, ignore))
            .map(|pos| Holding::new(pos.symbol.clone(), pos.current_value))
            .collect()
    }

    pub fn ignored<'a>(&'a self, ignore: &'a [String]) -> impl Iterator<Item = &'a Position> {
        self.positions
            .iter()
            .filter(move |pos| Self::is_ignored(&pos.symbol, ignore))
    }

    pub fn core(&self) -> Option<&Position> {
        self.positions.iter().find(|p| p.is_core)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub symbol: String,
    pub current_value: Dollar,
    /// Marked by the provider as the account's cash sweep position.
    pub is_core: bool,
}

#[derive(Debug)]
pub struct Portfolio {
    pub accounts: Vec<AccountBalance>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Provider {
    Fidelity,
}

impl Portfolio {
    pub fn load_from_file<P: AsRef<Path>>(path: P, provider: Provider) -> Result<Self, DataError> {
        let file = std::fs::File::open(path.as_ref()).map_err(csv::Error::from)?;
        Self::from_reader(file, provider)
    }

    pub fn from_reader<R: Read>(reader: R, provider: Provider) -> Result<Self, DataError> {
        match provider {
            Provider::Fidelity => Ok(Self {
                accounts: provider::fidelity::parse_accounts(reader)?,
            }),
        }
    }

    pub fn account(&self, account_number: &str) -> Result<&AccountBalance, DataError> {
        self.accounts
            .iter()
            .find(|a| a.account_number == account_number)
            .ok_or_else(|| DataError::AccountNotFound(account_number.to_string()))
    }
}
