use std::{collections::HashSet, fmt, io::Read, path::Path};

use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, SeqAccess, Visitor},
};
use tracing::{debug, info};

use crate::{Dollar, Percent, error::ConfigError};

#[derive(Clone, Debug)]
pub struct AccountTarget {
    pub account_number: String,
    pub core_position: CorePosition,
    /// Relative weights in configuration order.
    pub targets: Vec<PositionTarget>,
}

impl AccountTarget {
    pub fn new(
        account_number: impl Into<String>,
        core_position: CorePosition,
        targets: Vec<PositionTarget>,
    ) -> Result<Self, ConfigError> {
        let target = Self {
            account_number: account_number.into(),
            core_position,
            targets,
        };
        target.validate()?;
        Ok(target)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let targets_file = std::fs::File::open(path).map_err(|source| ConfigError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(targets_file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let builder: AccountTargetBuilder = serde_yaml::from_reader(reader)?;
        let target = builder.build()?;
        debug!(?target, "loaded targets");
        Ok(target)
    }

    pub fn targets(&self) -> &[PositionTarget] {
        &self.targets
    }

    pub fn weight(&self, symbol: &str) -> Option<Percent> {
        self.targets
            .iter()
            .find(|t| t.symbol == symbol)
            .map(|t| t.percent)
    }

    pub fn weight_total(&self) -> Result<Percent, ConfigError> {
        Percent::checked_sum(self.targets.iter().map(|t| t.percent))
            .ok_or(ConfigError::WeightOverflow)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_position.symbol.trim().is_empty() {
            return Err(ConfigError::Missing("CorePosition.Symbol"));
        }
        if self.core_position.minimum.is_negative() {
            return Err(ConfigError::NegativeMinimum(self.core_position.minimum));
        }
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        let mut seen = HashSet::with_capacity(self.targets.len());
        for target in self.targets.iter() {
            if target.percent.is_negative() {
                return Err(ConfigError::NegativeTarget {
                    symbol: target.symbol.clone(),
                    percent: target.percent,
                });
            }
            if target.symbol == self.core_position.symbol {
                return Err(ConfigError::CoreInTargets(target.symbol.clone()));
            }
            if !seen.insert(target.symbol.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.symbol.clone()));
            }
        }
        if self.weight_total()?.is_zero() {
            return Err(ConfigError::ZeroTotal);
        }
        Ok(())
    }

    /// Ignoring a holding only makes sense for symbols the targets don't manage.
    pub fn check_ignored(&self, ignore: &[String]) -> Result<(), ConfigError> {
        let managed = std::iter::once(&self.core_position.symbol)
            .chain(self.targets.iter().map(|t| &t.symbol));
        for symbol in managed {
            if ignore.iter().any(|i| i.eq_ignore_ascii_case(symbol)) {
                return Err(ConfigError::IgnoredTarget(symbol.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AccountTargetBuilder {
    account_number: Option<String>,
    core_position: Option<CorePositionBuilder>,
    #[serde(deserialize_with = "deserialize_targets")]
    positions: Option<Vec<PositionTarget>>,
}

impl TryFrom<AccountTargetBuilder> for AccountTarget {
    type Error = ConfigError;

    fn try_from(builder: AccountTargetBuilder) -> Result<Self, Self::Error> {
        let account_number = builder
            .account_number
            .ok_or(ConfigError::Missing("AccountNumber"))?;
        let core = builder
            .core_position
            .ok_or(ConfigError::Missing("CorePosition"))?;
        let core_position = CorePosition {
            symbol: core.symbol.ok_or(ConfigError::Missing("CorePosition.Symbol"))?,
            minimum: core
                .minimum
                .ok_or(ConfigError::Missing("CorePosition.Minimum"))?,
        };
        let targets = builder.positions.ok_or(ConfigError::Missing("Positions"))?;
        let target = AccountTarget::new(account_number, core_position, targets)?;
        let total = target.weight_total()?;
        if total != Percent::HUNDRED {
            info!(%total, "Target allocations do not add up to 100%, treating them as relative weights");
        }
        Ok(target)
    }
}

impl AccountTargetBuilder {
    pub fn build(self) -> Result<AccountTarget, ConfigError> {
        self.try_into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct CorePositionBuilder {
    symbol: Option<String>,
    minimum: Option<Dollar>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorePosition {
    pub symbol: String,
    /// Minimum amount to retain in the core position in dollars
    pub minimum: Dollar,
}

impl CorePosition {
    pub fn new(symbol: impl Into<String>, minimum: Dollar) -> Self {
        Self {
            symbol: symbol.into(),
            minimum,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PositionTarget {
    pub symbol: String,
    pub percent: Percent,
}

impl PositionTarget {
    pub fn new(symbol: impl Into<String>, percent: Percent) -> Self {
        Self {
            symbol: symbol.into(),
            percent,
        }
    }
}

/// `Positions` is either a `SYMBOL: percent` mapping or a list of
/// `{Symbol, Percent}` entries. File order is kept in both cases.
fn deserialize_targets<'de, D>(deserializer: D) -> Result<Option<Vec<PositionTarget>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct TargetsVisitor;

    impl<'de> Visitor<'de> for TargetsVisitor {
        type Value = Vec<PositionTarget>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a mapping of symbol to percent or a list of Symbol/Percent entries")
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut targets = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((symbol, percent)) = map.next_entry::<String, Percent>()? {
                targets.push(PositionTarget { symbol, percent });
            }
            Ok(targets)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut targets = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(target) = seq.next_element::<PositionTarget>()? {
                targets.push(target);
            }
            Ok(targets)
        }
    }

    deserializer.deserialize_any(TargetsVisitor).map(Some)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;

    const TARGET_YAML: &str = "
AccountNumber: X12345678
CorePosition:
  Symbol: FZFXX
  Minimum: 2000
Positions:
  FXNAX: 25
  FSKAX: 45
  FTIHX: 30
";

    fn symbols(target: &AccountTarget) -> Vec<&str> {
        target.targets().iter().map(|t| t.symbol.as_str()).collect()
    }

    #[test]
    fn loads_mapping_in_file_order() {
        let target = AccountTarget::from_reader(TARGET_YAML.as_bytes()).unwrap();
        assert_eq!(target.account_number, "X12345678");
        assert_eq!(
            target.core_position,
            CorePosition::new("FZFXX", Dollar::from_cents(200000))
        );
        assert_eq!(symbols(&target), ["FXNAX", "FSKAX", "FTIHX"]);
        assert_eq!(target.weight("FSKAX"), Some(Percent::new(dec!(45))));
        assert_eq!(target.weight("FZFXX"), None);
    }

    #[test]
    fn loads_list_format() {
        let yaml = "
AccountNumber: X12345678
CorePosition:
  Symbol: SPAXX
  Minimum: 150.25
Positions:
  - Symbol: VTI
    Percent: 60
  - Symbol: BND
    Percent: 40
";
        let target = AccountTarget::from_reader(yaml.as_bytes()).unwrap();
        assert_eq!(target.core_position.minimum, Dollar::from_cents(15025));
        assert_eq!(symbols(&target), ["VTI", "BND"]);
    }

    #[test]
    fn accepts_weights_not_adding_up_to_100() {
        let yaml = TARGET_YAML.replace("FTIHX: 30", "FTIHX: 130");
        let target = AccountTarget::from_reader(yaml.as_bytes()).unwrap();
        assert_eq!(target.weight_total().unwrap(), Percent::new(dec!(200)));
    }

    #[test]
    fn reports_missing_fields() {
        let missing = |yaml: &str| match AccountTarget::from_reader(yaml.as_bytes()) {
            Err(ConfigError::Missing(field)) => field,
            other => panic!("expected a missing field, got {other:?}"),
        };
        assert_eq!(
            missing("CorePosition: {Symbol: FZFXX, Minimum: 1}\nPositions: {A: 1}"),
            "AccountNumber"
        );
        assert_eq!(missing("AccountNumber: X1\nPositions: {A: 1}"), "CorePosition");
        assert_eq!(
            missing("AccountNumber: X1\nCorePosition: {Symbol: FZFXX}\nPositions: {A: 1}"),
            "CorePosition.Minimum"
        );
        assert_eq!(
            missing("AccountNumber: X1\nCorePosition: {Symbol: FZFXX, Minimum: 1}"),
            "Positions"
        );
    }

    #[test]
    fn rejects_empty_positions() {
        let yaml = "AccountNumber: X1\nCorePosition: {Symbol: FZFXX, Minimum: 1}\nPositions:\n";
        assert!(matches!(
            AccountTarget::from_reader(yaml.as_bytes()),
            Err(ConfigError::NoTargets)
        ));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let yaml = "AccountNumber: X1\nCorePosition: {Symbol: FZFXX, Minimum: lots}\n";
        assert!(matches!(
            AccountTarget::from_reader(yaml.as_bytes()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validation_rules() {
        let core = CorePosition::new("FZFXX", Dollar::from_cents(100));
        let pct = |p: i64| Percent::new(Decimal::from(p));

        let negative_min = AccountTarget::new(
            "X1",
            CorePosition::new("FZFXX", Dollar::from_cents(-1)),
            vec![PositionTarget::new("A", pct(100))],
        );
        assert!(matches!(negative_min, Err(ConfigError::NegativeMinimum(_))));

        let empty = AccountTarget::new("X1", core.clone(), vec![]);
        assert!(matches!(empty, Err(ConfigError::NoTargets)));

        let negative = AccountTarget::new(
            "X1",
            core.clone(),
            vec![PositionTarget::new("A", pct(-5))],
        );
        assert!(matches!(negative, Err(ConfigError::NegativeTarget { .. })));

        let zero = AccountTarget::new(
            "X1",
            core.clone(),
            vec![PositionTarget::new("A", pct(0)), PositionTarget::new("B", pct(0))],
        );
        assert!(matches!(zero, Err(ConfigError::ZeroTotal)));

        let huge = Percent::new(Decimal::from_i128_with_scale(5 * 10i128.pow(28), 0));
        let overflow = AccountTarget::new(
            "X1",
            core.clone(),
            vec![PositionTarget::new("A", huge), PositionTarget::new("B", huge)],
        );
        assert!(matches!(overflow, Err(ConfigError::WeightOverflow)));

        let core_in_targets = AccountTarget::new(
            "X1",
            core.clone(),
            vec![PositionTarget::new("FZFXX", pct(100))],
        );
        assert!(matches!(core_in_targets, Err(ConfigError::CoreInTargets(s)) if s == "FZFXX"));

        let duplicate = AccountTarget::new(
            "X1",
            core.clone(),
            vec![PositionTarget::new("A", pct(50)), PositionTarget::new("A", pct(50))],
        );
        assert!(matches!(duplicate, Err(ConfigError::DuplicateTarget(s)) if s == "A"));

        let blank_core = AccountTarget::new(
            "X1",
            CorePosition::new(" ", Dollar::ZERO),
            vec![PositionTarget::new("A", pct(100))],
        );
        assert!(matches!(blank_core, Err(ConfigError::Missing("CorePosition.Symbol"))));
    }

    #[test]
    fn ignoring_managed_symbols_is_rejected() {
        let target = AccountTarget::from_reader(TARGET_YAML.as_bytes()).unwrap();
        assert!(target.check_ignored(&["VMFXX".to_string()]).is_ok());
        assert!(matches!(
            target.check_ignored(&["fskax".to_string()]),
            Err(ConfigError::IgnoredTarget(s)) if s == "FSKAX"
        ));
        assert!(matches!(
            target.check_ignored(&["FZFXX".to_string()]),
            Err(ConfigError::IgnoredTarget(_))
        ));
    }

    #[test]
    fn load_from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("target.yml");
        assert!(matches!(
            AccountTarget::load_from_file(&missing),
            Err(ConfigError::Open { .. })
        ));
        std::fs::write(&missing, TARGET_YAML).unwrap();
        assert!(AccountTarget::load_from_file(&missing).is_ok());
    }
}
