use std::{fmt, str::FromStr};

use derive_more::{Add, AddAssign, Div, Mul, Sub, SubAssign, Sum};
use rust_decimal::Decimal;
use serde::Deserialize;

/// An exact dollar amount.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Add,
    AddAssign,
    Sub,
    SubAssign,
    Mul,
    Div,
    Sum,
    Deserialize,
)]
#[serde(transparent)]
pub struct Dollar(Decimal);

impl Dollar {
    pub const ZERO: Dollar = Dollar(Decimal::ZERO);
    pub const CENT: Dollar = Dollar(Decimal::from_parts(1, 0, 0, false, 2));

    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Rounds to whole cents, half to even.
    pub fn round_cents(&self) -> Self {
        Self(self.0.round_dp(2))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Sum that reports overflow instead of panicking.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(values: I) -> Option<Self> {
        values
            .into_iter()
            .try_fold(Self::ZERO, |total, value| total.checked_add(value))
    }

    /// `None` for zero, so "nothing to do" stays distinguishable from an amount.
    pub fn non_zero(self) -> Option<Self> {
        (!self.is_zero()).then_some(self)
    }
}

impl From<Decimal> for Dollar {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl FromStr for Dollar {
    type Err = rust_decimal::Error;

    /// Accepts export formatting such as `$1,234.56` or `-$12.00`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '$' | ',' | '+'))
            .collect();
        Decimal::from_str(&cleaned).map(Self)
    }
}

impl fmt::Display for Dollar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cents = self.0.round_dp(2);
        let sign = if cents < Decimal::ZERO { "-" } else { "" };
        let text = format!("{:.2}", cents.abs());
        let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));
        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, c) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        write!(f, "{sign}${grouped}.{frac}")
    }
}

/// A percentage point value, so `25` reads as 25%.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Add,
    AddAssign,
    Sub,
    SubAssign,
    Mul,
    Div,
    Sum,
    Deserialize,
)]
#[serde(transparent)]
pub struct Percent(Decimal);

impl Percent {
    pub const ZERO: Percent = Percent(Decimal::ZERO);
    pub const HUNDRED: Percent = Percent(Decimal::ONE_HUNDRED);

    pub const fn new(points: Decimal) -> Self {
        Self(points)
    }

    pub fn points(&self) -> Decimal {
        self.0
    }

    /// `part` as a share of `whole`; zero when `whole` is zero.
    pub fn of(part: Dollar, whole: Dollar) -> Self {
        if whole.is_zero() {
            return Self::ZERO;
        }
        Self(part.amount() / whole.amount() * Decimal::ONE_HUNDRED)
    }

    /// `weight` as a share of the sum of all weights.
    pub fn normalized(weight: Percent, total: Percent) -> Self {
        if total.0.is_zero() {
            return Self::ZERO;
        }
        Self(weight.0 / total.0 * Decimal::ONE_HUNDRED)
    }

    /// `weight / total`, a share between zero and one.
    pub fn fraction(weight: Percent, total: Percent) -> Decimal {
        if total.0.is_zero() {
            return Decimal::ZERO;
        }
        weight.0 / total.0
    }

    /// Sum that reports overflow instead of panicking.
    pub fn checked_sum<I: IntoIterator<Item = Self>>(values: I) -> Option<Self> {
        values
            .into_iter()
            .try_fold(Self::ZERO, |total, value| total.0.checked_add(value.0).map(Self))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl From<Decimal> for Percent {
    fn from(points: Decimal) -> Self {
        Self(points)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0.round_dp(2))
    }
}
