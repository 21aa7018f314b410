use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::op;

/// Number of decimal places that every settled amount is rounded to.
pub const MONEY_SCALE: u32 = 2;

//--------------------------------------       Money         ---------------------------------------------------------
/// A currency amount in major units (e.g. yuan), backed by a fixed-point decimal.
///
/// Parsed and deserialized amounts carry at most [`MONEY_SCALE`] decimal places. Intermediate results (a unit price
/// times a fractional quantity) may carry more until they are rounded with [`Money::round2`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(Decimal);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);
op!(sqlite_text Money);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be interpreted as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Accepts `value` only if it has no more than [`MONEY_SCALE`] significant decimal places.
    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyConversionError> {
        if value.normalize().scale() > MONEY_SCALE {
            return Err(MoneyConversionError(format!("{value} has more than {MONEY_SCALE} decimal places")));
        }
        Ok(Self(value))
    }

    /// Builds an amount from a count of minor units (cents / fen).
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, MONEY_SCALE))
    }

    pub fn value(&self) -> Decimal {
        self.0
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

    /// Half-up rounding to two decimal places.
    pub fn round2(self) -> Self {
        Self(self.0.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    /// The amount in minor units, rounded half-up.
    pub fn to_cents(&self) -> i64 {
        (self.round2().0 * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or_default()
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: Quantity) -> Option<Money> {
        self.0.checked_mul(rhs.0).map(Self)
    }

    /// Adds up `amounts`, or returns `None` if the total does not fit in a decimal.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts.into_iter().try_fold(Self::ZERO, Money::checked_add)
    }

    /// Returns zero instead of a negative value.
    pub fn clamp_zero(self) -> Self {
        if self.is_negative() {
            Self::ZERO
        } else {
            self
        }
    }
}

impl Mul<Quantity> for Money {
    type Output = Money;

    fn mul(self, rhs: Quantity) -> Self::Output {
        Money(self.0 * rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, m| acc + *m)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        Self::from_decimal(value)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::from_decimal(value).map_err(serde::de::Error::custom)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

//--------------------------------------      Quantity       ---------------------------------------------------------
/// A line-item quantity. Fractional for weighed goods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

op!(binary Quantity, Add, add);
op!(binary Quantity, Sub, sub);
op!(sqlite_text Quantity);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl From<i64> for Quantity {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl From<Decimal> for Quantity {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl FromStr for Quantity {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Self).map_err(|e| MoneyConversionError(format!("{s}: {e}")))
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cents_round_trip() {
        let m = Money::from_cents(12_345);
        assert_eq!(m.to_string(), "123.45");
        assert_eq!(m.to_cents(), 12_345);
        assert_eq!(Money::from(7).to_cents(), 700);
    }

    #[test]
    fn round2_is_half_up() {
        let m = Money::new(Decimal::new(1005, 3));
        assert_eq!(m.round2(), Money::from_cents(101));
        let m = Money::new(Decimal::new(1004, 3));
        assert_eq!(m.round2(), Money::from_cents(100));
        let m = Money::new(Decimal::new(-1005, 3));
        assert_eq!(m.round2(), Money::from_cents(-101));
    }

    #[test]
    fn parsed_amounts_have_at_most_two_places() {
        assert_eq!(Money::from_str("12.5").unwrap(), Money::from_cents(1_250));
        assert_eq!(Money::from_str(" 3.10 ").unwrap(), Money::from_cents(310));
        assert_eq!(Money::from_str("7.000").unwrap(), Money::from(7));
        assert!(Money::from_str("0.001").is_err());
        assert!(serde_json::from_str::<Money>("\"0.001\"").is_err());
        assert!(serde_json::from_str::<Money>("1.999").is_err());
        assert_eq!(serde_json::from_str::<Money>("\"19.99\"").unwrap(), Money::from_cents(1_999));
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let max = Money::new(Decimal::MAX);
        assert_eq!(max.checked_add(Money::from(1)), None);
        assert_eq!(max.checked_mul(Quantity::from(2)), None);
        assert_eq!(Money::from(3).checked_mul(Quantity::from(2)), Some(Money::from(6)));
        assert_eq!(Money::checked_sum([Money::from(1), Money::from(2)]), Some(Money::from(3)));
        assert_eq!(Money::checked_sum([max, Money::from(1)]), None);
    }

    #[test]
    fn multiply_by_fractional_quantity() {
        let price = Money::from_cents(1_999);
        let qty = Quantity::from_str("1.5").unwrap();
        assert_eq!((price * qty).round2(), Money::from_cents(2_999));
    }

    #[test]
    fn arithmetic() {
        let mut a = Money::from(10);
        a += Money::from_cents(50);
        a -= Money::from(1);
        assert_eq!(a, Money::from_cents(950));
        assert_eq!(-a, Money::from_cents(-950));
        let total: Money = [Money::from(1), Money::from(2), Money::from(3)].iter().sum();
        assert_eq!(total, Money::from(6));
        assert!(Money::from(-1).clamp_zero().is_zero());
    }

    #[test]
    fn serializes_as_string() {
        let m = Money::from_cents(500);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"5.00\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
