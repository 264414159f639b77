//! Decimal money amounts.
//!
//! The platform trades in a single store currency, so `Money` is just a
//! `Decimal` with the arithmetic and rounding rules the pricing and
//! commission code rely on. Amounts serialize as strings (`"12.50"`).

use core::fmt;
use core::ops::{Add, AddAssign, Mul, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places money is kept at.
pub const MONEY_SCALE: u32 = 2;

/// An amount in the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build an amount from minor units, e.g. `from_cents(1999)` is `19.99`.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, MONEY_SCALE))
    }

    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Round half away from zero to cents.
    #[must_use]
    pub fn round(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// `percent`% of this amount, truncated toward zero to cents.
    ///
    /// Truncation keeps a set of shares from ever summing past the amount
    /// they were taken from.
    #[must_use]
    pub fn percent(self, percent: Decimal) -> Self {
        let share = self.0 * percent / Decimal::ONE_HUNDRED;
        Self(share.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero))
    }

    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Clamp negative amounts to zero.
    #[must_use]
    pub fn non_negative(self) -> Self {
        if self.is_negative() { Self::ZERO } else { self }
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_truncates() {
        // 10% of 0.99 is 0.099, which must not round up to 0.10
        let share = Money::from_cents(99).percent(Decimal::TEN);
        assert_eq!(share, Money::from_cents(9));
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(Money::new(Decimal::new(1005, 3)).round(), Money::from_cents(101));
        assert_eq!(Money::new(Decimal::new(-1005, 3)).round(), Money::from_cents(-101));
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(Money::from_cents(-5).non_negative(), Money::ZERO);
        assert_eq!(Money::from_cents(5).non_negative(), Money::from_cents(5));
        assert!(!Money::ZERO.is_negative());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_cents(1250)).unwrap();
        assert_eq!(json, "\"12.50\"");
        assert_eq!(Money::from_cents(1250).to_string(), "12.50");
    }

    #[test]
    fn test_sum_and_mul() {
        let total: Money = [Money::from_cents(150), Money::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(400));
        assert_eq!(Money::from_cents(150) * 3, Money::from_cents(450));
    }
}
