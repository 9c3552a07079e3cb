use crate::error::{BillSplitError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// An amount in the smallest currency unit (cents for USD).
///
/// Everything sent to the payment processor and stored on attempt rows is
/// expressed in `Cents`; split values stay in `Decimal` currency units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Self = Self(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Converts a currency-unit amount into minor units, rounding half away
    /// from zero at the given scale (2 for cents).
    pub fn from_decimal(amount: Decimal, scale: u32) -> Result<Self> {
        let factor = 10_i64.checked_pow(scale).map(Decimal::from).ok_or_else(|| {
            BillSplitError::ValidationError(format!("Unsupported minor unit scale {}", scale))
        })?;
        amount
            .checked_mul(factor)
            .map(|units| units.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|units| units.to_i64())
            .map(Self)
            .ok_or_else(|| {
                BillSplitError::ValidationError(format!("Amount {} is out of range", amount))
            })
    }

    pub fn to_decimal(self, scale: u32) -> Result<Decimal> {
        Decimal::try_new(self.0, scale).map_err(|_| {
            BillSplitError::ValidationError(format!("Unsupported minor unit scale {}", scale))
        })
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self> {
        self.0.checked_add(rhs.0).map(Self).ok_or_else(|| {
            BillSplitError::ValidationError(format!("Amount {} + {} is out of range", self, rhs))
        })
    }

    /// Adds up `amounts`, failing instead of wrapping on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Self>) -> Result<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |acc, amount| acc.checked_add(amount))
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Add for Cents {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Cents {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
