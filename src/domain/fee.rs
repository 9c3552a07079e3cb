use super::money::Cents;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Computes the processing fee added on top of a charge.
///
/// Implementations must be deterministic, monotonic in the amount and never
/// negative.
pub trait FeeCalculator: Send + Sync {
    fn fee(&self, amount: Cents) -> Cents;
}

impl<F> FeeCalculator for F
where
    F: Fn(Cents) -> Cents + Send + Sync,
{
    fn fee(&self, amount: Cents) -> Cents {
        self(amount)
    }
}

/// Percentage-plus-fixed fee, the shape card processors charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Percentage of the amount, e.g. `2.9` for 2.9%.
    pub percent: Decimal,
    /// Flat fee in minor units added to every non-empty charge.
    pub fixed_cents: i64,
}

impl FeeSchedule {
    pub fn new(percent: Decimal, fixed_cents: i64) -> Self {
        Self {
            percent,
            fixed_cents,
        }
    }

    pub fn free() -> Self {
        Self::new(Decimal::ZERO, 0)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(dec!(2.9), 30)
    }
}

impl FeeCalculator for FeeSchedule {
    fn fee(&self, amount: Cents) -> Cents {
        if !amount.is_positive() {
            return Cents::ZERO;
        }
        let variable = Decimal::from(amount.value())
            .checked_mul(self.percent)
            .map(|v| (v / dec!(100)).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|v| v.to_i64())
            .unwrap_or(0)
            .max(0);
        Cents::new(variable.saturating_add(self.fixed_cents.max(0)))
    }
}
