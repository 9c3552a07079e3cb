use super::ids::MemberId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const HUNDRED: Decimal = dec!(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Values are percentages of the bill total and sum to 100.
    #[default]
    Percentage,
    /// Values are currency units; partial contributions are allowed.
    Fixed,
}

/// One member's slice of a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberShare {
    pub member_id: MemberId,
    pub included: bool,
    /// Percentage (0-100) or currency units, depending on the split mode.
    pub value: Decimal,
    #[serde(default)]
    pub is_locked: bool,
}

impl MemberShare {
    pub fn new(member_id: MemberId, included: bool, value: Decimal) -> Self {
        Self {
            member_id,
            included,
            value,
            is_locked: false,
        }
    }
}

/// Per-member share vector of a bill.
///
/// `custom == false` means the split is the equal distribution derived from
/// `mode`, `total` and the included set; it is never edited member by member.
/// Shares keep display order, which `drag_adjust` relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitState {
    pub mode: SplitMode,
    pub custom: bool,
    pub total: Decimal,
    pub shares: Vec<MemberShare>,
}

impl SplitState {
    pub fn share(&self, member_id: &MemberId) -> Option<&MemberShare> {
        self.shares.iter().find(|s| &s.member_id == member_id)
    }

    pub fn included(&self) -> impl Iterator<Item = &MemberShare> {
        self.shares.iter().filter(|s| s.included)
    }

    pub fn included_count(&self) -> usize {
        self.included().count()
    }

    /// Sum of included values, saturating at the `Decimal` bounds.
    pub fn included_sum(&self) -> Decimal {
        self.included()
            .fold(Decimal::ZERO, |acc, s| acc.saturating_add(s.value))
    }

    /// Whether the split satisfies its mode's balance rule.
    ///
    /// Fixed splits are always balanced: they may legitimately fall short
    /// of the bill total.
    pub fn is_balanced(&self, tolerance: Decimal) -> bool {
        match self.mode {
            SplitMode::Percentage => {
                self.included_count() == 0 || self.included_sum().saturating_sub(HUNDRED).abs() <= tolerance
            }
            SplitMode::Fixed => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(values: &[(&str, bool, Decimal)]) -> SplitState {
        SplitState {
            mode: SplitMode::Percentage,
            custom: true,
            total: dec!(100),
            shares: values
                .iter()
                .map(|(m, inc, v)| MemberShare::new(MemberId::new(*m), *inc, *v))
                .collect(),
        }
    }

    #[test]
    fn test_included_sum_ignores_excluded() {
        let s = state(&[
            ("a", true, dec!(60)),
            ("b", true, dec!(40)),
            ("c", false, dec!(25)),
        ]);
        assert_eq!(s.included_count(), 2);
        assert_eq!(s.included_sum(), dec!(100));
        assert!(s.is_balanced(dec!(0.01)));
    }

    #[test]
    fn test_unbalanced_percentage() {
        let s = state(&[("a", true, dec!(60)), ("b", true, dec!(30))]);
        assert!(!s.is_balanced(dec!(0.01)));
    }

    #[test]
    fn test_included_sum_saturates() {
        let s = state(&[("a", true, Decimal::MAX), ("b", true, Decimal::MAX)]);
        assert_eq!(s.included_sum(), Decimal::MAX);
        assert!(!s.is_balanced(dec!(0.01)));
    }

    #[test]
    fn test_fixed_is_always_balanced() {
        let mut s = state(&[("a", true, dec!(10))]);
        s.mode = SplitMode::Fixed;
        assert!(s.is_balanced(dec!(0.01)));
    }

    #[test]
    fn test_share_serialization() {
        let share = MemberShare::new(MemberId::new("a"), true, dec!(25));
        let json = serde_json::to_string(&share).unwrap();
        assert!(json.contains("\"member_id\":\"a\""));
        let back: MemberShare = serde_json::from_str(&json).unwrap();
        assert_eq!(back, share);
    }
}
