use billsplit::application::split_engine::SplitEngine;
use billsplit::config::{CustomInclusion, SplitConfig};
use billsplit::domain::ids::MemberId;
use billsplit::domain::split::{SplitMode, SplitState};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn roster(count: usize) -> Vec<MemberId> {
    (0..count).map(|i| MemberId::new(format!("m{}", i))).collect()
}

fn percent() -> impl Strategy<Value = Decimal> {
    (-2000i64..15000).prop_map(|v| Decimal::new(v, 2))
}

fn assert_sums_to_hundred(state: &SplitState) -> Result<(), TestCaseError> {
    if state.included_count() > 0 {
        prop_assert!(
            (state.included_sum() - dec!(100)).abs() <= dec!(0.01),
            "sum was {}",
            state.included_sum()
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn set_member_value_keeps_percentages_balanced(
        count in 1usize..8,
        edits in prop::collection::vec((0usize..8, percent()), 1..6),
    ) {
        let engine = SplitEngine::default();
        let members = roster(count);
        let mut state = engine.compute_split(dec!(100), SplitMode::Percentage, &members);
        for (who, value) in edits {
            state = engine.set_member_value(&state, &members[who % count], value);
            assert_sums_to_hundred(&state)?;
            for share in state.included() {
                prop_assert!(share.value >= Decimal::ZERO);
            }
        }
    }

    #[test]
    fn proportional_inclusion_keeps_custom_split_balanced(
        count in 2usize..8,
        value in percent(),
        toggles in prop::collection::vec((0usize..8, any::<bool>()), 1..8),
    ) {
        let engine = SplitEngine::new(SplitConfig {
            custom_inclusion: CustomInclusion::Proportional,
            ..SplitConfig::default()
        });
        let members = roster(count);
        let state = engine.compute_split(dec!(100), SplitMode::Percentage, &members);
        let mut state = engine.set_member_value(&state, &members[0], value);
        for (who, included) in toggles {
            state = engine.set_inclusion(&state, &members[who % count], included);
            assert_sums_to_hundred(&state)?;
        }
    }

    #[test]
    fn drag_keeps_percentages_balanced(
        count in 1usize..8,
        drags in prop::collection::vec((0usize..8, -6000i64..6000), 1..10),
    ) {
        let engine = SplitEngine::default();
        let members = roster(count);
        let mut state = engine.compute_split(dec!(100), SplitMode::Percentage, &members);
        for (who, delta) in drags {
            state = engine.drag_adjust(&state, &members[who % count], Decimal::new(delta, 2));
            assert_sums_to_hundred(&state)?;
            for share in state.included() {
                prop_assert!(share.value >= Decimal::ZERO);
            }
        }
    }

    #[test]
    fn equal_fixed_shares_never_exceed_total(
        cents in 0i64..10_000_000,
        count in 1usize..20,
    ) {
        let total = Decimal::new(cents, 2);
        let share = SplitEngine::equal_fixed_share(total, count);
        prop_assert!(share * Decimal::from(count) <= total);
        prop_assert!(share >= Decimal::ZERO);
        prop_assert_eq!(share, share.floor());
    }
}
