use crate::config::{CustomInclusion, SplitConfig};
use crate::domain::ids::MemberId;
use crate::domain::split::{HUNDRED, MemberShare, SplitMode, SplitState};
use rust_decimal::Decimal;

/// Computes and rebalances per-member share vectors.
///
/// Every operation takes the prior state by reference and returns a new one,
/// so the engine holds no mutable state and can be shared freely. None of the
/// operations fail: unknown or excluded members leave the state unchanged.
///
/// In percentage mode `set_member_value` and `drag_adjust` always return a
/// split whose included values sum to 100 (within `tolerance`).
#[derive(Debug, Clone, Default)]
pub struct SplitEngine {
    config: SplitConfig,
}

impl SplitEngine {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// `count` values of `100 / count`, unrounded.
    pub fn equal_percentages(count: usize) -> Vec<Decimal> {
        if count == 0 {
            return Vec::new();
        }
        vec![HUNDRED / Decimal::from(count); count]
    }

    /// `floor(total / count)`.
    ///
    /// The remainder is not handed out to anyone, so `count` shares may add
    /// up to less than `total`.
    pub fn equal_fixed_share(total: Decimal, count: usize) -> Decimal {
        if count == 0 {
            return Decimal::ZERO;
        }
        (total / Decimal::from(count)).floor()
    }

    /// Equal split of `total` across `members`, all included.
    pub fn compute_split(&self, total: Decimal, mode: SplitMode, members: &[MemberId]) -> SplitState {
        let state = SplitState {
            mode,
            custom: false,
            total,
            shares: members
                .iter()
                .map(|m| MemberShare::new(m.clone(), true, Decimal::ZERO))
                .collect(),
        };
        equalize(state)
    }

    pub fn set_member_value(
        &self,
        state: &SplitState,
        member_id: &MemberId,
        new_value: Decimal,
    ) -> SplitState {
        let mut next = state.clone();
        let Some(idx) = position_included(&next, member_id) else {
            return next;
        };
        next.custom = true;

        match next.mode {
            SplitMode::Fixed => {
                next.shares[idx].value = new_value.max(Decimal::ZERO);
            }
            SplitMode::Percentage => {
                let others: Vec<usize> = next
                    .shares
                    .iter()
                    .enumerate()
                    .filter(|(i, s)| *i != idx && s.included)
                    .map(|(i, _)| i)
                    .collect();

                if others.is_empty() {
                    next.shares[idx].value = HUNDRED;
                } else {
                    let value = new_value
                        .clamp(self.config.member_value_min, self.config.member_value_max);
                    let each = (HUNDRED - value) / Decimal::from(others.len());
                    next.shares[idx].value = value;
                    for i in others {
                        next.shares[i].value = each;
                    }
                }
                self.normalize(&mut next);
            }
        }
        next
    }

    pub fn set_inclusion(&self, state: &SplitState, member_id: &MemberId, included: bool) -> SplitState {
        let mut next = state.clone();
        let Some(idx) = next.shares.iter().position(|s| &s.member_id == member_id) else {
            return next;
        };
        if next.shares[idx].included == included {
            return next;
        }
        next.shares[idx].included = included;
        if !included {
            next.shares[idx].value = Decimal::ZERO;
        }

        if !next.custom {
            return equalize(next);
        }
        if next.mode == SplitMode::Percentage
            && self.config.custom_inclusion == CustomInclusion::Proportional
        {
            return self.rebalance(&next);
        }
        next
    }

    /// Switches mode and resets every included member to the equal split.
    pub fn set_mode(&self, state: &SplitState, mode: SplitMode) -> SplitState {
        let mut next = state.clone();
        next.mode = mode;
        equalize(next)
    }

    pub fn set_locked(&self, state: &SplitState, member_id: &MemberId, locked: bool) -> SplitState {
        let mut next = state.clone();
        if let Some(share) = next.shares.iter_mut().find(|s| &s.member_id == member_id) {
            share.is_locked = locked;
        }
        next
    }

    /// Scales included percentages so they sum to 100.
    ///
    /// A split whose included values are all zero, or too small or large to
    /// scale within `Decimal` range, falls back to equal shares.
    pub fn rebalance(&self, state: &SplitState) -> SplitState {
        let mut next = state.clone();
        if next.mode != SplitMode::Percentage || next.included_count() == 0 {
            return next;
        }
        match scaled_to_hundred(&next) {
            Some(values) => {
                for (share, value) in next.shares.iter_mut().filter(|s| s.included).zip(values) {
                    share.value = value;
                }
                next
            }
            None => equalize(next),
        }
    }

    /// Moves `member_id` by `delta` percentage points as a drag gesture would.
    ///
    /// The neighbor in the drag direction absorbs the change first, within
    /// the `[drag_min, drag_max]` band. Whatever it cannot absorb is spread
    /// evenly over the other included, unlocked members. The result is then
    /// renormalized if it drifted from 100 by more than `tolerance`.
    pub fn drag_adjust(&self, state: &SplitState, member_id: &MemberId, delta: Decimal) -> SplitState {
        let mut next = state.clone();
        if next.mode != SplitMode::Percentage {
            return next;
        }
        let order: Vec<usize> = next
            .shares
            .iter()
            .enumerate()
            .filter(|(_, s)| s.included)
            .map(|(i, _)| i)
            .collect();
        let Some(pos) = order
            .iter()
            .position(|&i| &next.shares[i].member_id == member_id)
        else {
            return next;
        };
        let dragged = order[pos];
        next.custom = true;

        if order.len() == 1 {
            next.shares[dragged].value = HUNDRED;
            return next;
        }

        let old = next.shares[dragged].value;
        let new = old.saturating_add(delta).clamp(self.config.drag_min, self.config.drag_max);
        let change = new - old;
        if change.is_zero() {
            self.normalize(&mut next);
            return next;
        }
        next.shares[dragged].value = new;

        // Positive: the others must give up `remaining` points in total.
        let mut remaining = change;
        let mut saturated = None;

        let candidates = if delta > Decimal::ZERO {
            [pos.checked_add(1), pos.checked_sub(1)]
        } else {
            [pos.checked_sub(1), pos.checked_add(1)]
        };
        let neighbor = candidates
            .into_iter()
            .flatten()
            .filter_map(|p| order.get(p).copied())
            .find(|&i| !next.shares[i].is_locked);

        if let Some(n) = neighbor {
            let current = next.shares[n].value;
            let floor = self.config.drag_min.min(current);
            let ceiling = self.config.drag_max.max(current);
            let adjusted = current.saturating_sub(remaining).clamp(floor, ceiling);
            remaining -= current - adjusted;
            next.shares[n].value = adjusted;
            if !remaining.is_zero() {
                saturated = Some(n);
            }
        }

        if !remaining.is_zero() {
            let targets: Vec<usize> = order
                .iter()
                .copied()
                .filter(|&i| i != dragged && Some(i) != saturated && !next.shares[i].is_locked)
                .collect();
            if !targets.is_empty() {
                let each = remaining / Decimal::from(targets.len());
                for i in targets {
                    let share = &mut next.shares[i];
                    share.value = share.value.saturating_sub(each).max(Decimal::ZERO);
                }
            }
        }

        self.normalize(&mut next);
        next
    }

    fn normalize(&self, state: &mut SplitState) {
        if state.mode == SplitMode::Percentage
            && !state.is_balanced(self.config.tolerance)
        {
            *state = self.rebalance(state);
        }
    }
}

/// Included values multiplied by `100 / sum`, or `None` when the sum is not
/// positive or the scaling leaves `Decimal` range.
fn scaled_to_hundred(state: &SplitState) -> Option<Vec<Decimal>> {
    let sum = state.included_sum();
    if sum <= Decimal::ZERO {
        return None;
    }
    let factor = HUNDRED.checked_div(sum)?;
    state
        .included()
        .map(|s| s.value.checked_mul(factor))
        .collect()
}

fn position_included(state: &SplitState, member_id: &MemberId) -> Option<usize> {
    state
        .shares
        .iter()
        .position(|s| s.included && &s.member_id == member_id)
}

/// Resets included members to the equal distribution for the state's mode.
fn equalize(mut state: SplitState) -> SplitState {
    let count = state.included_count();
    let value = match state.mode {
        SplitMode::Percentage if count > 0 => HUNDRED / Decimal::from(count),
        SplitMode::Percentage => Decimal::ZERO,
        SplitMode::Fixed => SplitEngine::equal_fixed_share(state.total, count),
    };
    for share in state.shares.iter_mut() {
        share.value = if share.included { value } else { Decimal::ZERO };
    }
    state.custom = false;
    state
}
