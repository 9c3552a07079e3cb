use super::split_engine::SplitEngine;
use crate::config::{BillConfig, UnbalancedPolicy};
use crate::domain::bill::{Bill, BillStatus};
use crate::domain::ids::{BillId, MemberId};
use crate::domain::ports::BillStoreBox;
use crate::domain::split::{HUNDRED, SplitMode, SplitState};
use crate::error::{BillSplitError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Creates bills and persists edits to their split.
///
/// This is where a split leaves the pure engine and becomes the
/// authoritative per-member share, so the percentage balance gate lives here.
pub struct BillService {
    bills: BillStoreBox,
    engine: SplitEngine,
    config: BillConfig,
    currency: String,
}

impl BillService {
    pub fn new(
        bills: BillStoreBox,
        engine: SplitEngine,
        config: BillConfig,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            bills,
            engine,
            config,
            currency: currency.into(),
        }
    }

    pub fn engine(&self) -> &SplitEngine {
        &self.engine
    }

    /// Creates an active bill split equally between `owner` and `members`.
    ///
    /// The owner always gets a share; duplicate members are ignored.
    pub async fn create_bill(
        &self,
        owner: &MemberId,
        amount: Decimal,
        due_date: NaiveDate,
        members: &[MemberId],
        mode: SplitMode,
    ) -> Result<Bill> {
        if amount <= Decimal::ZERO {
            return Err(BillSplitError::ValidationError(
                "Bill amount must be positive".to_string(),
            ));
        }
        let mut roster = vec![owner.clone()];
        for member in members {
            if !roster.contains(member) {
                roster.push(member.clone());
            }
        }

        let split = self.engine.compute_split(amount, mode, &roster);
        let bill = Bill::new(owner.clone(), amount, self.currency.clone(), due_date, split);
        self.bills.store(bill.clone()).await?;
        tracing::info!(bill = %bill.id, owner = %owner, members = roster.len(), "Bill created");
        Ok(bill)
    }

    pub async fn get_bill(&self, bill_id: BillId) -> Result<Bill> {
        self.bills
            .get(bill_id)
            .await?
            .ok_or(BillSplitError::BillNotFound(bill_id))
    }

    /// Persists an edited split as the bill's authoritative shares.
    ///
    /// An unbalanced percentage split is normalized, rejected or flagged
    /// according to the configured policy. Fixed splits may fall short of the
    /// bill amount but never exceed it.
    pub async fn commit_split(&self, bill_id: BillId, state: SplitState) -> Result<Bill> {
        let mut bill = self.get_bill(bill_id).await?;
        if bill.status != BillStatus::Active {
            return Err(BillSplitError::ValidationError(format!(
                "Bill {} can no longer be edited",
                bill_id
            )));
        }
        for share in &state.shares {
            if bill.share(&share.member_id).is_none() {
                return Err(BillSplitError::ValidationError(format!(
                    "{} is not a member of bill {}",
                    share.member_id, bill_id
                )));
            }
            if share.value < Decimal::ZERO {
                return Err(BillSplitError::ValidationError(format!(
                    "Share of {} cannot be negative",
                    share.member_id
                )));
            }
            let limit = match state.mode {
                SplitMode::Percentage => HUNDRED,
                SplitMode::Fixed => bill.amount,
            };
            if share.value > limit {
                return Err(BillSplitError::ValidationError(format!(
                    "Share of {} cannot exceed {}",
                    share.member_id, limit
                )));
            }
        }

        let mut state = state;
        state.total = bill.amount;
        let mut needs_attention = false;
        match state.mode {
            SplitMode::Percentage if !state.is_balanced(self.engine.config().tolerance) => {
                match self.config.unbalanced_policy {
                    UnbalancedPolicy::Normalize => {
                        tracing::debug!(bill = %bill_id, "Normalizing unbalanced split");
                        state = self.engine.rebalance(&state);
                    }
                    UnbalancedPolicy::Reject => {
                        return Err(BillSplitError::ValidationError(format!(
                            "Split must add up to 100%, got {}%",
                            state.included_sum().round_dp(2)
                        )));
                    }
                    UnbalancedPolicy::Flag => {
                        tracing::warn!(bill = %bill_id, "Persisting unbalanced split");
                        needs_attention = true;
                    }
                }
            }
            SplitMode::Fixed if state.included_sum() > bill.amount => {
                return Err(BillSplitError::ValidationError(format!(
                    "Fixed shares add up to {}, more than the bill amount {}",
                    state.included_sum(),
                    bill.amount
                )));
            }
            _ => {}
        }

        bill.split = state;
        bill.needs_attention = needs_attention;
        self.bills.store(bill.clone()).await?;
        Ok(bill)
    }

    pub async fn cancel_bill(&self, bill_id: BillId) -> Result<Bill> {
        let mut bill = self.get_bill(bill_id).await?;
        bill.status = BillStatus::Canceled;
        self.bills.store(bill.clone()).await?;
        Ok(bill)
    }

    /// Deletes the bill and, with it, every participant share.
    pub async fn delete_bill(&self, bill_id: BillId) -> Result<()> {
        self.bills.delete(bill_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitConfig;
    use crate::infrastructure::in_memory::InMemoryBillStore;
    use rust_decimal_macros::dec;

    fn service(policy: UnbalancedPolicy) -> BillService {
        BillService::new(
            Box::new(InMemoryBillStore::new()),
            SplitEngine::new(SplitConfig::default()),
            BillConfig {
                unbalanced_policy: policy,
            },
            "usd",
        )
    }

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 1).unwrap()
    }

    fn ids(names: &[&str]) -> Vec<MemberId> {
        names.iter().map(|n| MemberId::new(*n)).collect()
    }

    #[tokio::test]
    async fn test_create_bill_includes_owner() {
        let svc = service(UnbalancedPolicy::Normalize);
        let owner = MemberId::new("alice");
        let bill = svc
            .create_bill(&owner, dec!(100), due(), &ids(&["bob", "alice", "carol"]), SplitMode::Percentage)
            .await
            .unwrap();

        assert_eq!(bill.split.shares.len(), 3);
        assert_eq!(bill.split.shares[0].member_id, owner);
        assert_eq!(bill.status, BillStatus::Active);
        assert_eq!(bill.currency, "usd");
        assert_eq!(svc.get_bill(bill.id).await.unwrap(), bill);
    }

    #[tokio::test]
    async fn test_create_bill_rejects_non_positive_amount() {
        let svc = service(UnbalancedPolicy::Normalize);
        let result = svc
            .create_bill(&MemberId::new("alice"), dec!(0), due(), &[], SplitMode::Fixed)
            .await;
        assert!(matches!(result, Err(BillSplitError::ValidationError(_))));
    }

    async fn unbalanced(svc: &BillService) -> (Bill, SplitState) {
        let bill = svc
            .create_bill(&MemberId::new("alice"), dec!(100), due(), &ids(&["bob", "carol"]), SplitMode::Percentage)
            .await
            .unwrap();
        let state = svc
            .engine()
            .set_member_value(&bill.split, &MemberId::new("alice"), dec!(50));
        let state = svc.engine().set_inclusion(&state, &MemberId::new("carol"), false);
        (bill, state)
    }

    #[tokio::test]
    async fn test_commit_normalizes_by_default() {
        let svc = service(UnbalancedPolicy::Normalize);
        let (bill, state) = unbalanced(&svc).await;
        assert!(!state.is_balanced(dec!(0.01)));

        let saved = svc.commit_split(bill.id, state).await.unwrap();
        assert!(saved.split.is_balanced(dec!(0.01)));
        assert!(!saved.needs_attention);
        assert_eq!(
            saved.share(&MemberId::new("alice")).unwrap().value,
            dec!(100) / dec!(75) * dec!(50)
        );
    }

    #[tokio::test]
    async fn test_commit_rejects_when_configured() {
        let svc = service(UnbalancedPolicy::Reject);
        let (bill, state) = unbalanced(&svc).await;
        let result = svc.commit_split(bill.id, state).await;
        assert!(matches!(result, Err(BillSplitError::ValidationError(_))));
        assert!(!svc.get_bill(bill.id).await.unwrap().split.custom);
    }

    #[tokio::test]
    async fn test_commit_flags_when_configured() {
        let svc = service(UnbalancedPolicy::Flag);
        let (bill, state) = unbalanced(&svc).await;
        let saved = svc.commit_split(bill.id, state).await.unwrap();
        assert!(saved.needs_attention);
        assert_eq!(saved.split.included_sum(), dec!(75));
    }

    #[tokio::test]
    async fn test_commit_rejects_percentage_over_hundred() {
        let svc = service(UnbalancedPolicy::Normalize);
        let (bill, mut state) = unbalanced(&svc).await;
        state.shares[0].value = dec!(150);
        let result = svc.commit_split(bill.id, state).await;
        assert!(matches!(result, Err(BillSplitError::ValidationError(_))));
        assert!(!svc.get_bill(bill.id).await.unwrap().split.custom);
    }

    #[tokio::test]
    async fn test_commit_normalizes_vanishing_split() {
        let svc = service(UnbalancedPolicy::Normalize);
        let (bill, mut state) = unbalanced(&svc).await;
        state.shares[0].value = Decimal::new(1, 28);
        state.shares[1].value = Decimal::ZERO;

        let saved = svc.commit_split(bill.id, state).await.unwrap();
        assert!(saved.split.is_balanced(dec!(0.01)));
        assert_eq!(saved.share(&MemberId::new("alice")).unwrap().value, dec!(50));
    }

    #[tokio::test]
    async fn test_commit_rejects_fixed_over_total() {
        let svc = service(UnbalancedPolicy::Normalize);
        let bill = svc
            .create_bill(&MemberId::new("alice"), dec!(90), due(), &ids(&["bob"]), SplitMode::Fixed)
            .await
            .unwrap();
        let state = svc
            .engine()
            .set_member_value(&bill.split, &MemberId::new("bob"), dec!(80));
        let result = svc.commit_split(bill.id, state).await;
        assert!(matches!(result, Err(BillSplitError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_commit_rejects_unknown_member() {
        let svc = service(UnbalancedPolicy::Normalize);
        let bill = svc
            .create_bill(&MemberId::new("alice"), dec!(90), due(), &ids(&["bob"]), SplitMode::Fixed)
            .await
            .unwrap();
        let mut state = bill.split.clone();
        state.shares[1].member_id = MemberId::new("mallory");
        assert!(svc.commit_split(bill.id, state).await.is_err());
    }

    #[tokio::test]
    async fn test_canceled_bill_rejects_edits() {
        let svc = service(UnbalancedPolicy::Normalize);
        let bill = svc
            .create_bill(&MemberId::new("alice"), dec!(90), due(), &ids(&["bob"]), SplitMode::Fixed)
            .await
            .unwrap();
        let canceled = svc.cancel_bill(bill.id).await.unwrap();
        assert_eq!(canceled.status, BillStatus::Canceled);
        assert!(!canceled.accepts_payments());

        let result = svc.commit_split(bill.id, bill.split.clone()).await;
        assert!(matches!(result, Err(BillSplitError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_delete_bill_removes_shares() {
        let svc = service(UnbalancedPolicy::Normalize);
        let bill = svc
            .create_bill(&MemberId::new("alice"), dec!(90), due(), &ids(&["bob"]), SplitMode::Fixed)
            .await
            .unwrap();
        svc.delete_bill(bill.id).await.unwrap();
        assert!(matches!(
            svc.get_bill(bill.id).await,
            Err(BillSplitError::BillNotFound(_))
        ));
    }
}
