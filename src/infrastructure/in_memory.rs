use crate::domain::attempt::PaymentAttempt;
use crate::domain::bill::Bill;
use crate::domain::ids::{AttemptId, BillId, GroupKey, ParticipantId};
use crate::domain::ports::{AttemptStore, AttemptUpdate, BillStore};
use crate::error::{BillSplitError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for bills and their shares.
///
/// Uses `Arc<RwLock<HashMap<BillId, Bill>>>` to allow shared concurrent access.
#[derive(Default, Clone)]
pub struct InMemoryBillStore {
    bills: Arc<RwLock<HashMap<BillId, Bill>>>,
}

impl InMemoryBillStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BillStore for InMemoryBillStore {
    async fn store(&self, bill: Bill) -> Result<()> {
        let mut bills = self.bills.write().await;
        bills.insert(bill.id, bill);
        Ok(())
    }

    async fn get(&self, bill_id: BillId) -> Result<Option<Bill>> {
        let bills = self.bills.read().await;
        Ok(bills.get(&bill_id).cloned())
    }

    async fn delete(&self, bill_id: BillId) -> Result<()> {
        let mut bills = self.bills.write().await;
        bills.remove(&bill_id);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Bill>> {
        let bills = self.bills.read().await;
        let mut all: Vec<Bill> = bills.values().cloned().collect();
        all.sort_by_key(|b| b.created_at);
        Ok(all)
    }
}

/// A thread-safe in-memory ledger of payment attempts.
///
/// `reserve` holds the write lock across the in-flight check and the
/// inserts, which is the transaction boundary concurrent payers race on.
#[derive(Default, Clone)]
pub struct InMemoryAttemptStore {
    attempts: Arc<RwLock<HashMap<AttemptId, PaymentAttempt>>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut attempts: Vec<PaymentAttempt>) -> Vec<PaymentAttempt> {
    attempts.sort_by_key(|a| (a.created_at, a.id));
    attempts
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn reserve(&self, batch: Vec<PaymentAttempt>) -> Result<()> {
        let mut attempts = self.attempts.write().await;
        for new in &batch {
            if attempts
                .values()
                .any(|a| a.participant == new.participant && a.status.is_in_flight())
            {
                return Err(BillSplitError::AttemptInFlight(new.participant.clone()));
            }
        }
        for new in batch {
            attempts.insert(new.id, new);
        }
        Ok(())
    }

    async fn modify(&self, attempt_id: AttemptId, apply: AttemptUpdate) -> Result<(PaymentAttempt, bool)> {
        let mut attempts = self.attempts.write().await;
        let stored = attempts
            .get_mut(&attempt_id)
            .ok_or(BillSplitError::AttemptNotFound(attempt_id))?;
        let mut next = stored.clone();
        if !apply(&mut next)? {
            return Ok((stored.clone(), false));
        }
        *stored = next.clone();
        Ok((next, true))
    }

    async fn get(&self, attempt_id: AttemptId) -> Result<Option<PaymentAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts.get(&attempt_id).cloned())
    }

    async fn by_group(&self, group_key: GroupKey) -> Result<Vec<PaymentAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(sorted(
            attempts
                .values()
                .filter(|a| a.group_key == Some(group_key))
                .cloned()
                .collect(),
        ))
    }

    async fn by_intent(&self, intent_id: &str) -> Result<Option<PaymentAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .values()
            .find(|a| a.provider_intent_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn for_participant(&self, participant: &ParticipantId) -> Result<Vec<PaymentAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(sorted(
            attempts
                .values()
                .filter(|a| &a.participant == participant)
                .cloned()
                .collect(),
        ))
    }

    async fn all(&self) -> Result<Vec<PaymentAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(sorted(attempts.values().cloned().collect()))
    }
}
