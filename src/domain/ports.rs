use super::attempt::PaymentAttempt;
use super::bill::Bill;
use super::charge::{ChargeHandle, ChargeRequest};
use super::ids::{AttemptId, BillId, GroupKey, ParticipantId};
use crate::error::{ProcessorError, Result};
use async_trait::async_trait;

#[async_trait]
pub trait BillStore: Send + Sync {
    async fn store(&self, bill: Bill) -> Result<()>;
    async fn get(&self, bill_id: BillId) -> Result<Option<Bill>>;
    /// Removes the bill together with its participant shares.
    async fn delete(&self, bill_id: BillId) -> Result<()>;
    async fn all(&self) -> Result<Vec<Bill>>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Atomically admits and inserts a batch of new attempts.
    ///
    /// Fails with `AttemptInFlight` and writes nothing if any participant in
    /// the batch already has a `SCHEDULED`/`PROCESSING` attempt. The check and
    /// the inserts form one transaction.
    async fn reserve(&self, attempts: Vec<PaymentAttempt>) -> Result<()>;
    /// Applies `apply` to the stored row as one atomic read-modify-write.
    ///
    /// The row is written only when `apply` returns `Ok(true)`; an error or
    /// `Ok(false)` leaves it untouched. Returns the row as stored afterwards
    /// and whether it changed.
    async fn modify(&self, attempt_id: AttemptId, apply: AttemptUpdate) -> Result<(PaymentAttempt, bool)>;
    async fn get(&self, attempt_id: AttemptId) -> Result<Option<PaymentAttempt>>;
    async fn by_group(&self, group_key: GroupKey) -> Result<Vec<PaymentAttempt>>;
    async fn by_intent(&self, intent_id: &str) -> Result<Option<PaymentAttempt>>;
    async fn for_participant(&self, participant: &ParticipantId) -> Result<Vec<PaymentAttempt>>;
    async fn all(&self) -> Result<Vec<PaymentAttempt>>;
}

/// The external payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_charge(
        &self,
        request: ChargeRequest,
    ) -> std::result::Result<ChargeHandle, ProcessorError>;
    async fn cancel_charge(&self, intent_id: &str) -> std::result::Result<(), ProcessorError>;
}

/// A state transition run by [`AttemptStore::modify`] against the stored row.
pub type AttemptUpdate = Box<dyn FnOnce(&mut PaymentAttempt) -> Result<bool> + Send>;

pub type BillStoreBox = Box<dyn BillStore>;
pub type AttemptStoreBox = Box<dyn AttemptStore>;
pub type ProcessorBox = Box<dyn PaymentProcessor>;

pub type BillStoreFactory = Box<dyn Fn() -> BillStoreBox + Send + Sync>;
pub type AttemptStoreFactory = Box<dyn Fn() -> AttemptStoreBox + Send + Sync>;
