use crate::domain::attempt::PaymentAttempt;
use crate::domain::bill::Bill;
use crate::domain::ids::{AttemptId, BillId, GroupKey, ParticipantId};
use crate::domain::ports::{AttemptStore, AttemptUpdate, BillStore};
use crate::error::{BillSplitError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for bills (shares are embedded in the bill row).
pub const CF_BILLS: &str = "bills";
/// Column Family for payment attempts.
pub const CF_ATTEMPTS: &str = "attempts";
/// Column Family indexing the single in-flight attempt of each participant.
pub const CF_IN_FLIGHT: &str = "in_flight";

/// A persistent store implementation using RocksDB.
///
/// The `in_flight` column family acts as a unique constraint: a participant
/// key is present exactly while that participant has a `SCHEDULED` or
/// `PROCESSING` attempt. Admission and index maintenance are serialized by a
/// writer lock and committed with one `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_BILLS, CF_ATTEMPTS, CF_IN_FLIGHT]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            BillSplitError::InternalError(Box::new(std::io::Error::other(format!(
                "Column family {} not found",
                name
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    fn scan_attempts(&self, filter: impl Fn(&PaymentAttempt) -> bool) -> Result<Vec<PaymentAttempt>> {
        let mut attempts: Vec<PaymentAttempt> = self
            .scan::<PaymentAttempt>(CF_ATTEMPTS)?
            .into_iter()
            .filter(|a| filter(a))
            .collect();
        attempts.sort_by_key(|a| (a.created_at, a.id));
        Ok(attempts)
    }
}

fn participant_key(participant: &ParticipantId) -> Vec<u8> {
    participant.to_string().into_bytes()
}

#[async_trait]
impl BillStore for RocksDBStore {
    async fn store(&self, bill: Bill) -> Result<()> {
        let cf = self.cf(CF_BILLS)?;
        let value = serde_json::to_vec(&bill)?;
        self.db.put_cf(cf, bill.id.as_uuid().as_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, bill_id: BillId) -> Result<Option<Bill>> {
        self.get_json(CF_BILLS, bill_id.as_uuid().as_bytes())
    }

    async fn delete(&self, bill_id: BillId) -> Result<()> {
        let cf = self.cf(CF_BILLS)?;
        self.db.delete_cf(cf, bill_id.as_uuid().as_bytes())?;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Bill>> {
        let mut bills: Vec<Bill> = self.scan(CF_BILLS)?;
        bills.sort_by_key(|b| b.created_at);
        Ok(bills)
    }
}

#[async_trait]
impl AttemptStore for RocksDBStore {
    async fn reserve(&self, attempts: Vec<PaymentAttempt>) -> Result<()> {
        let _guard = self.writer.lock().await;
        let attempts_cf = self.cf(CF_ATTEMPTS)?;
        let in_flight_cf = self.cf(CF_IN_FLIGHT)?;

        for attempt in &attempts {
            let key = participant_key(&attempt.participant);
            if self.db.get_pinned_cf(in_flight_cf, &key)?.is_some() {
                return Err(BillSplitError::AttemptInFlight(attempt.participant.clone()));
            }
        }

        let mut batch = WriteBatch::default();
        for attempt in &attempts {
            let id = attempt.id.as_uuid();
            batch.put_cf(attempts_cf, id.as_bytes(), serde_json::to_vec(attempt)?);
            if attempt.status.is_in_flight() {
                batch.put_cf(in_flight_cf, participant_key(&attempt.participant), id.as_bytes());
            }
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn modify(&self, attempt_id: AttemptId, apply: AttemptUpdate) -> Result<(PaymentAttempt, bool)> {
        let _guard = self.writer.lock().await;
        let attempts_cf = self.cf(CF_ATTEMPTS)?;
        let in_flight_cf = self.cf(CF_IN_FLIGHT)?;
        let id = attempt_id.as_uuid();

        let stored: PaymentAttempt = self
            .get_json(CF_ATTEMPTS, id.as_bytes())?
            .ok_or(BillSplitError::AttemptNotFound(attempt_id))?;
        let mut next = stored.clone();
        if !apply(&mut next)? {
            return Ok((stored, false));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(attempts_cf, id.as_bytes(), serde_json::to_vec(&next)?);
        if next.status.is_terminal() {
            let key = participant_key(&next.participant);
            let holder = self.db.get_pinned_cf(in_flight_cf, &key)?;
            if holder.as_deref() == Some(id.as_bytes().as_slice()) {
                batch.delete_cf(in_flight_cf, key);
            }
        }
        self.db.write(batch)?;
        Ok((next, true))
    }

    async fn get(&self, attempt_id: AttemptId) -> Result<Option<PaymentAttempt>> {
        self.get_json(CF_ATTEMPTS, attempt_id.as_uuid().as_bytes())
    }

    async fn by_group(&self, group_key: GroupKey) -> Result<Vec<PaymentAttempt>> {
        self.scan_attempts(|a| a.group_key == Some(group_key))
    }

    async fn by_intent(&self, intent_id: &str) -> Result<Option<PaymentAttempt>> {
        Ok(self
            .scan_attempts(|a| a.provider_intent_id.as_deref() == Some(intent_id))?
            .into_iter()
            .next())
    }

    async fn for_participant(&self, participant: &ParticipantId) -> Result<Vec<PaymentAttempt>> {
        self.scan_attempts(|a| &a.participant == participant)
    }

    async fn all(&self) -> Result<Vec<PaymentAttempt>> {
        self.scan_attempts(|_| true)
    }
}
