//! Row transitions applied through [`AttemptStore::modify`].
//!
//! Each one re-checks the attempt's current status against the stored row,
//! so a stale read can never move a final attempt back in flight.
//!
//! [`AttemptStore::modify`]: super::ports::AttemptStore::modify

use super::attempt::{AttemptStatus, FailureDetails, PaymentAttempt};
use super::ports::AttemptUpdate;
use crate::error::Result;

/// `SCHEDULED -> PROCESSING`; fails if the attempt is no longer scheduled.
pub fn claim() -> AttemptUpdate {
    Box::new(|attempt: &mut PaymentAttempt| -> Result<bool> {
        attempt.begin_processing()?;
        Ok(true)
    })
}

/// Moves the attempt to `status`; a no-op if it is already final.
pub fn finalize(status: AttemptStatus, failure: Option<FailureDetails>) -> AttemptUpdate {
    Box::new(move |attempt: &mut PaymentAttempt| -> Result<bool> {
        Ok(attempt.finalize(status, failure))
    })
}

/// Stores the processor intent; fails if the attempt became final meanwhile.
pub fn record_intent(intent_id: String) -> AttemptUpdate {
    Box::new(move |attempt: &mut PaymentAttempt| -> Result<bool> {
        attempt.record_intent(intent_id)?;
        Ok(true)
    })
}
