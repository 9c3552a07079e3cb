use crate::domain::attempt::PaymentAttempt;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AttemptRecord {
    attempt_id: String,
    participant: String,
    payer: String,
    amount_cents: i64,
    fee_cents: i64,
    total_cents: i64,
    status: String,
    provider_intent_id: Option<String>,
    group_key: Option<String>,
    failure_code: Option<String>,
}

impl From<&PaymentAttempt> for AttemptRecord {
    fn from(attempt: &PaymentAttempt) -> Self {
        Self {
            attempt_id: attempt.id.to_string(),
            participant: attempt.participant.member.to_string(),
            payer: attempt.payer.to_string(),
            amount_cents: attempt.amount_cents.value(),
            fee_cents: attempt.fee_cents.value(),
            total_cents: attempt.total_cents.value(),
            status: attempt.status.to_string(),
            provider_intent_id: attempt.provider_intent_id.clone(),
            group_key: attempt.group_key.map(|k| k.to_string()),
            failure_code: attempt.failure_code.clone(),
        }
    }
}

/// Writes the attempt ledger as CSV.
pub struct AttemptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AttemptWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_attempts(&mut self, attempts: &[PaymentAttempt]) -> Result<()> {
        for attempt in attempts {
            self.writer.serialize(AttemptRecord::from(attempt))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
