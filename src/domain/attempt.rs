use super::ids::{AttemptId, GroupKey, MemberId, ParticipantId};
use super::money::Cents;
use crate::error::{BillSplitError, ProcessorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a payment attempt.
///
/// `Scheduled`/`Processing` are in flight; the other three are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Scheduled,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scheduled => "SCHEDULED",
            Self::Processing => "PROCESSING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// Diagnostic detail captured when an attempt fails.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FailureDetails {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl FailureDetails {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: Some(message.into()),
        }
    }
}

impl From<&ProcessorError> for FailureDetails {
    fn from(err: &ProcessorError) -> Self {
        Self::new(err.code(), err.message())
    }
}

/// One outbound charge against one participant's share.
///
/// `amount_cents` is the share alone; the fee is tracked separately so that
/// a group charge can put its whole fee on a single leader row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub id: AttemptId,
    pub participant: ParticipantId,
    pub payer: MemberId,
    pub amount_cents: Cents,
    pub fee_cents: Cents,
    pub total_cents: Cents,
    pub status: AttemptStatus,
    pub provider_intent_id: Option<String>,
    pub group_key: Option<GroupKey>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentAttempt {
    pub fn new(
        participant: ParticipantId,
        payer: MemberId,
        amount_cents: Cents,
        fee_cents: Cents,
        status: AttemptStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AttemptId::new(),
            participant,
            payer,
            amount_cents,
            fee_cents,
            total_cents: amount_cents.saturating_add(fee_cents),
            status,
            provider_intent_id: None,
            group_key: None,
            failure_code: None,
            failure_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_group(mut self, key: GroupKey) -> Self {
        self.group_key = Some(key);
        self
    }

    /// `Scheduled -> Processing`. Any other starting state is rejected.
    pub fn begin_processing(&mut self) -> Result<()> {
        match self.status {
            AttemptStatus::Scheduled => {
                self.status = AttemptStatus::Processing;
                self.updated_at = Utc::now();
                Ok(())
            }
            AttemptStatus::Processing => Err(BillSplitError::AttemptInFlight(self.participant.clone())),
            _ => Err(BillSplitError::AttemptFinal(self.id)),
        }
    }

    /// Attaches the processor intent created for this attempt.
    pub fn record_intent(&mut self, intent_id: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(BillSplitError::AttemptFinal(self.id));
        }
        self.provider_intent_id = Some(intent_id.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves the attempt into a terminal state.
    ///
    /// Returns `false` without touching the row if it is already terminal.
    pub fn finalize(&mut self, status: AttemptStatus, failure: Option<FailureDetails>) -> bool {
        debug_assert!(status.is_terminal());
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        if let Some(details) = failure {
            self.failure_code = details.code;
            self.failure_message = details.message;
        }
        self.updated_at = Utc::now();
        true
    }
}
