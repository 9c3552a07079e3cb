use super::ids::{AttemptId, GroupKey, MemberId};
use super::money::Cents;
use serde::{Deserialize, Serialize};

/// Metadata attached to a processor charge so that webhooks can find the
/// attempt rows it pays for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChargeMetadata {
    Single {
        attempt_id: AttemptId,
    },
    Group {
        group_key: GroupKey,
        leader_attempt_id: AttemptId,
        member_attempt_ids: Vec<AttemptId>,
    },
}

impl ChargeMetadata {
    pub fn attempt_ids(&self) -> Vec<AttemptId> {
        match self {
            Self::Single { attempt_id } => vec![*attempt_id],
            Self::Group {
                member_attempt_ids, ..
            } => member_attempt_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: Cents,
    pub currency: String,
    /// Processor-side customer reference of the payer.
    pub customer_ref: MemberId,
    pub metadata: ChargeMetadata,
}

/// What the processor returns for an accepted charge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeHandle {
    pub intent_id: String,
    /// Token the client uses to continue (confirm) the payment.
    pub client_secret: String,
}
