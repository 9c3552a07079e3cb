use super::ids::{BillId, MemberId, ParticipantId};
use super::money::Cents;
use super::split::{HUNDRED, MemberShare, SplitMode, SplitState};
use crate::error::{BillSplitError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    /// Open for payments.
    #[default]
    Active,
    /// Every included member other than the owner has paid.
    Settled,
    Canceled,
}

/// A household bill collected by `owner` and split across members.
///
/// The bill owns its participant shares: they live inside `split` and are
/// removed together with the bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    pub owner: MemberId,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    pub split: SplitState,
    /// Set when a custom split was persisted without balancing to 100%.
    #[serde(default)]
    pub needs_attention: bool,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    pub fn new(
        owner: MemberId,
        amount: Decimal,
        currency: impl Into<String>,
        due_date: NaiveDate,
        split: SplitState,
    ) -> Self {
        Self {
            id: BillId::new(),
            owner,
            amount,
            currency: currency.into(),
            due_date,
            status: BillStatus::Active,
            split,
            needs_attention: false,
            created_at: Utc::now(),
        }
    }

    pub fn participant_id(&self, member: &MemberId) -> ParticipantId {
        ParticipantId::new(self.id, member.clone())
    }

    pub fn share(&self, member: &MemberId) -> Option<&MemberShare> {
        self.split.share(member)
    }

    /// Members expected to pay the owner: included and not the owner.
    pub fn payers(&self) -> impl Iterator<Item = &MemberShare> {
        self.split
            .included()
            .filter(move |s| s.member_id != self.owner)
    }

    /// Amount owed by a share, in minor units.
    ///
    /// Excluded shares owe nothing.
    pub fn share_cents(&self, share: &MemberShare, scale: u32) -> Result<Cents> {
        if !share.included {
            return Ok(Cents::ZERO);
        }
        let amount = match self.split.mode {
            SplitMode::Percentage => self
                .amount
                .checked_mul(share.value)
                .map(|v| v / HUNDRED)
                .ok_or_else(|| {
                    BillSplitError::ValidationError(format!(
                        "Share of {} is out of range",
                        share.member_id
                    ))
                })?,
            SplitMode::Fixed => share.value,
        };
        Cents::from_decimal(amount, scale)
    }

    pub fn accepts_payments(&self) -> bool {
        self.status == BillStatus::Active
    }
}
