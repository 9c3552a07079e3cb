use crate::config::SettlementConfig;
use crate::domain::attempt::{AttemptStatus, FailureDetails, PaymentAttempt};
use crate::domain::bill::{Bill, BillStatus};
use crate::domain::charge::{ChargeMetadata, ChargeRequest};
use crate::domain::fee::FeeCalculator;
use crate::domain::ids::{AttemptId, BillId, GroupKey, MemberId, ParticipantId};
use crate::domain::money::Cents;
use crate::domain::ports::{AttemptStoreBox, BillStoreBox, ProcessorBox};
use crate::domain::transition;
use crate::error::{BillSplitError, ProcessorError, Result};
use std::collections::{BTreeSet, HashMap, HashSet};

/// What the caller needs to continue a payment on the client side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentStart {
    /// The attempts paid by this charge; the leader comes first.
    pub attempts: Vec<PaymentAttempt>,
    pub group_key: Option<GroupKey>,
    pub intent_id: String,
    pub client_secret: String,
    pub amount_cents: Cents,
    pub fee_cents: Cents,
    pub total_cents: Cents,
}

/// Turns participant shares into processor charges and keeps the attempt
/// ledger consistent with them.
///
/// Attempt rows are always written before the processor is contacted. All
/// admission checks run before any row is written, so a rejected request
/// leaves the ledger untouched; a processor failure leaves its rows behind
/// as `FAILED`.
pub struct SettlementCoordinator {
    bills: BillStoreBox,
    attempts: AttemptStoreBox,
    processor: ProcessorBox,
    fees: Box<dyn FeeCalculator>,
    config: SettlementConfig,
}

impl SettlementCoordinator {
    /// Creates a coordinator charging fees from `config.fee`.
    pub fn new(
        bills: BillStoreBox,
        attempts: AttemptStoreBox,
        processor: ProcessorBox,
        config: SettlementConfig,
    ) -> Self {
        Self {
            bills,
            attempts,
            processor,
            fees: Box::new(config.fee.clone()),
            config,
        }
    }

    /// Replaces the fee function, e.g. with a deterministic one in tests.
    pub fn with_fee_calculator(mut self, fees: impl FeeCalculator + 'static) -> Self {
        self.fees = Box::new(fees);
        self
    }

    /// Charges one participant's share, paid by the member it belongs to.
    pub async fn pay_now(&self, payer: &MemberId, participant: &ParticipantId) -> Result<PaymentStart> {
        let bill = self.load_bill(participant.bill).await?;
        let amount = self.admit_single(&bill, payer, participant)?;
        let fee = self.fees.fee(amount);
        amount.checked_add(fee)?;

        let attempt = PaymentAttempt::new(
            participant.clone(),
            payer.clone(),
            amount,
            fee,
            AttemptStatus::Processing,
        );
        self.attempts.reserve(vec![attempt.clone()]).await?;
        tracing::info!(
            attempt = %attempt.id,
            participant = %participant,
            amount = %amount,
            fee = %fee,
            "Reserved payment attempt"
        );

        self.charge(&bill, vec![attempt], None).await
    }

    /// Charges several shares owed to the same bill owner as one payment.
    ///
    /// The fee is computed once on the combined amount and booked on the
    /// first (leader) attempt; the other attempts carry no fee, so the
    /// attempts' totals add up to the single charge.
    pub async fn pay_now_group(
        &self,
        payer: &MemberId,
        participants: &[ParticipantId],
    ) -> Result<PaymentStart> {
        if participants.is_empty() {
            return Err(BillSplitError::ValidationError(
                "A group payment needs at least one participant".to_string(),
            ));
        }
        let unique: HashSet<&ParticipantId> = participants.iter().collect();
        if unique.len() != participants.len() {
            return Err(BillSplitError::ValidationError(
                "A participant appears more than once in the group".to_string(),
            ));
        }

        let mut bills: HashMap<BillId, Bill> = HashMap::new();
        for participant in participants {
            if !bills.contains_key(&participant.bill) {
                let bill = self.load_bill(participant.bill).await?;
                bills.insert(bill.id, bill);
            }
        }

        let owners: BTreeSet<&MemberId> = bills.values().map(|b| &b.owner).collect();
        if owners.len() > 1 {
            return Err(BillSplitError::MixedPayees);
        }
        let currencies: BTreeSet<&str> = bills.values().map(|b| b.currency.as_str()).collect();
        if currencies.len() > 1 {
            return Err(BillSplitError::ValidationError(
                "Group payment mixes currencies".to_string(),
            ));
        }

        let mut amounts = Vec::with_capacity(participants.len());
        for participant in participants {
            let bill = &bills[&participant.bill];
            if payer == &bill.owner {
                return Err(BillSplitError::OwnerCannotPay(payer.clone()));
            }
            amounts.push(self.share_amount(bill, participant)?);
        }

        let sum = Cents::checked_sum(amounts.iter().copied())?;
        let fee = self.fees.fee(sum);
        sum.checked_add(fee)?;
        let group_key = GroupKey::new();
        let attempts: Vec<PaymentAttempt> = participants
            .iter()
            .zip(amounts)
            .enumerate()
            .map(|(i, (participant, amount))| {
                let attempt_fee = if i == 0 { fee } else { Cents::ZERO };
                PaymentAttempt::new(
                    participant.clone(),
                    payer.clone(),
                    amount,
                    attempt_fee,
                    AttemptStatus::Processing,
                )
                .with_group(group_key)
            })
            .collect();

        self.attempts.reserve(attempts.clone()).await?;
        tracing::info!(
            group = %group_key,
            attempts = attempts.len(),
            amount = %sum,
            fee = %fee,
            "Reserved group payment attempts"
        );

        let bill = &bills[&participants[0].bill];
        self.charge(bill, attempts, Some(group_key)).await
    }

    /// Reserves a `SCHEDULED` attempt without contacting the processor.
    pub async fn schedule_payment(
        &self,
        payer: &MemberId,
        participant: &ParticipantId,
    ) -> Result<PaymentAttempt> {
        let bill = self.load_bill(participant.bill).await?;
        let amount = self.admit_single(&bill, payer, participant)?;
        let fee = self.fees.fee(amount);
        amount.checked_add(fee)?;
        let attempt = PaymentAttempt::new(
            participant.clone(),
            payer.clone(),
            amount,
            fee,
            AttemptStatus::Scheduled,
        );
        self.attempts.reserve(vec![attempt.clone()]).await?;
        tracing::info!(attempt = %attempt.id, participant = %participant, "Scheduled payment");
        Ok(attempt)
    }

    /// Starts the charge for a previously scheduled attempt.
    ///
    /// The attempt is claimed (`SCHEDULED -> PROCESSING`) in the store before
    /// the processor is contacted, so concurrent callers charge it only once.
    pub async fn execute_scheduled(&self, attempt_id: AttemptId) -> Result<PaymentStart> {
        let attempt = self.load_attempt(attempt_id).await?;
        let bill = self.load_bill(attempt.participant.bill).await?;
        if !bill.accepts_payments() {
            return Err(BillSplitError::ValidationError(format!(
                "Bill {} is not open for payment",
                bill.id
            )));
        }
        let (attempt, _) = self.attempts.modify(attempt_id, transition::claim()).await?;
        self.charge(&bill, vec![attempt], None).await
    }

    /// Cancels an in-flight attempt (and the rest of its group).
    ///
    /// The local rows become `CANCELED` whatever the processor answers.
    /// Cancelling an already canceled attempt is a no-op.
    pub async fn cancel_attempt(&self, attempt_id: AttemptId) -> Result<PaymentAttempt> {
        let attempt = self.load_attempt(attempt_id).await?;
        match attempt.status {
            AttemptStatus::Canceled => {
                tracing::debug!(attempt = %attempt_id, "Attempt already canceled");
                return Ok(attempt);
            }
            AttemptStatus::Succeeded | AttemptStatus::Failed => {
                return Err(BillSplitError::AttemptFinal(attempt_id));
            }
            AttemptStatus::Scheduled | AttemptStatus::Processing => {}
        }

        // Intents are read from the rows as finalized, so a charge recorded
        // while this cancel was running is still canceled at the processor.
        let mut canceled = None;
        let mut intents = BTreeSet::new();
        for sibling in self.siblings(&attempt).await? {
            let (stored, changed) = self
                .attempts
                .modify(sibling.id, transition::finalize(AttemptStatus::Canceled, None))
                .await?;
            if changed {
                intents.extend(stored.provider_intent_id.clone());
            }
            if stored.id == attempt_id {
                canceled = Some(stored);
            }
        }
        for intent_id in &intents {
            self.cancel_at_processor(intent_id).await;
        }

        let canceled = canceled.ok_or(BillSplitError::AttemptNotFound(attempt_id))?;
        if canceled.status != AttemptStatus::Canceled {
            // Finalized otherwise between the status check and the write.
            return Err(BillSplitError::AttemptFinal(attempt_id));
        }
        tracing::info!(attempt = %attempt_id, "Canceled payment attempt");
        Ok(canceled)
    }

    /// Applies a terminal status reported by the processor.
    ///
    /// Grouped attempts share one charge, so the status is applied to the
    /// whole group. Re-applying an update to terminal rows changes nothing.
    pub async fn mark_terminal(
        &self,
        attempt_id: AttemptId,
        status: AttemptStatus,
        failure: Option<FailureDetails>,
    ) -> Result<PaymentAttempt> {
        if !status.is_terminal() {
            return Err(BillSplitError::ValidationError(format!(
                "{} is not a terminal status",
                status
            )));
        }
        let attempt = self.load_attempt(attempt_id).await?;
        let siblings = self.siblings(&attempt).await?;

        let mut result = attempt.clone();
        let mut touched_bills = BTreeSet::new();
        for sibling in siblings {
            let (stored, changed) = self
                .attempts
                .modify(sibling.id, transition::finalize(status, failure.clone()))
                .await?;
            if changed {
                touched_bills.insert(stored.participant.bill);
            } else if stored.status != status {
                tracing::warn!(
                    attempt = %stored.id,
                    current = %stored.status,
                    requested = %status,
                    "Ignoring status update for final attempt"
                );
            }
            if stored.id == attempt_id {
                result = stored;
            }
        }

        if touched_bills.is_empty() {
            tracing::debug!(attempt = %attempt_id, "Terminal update already applied");
        } else {
            tracing::info!(attempt = %attempt_id, status = %status, "Attempt finalized");
        }
        if status == AttemptStatus::Succeeded {
            for bill_id in touched_bills {
                self.refresh_bill_status(bill_id).await?;
            }
        }
        Ok(result)
    }

    /// Webhook entry point: resolves the processor intent to its attempt.
    pub async fn reconcile_intent(
        &self,
        intent_id: &str,
        status: AttemptStatus,
        failure: Option<FailureDetails>,
    ) -> Result<PaymentAttempt> {
        let attempt = self.attempts.by_intent(intent_id).await?.ok_or_else(|| {
            BillSplitError::ValidationError(format!("Unknown processor intent {}", intent_id))
        })?;
        self.mark_terminal(attempt.id, status, failure).await
    }

    pub async fn attempt(&self, attempt_id: AttemptId) -> Result<PaymentAttempt> {
        self.load_attempt(attempt_id).await
    }

    pub async fn attempts_for(&self, participant: &ParticipantId) -> Result<Vec<PaymentAttempt>> {
        self.attempts.for_participant(participant).await
    }

    pub async fn ledger(&self) -> Result<Vec<PaymentAttempt>> {
        self.attempts.all().await
    }

    fn admit_single(&self, bill: &Bill, payer: &MemberId, participant: &ParticipantId) -> Result<Cents> {
        if payer == &bill.owner {
            return Err(BillSplitError::OwnerCannotPay(payer.clone()));
        }
        if &participant.member != payer {
            return Err(BillSplitError::NotShareOwner {
                payer: payer.clone(),
                participant: participant.clone(),
            });
        }
        self.share_amount(bill, participant)
    }

    /// Validates that a share can be charged and returns its amount.
    fn share_amount(&self, bill: &Bill, participant: &ParticipantId) -> Result<Cents> {
        if !bill.accepts_payments() {
            return Err(BillSplitError::ValidationError(format!(
                "Bill {} is not open for payment",
                bill.id
            )));
        }
        if participant.member == bill.owner {
            return Err(BillSplitError::OwnerCannotPay(bill.owner.clone()));
        }
        let share = bill
            .share(&participant.member)
            .ok_or_else(|| BillSplitError::ParticipantNotFound(participant.clone()))?;
        if !share.included {
            return Err(BillSplitError::ValidationError(format!(
                "{} is not included in the split",
                participant
            )));
        }
        let amount = bill.share_cents(share, self.config.minor_unit_scale)?;
        if !amount.is_positive() {
            return Err(BillSplitError::ValidationError(format!(
                "Share of {} must be positive, got {}",
                participant, amount
            )));
        }
        Ok(amount)
    }

    /// Requests one charge covering `attempts` and records the outcome.
    async fn charge(
        &self,
        bill: &Bill,
        attempts: Vec<PaymentAttempt>,
        group_key: Option<GroupKey>,
    ) -> Result<PaymentStart> {
        let leader = attempts[0].clone();
        let metadata = match group_key {
            Some(group_key) => ChargeMetadata::Group {
                group_key,
                leader_attempt_id: leader.id,
                member_attempt_ids: attempts.iter().map(|a| a.id).collect(),
            },
            None => ChargeMetadata::Single {
                attempt_id: leader.id,
            },
        };
        let amount_cents = Cents::checked_sum(attempts.iter().map(|a| a.amount_cents))?;
        let fee_cents = Cents::checked_sum(attempts.iter().map(|a| a.fee_cents))?;
        let total_cents = Cents::checked_sum(attempts.iter().map(|a| a.total_cents))?;
        let request = ChargeRequest {
            amount: total_cents,
            currency: bill.currency.clone(),
            customer_ref: leader.payer.clone(),
            metadata,
        };

        let handle = match self.processor.create_charge(request).await {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(
                    attempt = %leader.id,
                    code = err.code(),
                    "Processor rejected charge: {}",
                    err
                );
                self.fail_attempts(&attempts, &err).await?;
                return Err(err.into());
            }
        };

        let written = self
            .attempts
            .modify(leader.id, transition::record_intent(handle.intent_id.clone()))
            .await;
        let current = match written {
            Ok((current, _)) => current,
            Err(BillSplitError::AttemptFinal(id)) => {
                tracing::warn!(
                    attempt = %id,
                    intent = %handle.intent_id,
                    "Attempt finalized while the charge was being created"
                );
                self.cancel_at_processor(&handle.intent_id).await;
                return Err(BillSplitError::AttemptFinal(id));
            }
            Err(err) => return Err(err),
        };
        tracing::info!(attempt = %leader.id, intent = %handle.intent_id, "Charge created");

        let mut recorded = attempts;
        recorded[0] = current;
        Ok(PaymentStart {
            attempts: recorded,
            group_key,
            intent_id: handle.intent_id,
            client_secret: handle.client_secret,
            amount_cents,
            fee_cents,
            total_cents,
        })
    }

    async fn fail_attempts(&self, attempts: &[PaymentAttempt], err: &ProcessorError) -> Result<()> {
        let details = FailureDetails::from(err);
        for attempt in attempts {
            self.attempts
                .modify(
                    attempt.id,
                    transition::finalize(AttemptStatus::Failed, Some(details.clone())),
                )
                .await?;
        }
        Ok(())
    }

    async fn cancel_at_processor(&self, intent_id: &str) {
        match self.processor.cancel_charge(intent_id).await {
            Ok(()) => {}
            Err(ProcessorError::AlreadyFinal) => {
                tracing::debug!(intent = intent_id, "Charge already final at processor");
            }
            Err(err) => {
                tracing::warn!(intent = intent_id, "Processor cancel failed: {}", err);
            }
        }
    }

    async fn siblings(&self, attempt: &PaymentAttempt) -> Result<Vec<PaymentAttempt>> {
        match attempt.group_key {
            Some(key) => self.attempts.by_group(key).await,
            None => Ok(vec![attempt.clone()]),
        }
    }

    /// Marks a bill settled once every member who owes money has paid.
    async fn refresh_bill_status(&self, bill_id: BillId) -> Result<()> {
        let Some(mut bill) = self.bills.get(bill_id).await? else {
            return Ok(());
        };
        if bill.status != BillStatus::Active {
            return Ok(());
        }
        for share in bill.payers() {
            if !bill.share_cents(share, self.config.minor_unit_scale)?.is_positive() {
                continue;
            }
            let participant = bill.participant_id(&share.member_id);
            let paid = self
                .attempts
                .for_participant(&participant)
                .await?
                .iter()
                .any(|a| a.status == AttemptStatus::Succeeded);
            if !paid {
                return Ok(());
            }
        }
        bill.status = BillStatus::Settled;
        tracing::info!(bill = %bill_id, "Bill settled");
        self.bills.store(bill).await
    }

    async fn load_bill(&self, bill_id: BillId) -> Result<Bill> {
        self.bills
            .get(bill_id)
            .await?
            .ok_or(BillSplitError::BillNotFound(bill_id))
    }

    async fn load_attempt(&self, attempt_id: AttemptId) -> Result<PaymentAttempt> {
        self.attempts
            .get(attempt_id)
            .await?
            .ok_or(BillSplitError::AttemptNotFound(attempt_id))
    }
}
