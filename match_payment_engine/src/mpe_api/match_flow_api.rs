use std::fmt::Debug;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use log::*;
use mp_common::Money;

use crate::{
    db_types::{MatchId, MatchPaymentState, MatchStage, NewMatch, Refund, StageChange, StageLogEntry, UserId},
    events::{EventProducers, MatchConfirmedEvent, PaymentRecordedEvent, QuorumLostEvent, StageChangedEvent},
    flow::{self, ConfirmOutcome, HardLockOutcome, JoinOutcome},
    helpers::{new_idempotency_key, to_millis, Clock, RetryPolicy},
    mpe_api::{
        errors::MatchFlowError,
        flow_objects::{CancelResult, ConfirmResult, ExpiryOutcome},
        MatchLocks,
    },
    reminders::{
        cancelled_notice,
        confirmed_notice,
        evicted_notice,
        quorum_lost_notice,
        window_opened_notice,
        DeadlineHandler,
        NotificationMessage,
        ReminderPlan,
        Urgency,
    },
    traits::{
        ChargeRequest,
        MatchBackend,
        MatchStore,
        NotificationDelivery,
        PaymentCapture,
        RefundRequest,
        ReminderChange,
        StoreError,
        TopUpRequest,
        TransitionCommit,
    },
};

/// The result of applying an event to a freshly loaded match.
enum Step<T> {
    Write { commit: TransitionCommit, output: T },
    /// Money goes back out before the commit, while the match lock is still held.
    Settle { commit: TransitionCommit, output: T, payouts: Vec<Payout> },
    Skip { state: MatchPaymentState, output: T },
}

enum Payout {
    Refund(RefundRequest),
    TopUp(TopUpRequest),
}

impl Payout {
    fn user_id(&self) -> &UserId {
        match self {
            Payout::Refund(r) => &r.user_id,
            Payout::TopUp(r) => &r.user_id,
        }
    }

    fn amount(&self) -> Money {
        match self {
            Payout::Refund(r) => r.amount,
            Payout::TopUp(r) => r.amount,
        }
    }
}

/// `MatchFlowApi` is the match payment lifecycle state machine.
///
/// Every mutation follows the same pattern: take the per-match lock, load the match, apply a pure engine function,
/// and commit the result with a versioned write together with any stage log and reminder changes. Version conflicts
/// and database hiccups are retried with backoff.
///
/// Charges are taken outside the lock and reversed if the write that records them is rejected. Refunds and top-up
/// requests are issued under the lock, immediately before the write that records them, with keys derived from the
/// match, the user and the payment window. A retried settlement therefore repeats the same requests, and no other
/// transition can land between planning a settlement and committing it.
pub struct MatchFlowApi<B, N, P> {
    db: B,
    notifier: N,
    capture: P,
    producers: EventProducers,
    locks: MatchLocks,
    retry: RetryPolicy,
    clock: Clock,
}

impl<B: Clone, N: Clone, P: Clone> Clone for MatchFlowApi<B, N, P> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            notifier: self.notifier.clone(),
            capture: self.capture.clone(),
            producers: self.producers.clone(),
            locks: self.locks.clone(),
            retry: self.retry,
            clock: self.clock.clone(),
        }
    }
}

impl<B, N, P> Debug for MatchFlowApi<B, N, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchFlowApi")
    }
}

impl<B, N, P> MatchFlowApi<B, N, P> {
    pub fn new(db: B, notifier: N, capture: P, producers: EventProducers) -> Self {
        Self {
            db,
            notifier,
            capture,
            producers,
            locks: MatchLocks::default(),
            retry: RetryPolicy::default(),
            clock: Clock::System,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn capture(&self) -> &P {
        &self.capture
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}

impl<B, N, P> MatchFlowApi<B, N, P>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    /// Registers a new match in free-joining with no participants.
    pub async fn create_match(&self, new: NewMatch) -> Result<MatchPaymentState, MatchFlowError> {
        let state = flow::new_match(new, self.clock.now())?;
        let state = self.db.insert_match(&state).await?;
        info!(
            "🔄️ Match {} created by {}. {}-{} players, total cost {}",
            state.match_id, state.organizer_id, state.min_players, state.max_players, state.total_cost
        );
        Ok(state)
    }

    pub async fn fetch_match(&self, match_id: &MatchId) -> Result<MatchPaymentState, MatchFlowError> {
        self.retry.run("fetch match", MatchFlowError::is_retryable, move || self.load(match_id)).await
    }

    pub async fn fetch_stage_log(&self, match_id: &MatchId) -> Result<Vec<StageLogEntry>, MatchFlowError> {
        Ok(self.db.fetch_stage_log(match_id).await?)
    }

    /// Adds a participant.
    ///
    /// If this join brings the match to its minimum headcount, the match is soft-locked, the payment window opens
    /// immediately and every participant gets a reminder campaign for the window deadline, all in the same write.
    /// A participant joining while the window is already open gets their own campaign.
    pub async fn on_participant_join(
        &self,
        match_id: &MatchId,
        user_id: UserId,
    ) -> Result<MatchPaymentState, MatchFlowError> {
        let (state, window_opened) = self
            .transition(match_id, "join", |state, now| {
                let expected = state.version;
                let JoinOutcome { state, quorum_reached } = flow::evaluate_join(state, user_id.clone(), now)?;
                if quorum_reached {
                    let state = flow::enter_soft_lock(state, now)?;
                    let state = flow::open_payment_window(state, now)?;
                    let reminders = arm_all(&state, now);
                    let commit = TransitionCommit::new(state, expected)
                        .with_stage_change(StageChange::new(
                            MatchStage::FreeJoining,
                            MatchStage::SoftLock,
                            "minimum players reached",
                        ))
                        .with_stage_change(StageChange::new(
                            MatchStage::SoftLock,
                            MatchStage::PaymentWindow,
                            "payment window opened",
                        ))
                        .with_reminders(reminders);
                    return Ok(Step::Write { commit, output: true });
                }
                let mut commit = TransitionCommit::new(state, expected);
                let owes = commit.state.participant(&user_id).map(|p| !p.is_paid).unwrap_or(false);
                let window_end = commit.state.payment_window_end.filter(|_| commit.state.stage.accepts_payments());
                if let Some(deadline) = window_end.filter(|_| owes) {
                    let reminder = ReminderPlan::create(match_id, &user_id, deadline, now);
                    commit = commit.with_reminder(ReminderChange::Arm(reminder));
                }
                Ok(Step::Write { commit, output: false })
            })
            .await?;
        debug!("🔄️ {user_id} joined {match_id}. {} players now", state.current_player_count);
        if window_opened {
            info!(
                "🔄️ {match_id} reached quorum. Payment window open until {:?}, {} per player",
                state.payment_window_end, state.cost_per_player
            );
            self.announce_window(&state, &state.user_ids()).await;
        } else if state.stage.accepts_payments() {
            self.announce_window(&state, std::slice::from_ref(&user_id)).await;
        }
        Ok(state)
    }

    /// Removes an unpaid participant and cancels their reminders. The match stays open if this drops it below quorum
    /// during the payment window.
    pub async fn on_participant_leave(
        &self,
        match_id: &MatchId,
        user_id: &UserId,
    ) -> Result<MatchPaymentState, MatchFlowError> {
        let (state, _) = self
            .transition(match_id, "leave", |state, now| {
                let expected = state.version;
                let state = flow::remove_participant(state, user_id, now)?;
                let commit = TransitionCommit::new(state, expected)
                    .with_reminder(ReminderChange::CancelParticipant(user_id.clone()));
                Ok(Step::Write { commit, output: () })
            })
            .await?;
        if state.stage.accepts_payments() && !state.has_quorum() {
            info!(
                "🔄️ {user_id} left {match_id} during the payment window. {} of {} required players remain",
                state.current_player_count, state.min_players
            );
        } else {
            debug!("🔄️ {user_id} left {match_id}");
        }
        Ok(state)
    }

    /// Takes a payment from a participant. See [`Self::on_payment_received_with_key`].
    pub async fn on_payment_received(
        &self,
        match_id: &MatchId,
        user_id: &UserId,
        amount: Money,
    ) -> Result<MatchPaymentState, MatchFlowError> {
        self.on_payment_received_with_key(match_id, user_id, amount, None).await
    }

    /// Takes a payment from a participant.
    ///
    /// The payment is validated against a snapshot, charged through the capture collaborator without holding the
    /// match lock, and then applied with a versioned write. If the write is rejected after the charge succeeded (for
    /// example because the window closed in the meantime) the charge is refunded and the rejection is returned.
    ///
    /// Callers that may retry should supply an `idempotency_key` so that a repeated request is not charged twice.
    pub async fn on_payment_received_with_key(
        &self,
        match_id: &MatchId,
        user_id: &UserId,
        amount: Money,
        idempotency_key: Option<String>,
    ) -> Result<MatchPaymentState, MatchFlowError> {
        let snapshot = self.fetch_match(match_id).await?;
        flow::record_payment(snapshot, user_id, amount, None, self.clock.now())?;
        let request = ChargeRequest {
            match_id: match_id.clone(),
            user_id: user_id.clone(),
            amount,
            idempotency_key: idempotency_key.unwrap_or_else(|| new_idempotency_key("charge")),
        };
        let transaction_ref = self.capture.charge(request).await.map_err(|e| {
            error!("🔄️ Charging {user_id} {amount} for {match_id} failed. {e}");
            MatchFlowError::from(e)
        })?;
        debug!("🔄️ Charged {user_id} {amount} for {match_id}. Ref {transaction_ref}");

        let applied = self
            .transition(match_id, "record payment", |state, now| {
                let expected = state.version;
                let state = flow::record_payment(state, user_id, amount, Some(transaction_ref.clone()), now)?;
                let settled = state.participant(user_id).map(|p| p.is_paid).unwrap_or(false);
                let mut commit = TransitionCommit::new(state, expected);
                if settled {
                    commit = commit.with_reminder(ReminderChange::CancelParticipant(user_id.clone()));
                }
                Ok(Step::Write { commit, output: settled })
            })
            .await;

        match applied {
            Ok((state, settled)) => {
                info!("🔄️ Payment of {amount} from {user_id} recorded for {match_id}. Settled: {settled}");
                let event = PaymentRecordedEvent {
                    match_id: match_id.clone(),
                    user_id: user_id.clone(),
                    amount,
                    transaction_ref,
                    settled,
                };
                self.producers.payment_recorded(event).await;
                Ok(state)
            },
            Err(cause) => {
                warn!("🔄️ Payment {transaction_ref} from {user_id} could not be applied to {match_id}: {cause}. Reversing it.");
                self.reverse_charge(match_id, user_id, amount, transaction_ref, cause).await
            },
        }
    }

    async fn reverse_charge(
        &self,
        match_id: &MatchId,
        user_id: &UserId,
        amount: Money,
        transaction_ref: String,
        cause: MatchFlowError,
    ) -> Result<MatchPaymentState, MatchFlowError> {
        let request = RefundRequest {
            match_id: match_id.clone(),
            user_id: user_id.clone(),
            amount,
            idempotency_key: format!("reverse:{transaction_ref}"),
            original_ref: Some(transaction_ref.clone()),
        };
        match self.capture.refund(request).await {
            Ok(refund_ref) => {
                info!("🔄️ Payment {transaction_ref} reversed with {refund_ref}");
                Err(cause)
            },
            Err(e) => {
                error!("🔄️ Could not reverse payment {transaction_ref} for {user_id} in {match_id}. {e}");
                Err(MatchFlowError::CompensationFailed {
                    match_id: match_id.clone(),
                    transaction_ref,
                    reason: format!("{cause}. Refund failed: {e}"),
                })
            },
        }
    }

    /// Closes the payment window.
    ///
    /// Non-payers are evicted. If enough paying players remain the match is hard-locked. Otherwise everyone who paid
    /// is refunded first and the match is then reset to free joining with no participants. Either way, every
    /// reminder campaign for the match is cancelled in the same write.
    ///
    /// Duplicate or stale calls (the window was already closed, or the match has moved on) are no-ops.
    pub async fn on_window_expired(&self, match_id: &MatchId) -> Result<ExpiryOutcome, MatchFlowError> {
        let (state, outcome) = self
            .transition(match_id, "close window", |state, now| {
                if !state.stage.accepts_payments() {
                    trace!("🔄️ Window expiry for {match_id} ignored. The match is in {}", state.stage);
                    return Ok(Step::Skip { state, output: None });
                }
                let from = state.stage;
                let expected = state.version;
                let window_start = state.payment_window_start;
                let outcome = flow::enter_hard_lock(state, now)?;
                let commit = match &outcome {
                    HardLockOutcome::AlreadyLocked(state) => {
                        return Ok(Step::Skip { state: state.clone(), output: None });
                    },
                    HardLockOutcome::Locked { state, .. } => TransitionCommit::new(state.clone(), expected)
                        .with_stage_change(StageChange::new(from, MatchStage::HardLock, "payment window closed")),
                    HardLockOutcome::QuorumLost { state, .. } => TransitionCommit::new(state.clone(), expected)
                        .with_stage_change(StageChange::new(from, MatchStage::HardLock, "payment window closed"))
                        .with_stage_change(StageChange::new(
                            MatchStage::HardLock,
                            MatchStage::FreeJoining,
                            "not enough paying players",
                        )),
                };
                let payouts = refund_payouts(match_id, outcome.refunds(), window_start);
                let commit = commit.with_reminder(ReminderChange::CancelAll);
                Ok(Step::Settle { commit, output: Some(outcome), payouts })
            })
            .await?;

        let result = match outcome {
            None => ExpiryOutcome::Unchanged { state },
            Some(HardLockOutcome::Locked { evicted, refunds, .. }) => {
                info!(
                    "🔄️ {match_id} hard-locked with {} players. {} evicted",
                    state.current_player_count,
                    evicted.len()
                );
                self.broadcast(&evicted, &evicted_notice(match_id), Urgency::Notice).await;
                ExpiryOutcome::Locked { state, evicted, refunds }
            },
            Some(HardLockOutcome::QuorumLost { evicted, refunds, .. }) => {
                info!(
                    "🔄️ {match_id} lost quorum when its window closed. {} refunds issued, match restarted",
                    refunds.len()
                );
                let mut former = evicted.clone();
                former.extend(refunds.iter().map(|r| r.user_id.clone()));
                former.sort();
                former.dedup();
                self.broadcast(&former, &quorum_lost_notice(match_id), Urgency::Notice).await;
                let event = QuorumLostEvent::new(match_id.clone(), evicted.clone(), refunds.clone());
                self.producers.quorum_lost(event).await;
                ExpiryOutcome::QuorumLost { state, evicted, refunds }
            },
            Some(HardLockOutcome::AlreadyLocked(_)) => ExpiryOutcome::Unchanged { state },
        };
        Ok(result)
    }

    /// Settles the final team. Overpayments are refunded and shortfalls are requested as top-ups before the match is
    /// marked confirmed.
    pub async fn on_confirm(&self, match_id: &MatchId) -> Result<ConfirmResult, MatchFlowError> {
        let (state, adjustments) = self
            .transition(match_id, "confirm", |state, now| {
                let expected = state.version;
                let window_start = state.payment_window_start;
                let ConfirmOutcome { state, adjustments } = flow::confirm_final_team(state, now)?;
                let payouts = adjustments
                    .iter()
                    .map(|adj| {
                        let idempotency_key = settlement_key("adjust", match_id, &adj.user_id, window_start);
                        if adj.is_refund() {
                            Payout::Refund(RefundRequest {
                                match_id: match_id.clone(),
                                user_id: adj.user_id.clone(),
                                amount: adj.amount,
                                original_ref: adj.transaction_ref.clone(),
                                idempotency_key,
                            })
                        } else {
                            Payout::TopUp(TopUpRequest {
                                match_id: match_id.clone(),
                                user_id: adj.user_id.clone(),
                                amount: adj.amount.abs(),
                                idempotency_key,
                            })
                        }
                    })
                    .collect();
                let commit = TransitionCommit::new(state, expected)
                    .with_stage_change(StageChange::new(MatchStage::HardLock, MatchStage::Confirmed, "organizer confirmed"))
                    .with_reminder(ReminderChange::CancelAll);
                Ok(Step::Settle { commit, output: adjustments, payouts })
            })
            .await?;
        info!(
            "🔄️ {match_id} confirmed with {} players at {} each. {} adjustment(s)",
            state.current_player_count,
            state.cost_per_player,
            adjustments.len()
        );
        self.broadcast(&state.user_ids(), &confirmed_notice(match_id, state.cost_per_player), Urgency::Notice).await;
        let event = MatchConfirmedEvent { state: state.clone(), adjustments: adjustments.clone() };
        self.producers.match_confirmed(event).await;
        Ok(ConfirmResult { state, adjustments })
    }

    /// Calls the match off. Everyone who paid anything is refunded in full before the cancellation is recorded.
    pub async fn on_organizer_cancel(&self, match_id: &MatchId, reason: &str) -> Result<CancelResult, MatchFlowError> {
        let (state, refunds) = self
            .transition(match_id, "cancel", |state, now| {
                let expected = state.version;
                let from = state.stage;
                let window_start = state.payment_window_start;
                let outcome = flow::cancel(state, reason, now)?;
                let payouts = refund_payouts(match_id, &outcome.refunds, window_start);
                let commit = TransitionCommit::new(outcome.state, expected)
                    .with_stage_change(StageChange::new(from, MatchStage::Cancelled, reason))
                    .with_reminder(ReminderChange::CancelAll);
                Ok(Step::Settle { commit, output: outcome.refunds, payouts })
            })
            .await?;
        info!("🔄️ {match_id} cancelled ({reason}). {} refund(s) issued", refunds.len());
        self.broadcast(&state.user_ids(), &cancelled_notice(match_id, reason), Urgency::Notice).await;
        Ok(CancelResult { state, refunds })
    }

    /// Closes every payment window that has expired. This backstops the deadline reminders, which stop firing once
    /// every participant has paid.
    pub async fn expire_due_windows(&self) -> Result<Vec<ExpiryOutcome>, MatchFlowError> {
        let due = self.db.fetch_expired_windows(self.clock.now()).await?;
        let mut results = Vec::with_capacity(due.len());
        for match_id in due {
            match self.on_window_expired(&match_id).await {
                Ok(outcome) => results.push(outcome),
                Err(e) => warn!("🔄️ Could not close the payment window for {match_id}. It will be retried. {e}"),
            }
        }
        Ok(results)
    }

    //--------------------------------------   internals   ------------------------------------------------------------

    async fn load(&self, match_id: &MatchId) -> Result<MatchPaymentState, MatchFlowError> {
        self.db.fetch_match(match_id).await?.ok_or_else(|| StoreError::MatchNotFound(match_id.clone()).into())
    }

    /// Lock, load, apply, settle, commit. Retried on transient store errors.
    async fn transition<T, F>(
        &self,
        match_id: &MatchId,
        label: &str,
        apply: F,
    ) -> Result<(MatchPaymentState, T), MatchFlowError>
    where
        F: Fn(MatchPaymentState, DateTime<Utc>) -> Result<Step<T>, MatchFlowError>,
    {
        let apply = &apply;
        let (state, output, changes) = self
            .retry
            .run(label, MatchFlowError::is_retryable, move || async move {
                let _guard = self.locks.lock(match_id).await;
                let state = self.load(match_id).await?;
                match apply(state, self.clock.now())? {
                    Step::Skip { state, output } => Ok((state, output, Vec::new())),
                    Step::Write { commit, output } => {
                        let changes = commit.stage_changes.clone();
                        let state = self.db.commit_transition(commit).await?;
                        Ok((state, output, changes))
                    },
                    Step::Settle { commit, output, payouts } => {
                        self.pay_out(match_id, payouts).await?;
                        let changes = commit.stage_changes.clone();
                        let state = self.db.commit_transition(commit).await?;
                        Ok((state, output, changes))
                    },
                }
            })
            .await?;
        for change in changes {
            trace!("🔄️ {match_id}: {} -> {} ({})", change.from, change.to, change.reason);
            let event = StageChangedEvent::new(match_id.clone(), change, state.updated_at);
            self.producers.stage_changed(event).await;
        }
        Ok((state, output))
    }

    /// Issues every payout concurrently. All of them are attempted even if one fails; the first failure is returned.
    async fn pay_out(&self, match_id: &MatchId, payouts: Vec<Payout>) -> Result<(), MatchFlowError> {
        let results = join_all(payouts.into_iter().map(|payout| async move {
            let result = match &payout {
                Payout::Refund(req) => self.capture.refund(req.clone()).await,
                Payout::TopUp(req) => self.capture.request_top_up(req.clone()).await,
            };
            (payout, result)
        }))
        .await;
        let mut first_error = None;
        for (payout, result) in results {
            let (user_id, amount) = (payout.user_id(), payout.amount());
            match (&payout, result) {
                (Payout::Refund(_), Ok(reference)) => {
                    debug!("🔄️ Refunded {amount} to {user_id} for {match_id}. Ref {reference}")
                },
                (Payout::TopUp(_), Ok(reference)) => {
                    debug!("🔄️ Requested a top-up of {amount} from {user_id} for {match_id}. Ref {reference}")
                },
                (_, Err(e)) => {
                    error!("🔄️ Settlement of {amount} with {user_id} for {match_id} failed. {e}");
                    first_error.get_or_insert(e);
                },
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn announce_window(&self, state: &MatchPaymentState, recipients: &[UserId]) {
        let Some(deadline) = state.payment_window_end else {
            return;
        };
        let now = self.clock.now();
        let sends = recipients.iter().filter_map(|user_id| {
            let due = state.participant(user_id)?.amount_due;
            let message = window_opened_notice(&state.match_id, due, deadline, now);
            Some(async move { (user_id, self.notifier.send(user_id, &message, Urgency::Notice).await) })
        });
        for (user_id, result) in join_all(sends).await {
            if let Err(e) = result {
                warn!("🔄️ Could not tell {user_id} that the payment window for {} is open. {e}", state.match_id);
            }
        }
    }

    async fn broadcast(&self, recipients: &[UserId], message: &NotificationMessage, urgency: Urgency) {
        let sends = recipients.iter().map(|user_id| async move {
            (user_id, self.notifier.send(user_id, message, urgency).await)
        });
        for (user_id, result) in join_all(sends).await {
            if let Err(e) = result {
                warn!("🔄️ Notice \"{}\" could not be delivered to {user_id}. {e}", message.title);
            }
        }
    }
}

impl<B, N, P> DeadlineHandler for MatchFlowApi<B, N, P>
where
    B: MatchBackend,
    N: NotificationDelivery,
    P: PaymentCapture,
{
    async fn on_deadline_reached(&self, match_id: &MatchId) {
        match self.on_window_expired(match_id).await {
            Ok(ExpiryOutcome::Unchanged { .. }) => trace!("🔄️ Deadline for {match_id} was already handled"),
            Ok(_) => {},
            Err(MatchFlowError::Flow(e)) => debug!("🔄️ Deadline event for {match_id} ignored. {e}"),
            Err(e) => warn!("🔄️ Could not close the payment window for {match_id}. The backstop will retry. {e}"),
        }
    }
}

fn arm_all(state: &MatchPaymentState, now: DateTime<Utc>) -> Vec<ReminderChange> {
    let Some(deadline) = state.payment_window_end else {
        return Vec::new();
    };
    state
        .player_payments
        .iter()
        .filter(|p| !p.is_paid)
        .map(|p| ReminderChange::Arm(ReminderPlan::create(&state.match_id, &p.user_id, deadline, now)))
        .collect()
}

/// One key per match, user and payment window, whichever path issues the refund.
fn settlement_key(kind: &str, match_id: &MatchId, user_id: &UserId, window_start: Option<DateTime<Utc>>) -> String {
    format!("{kind}:{}:{user_id}:{}", match_id.as_str(), window_start.map(to_millis).unwrap_or(0))
}

fn refund_payouts(match_id: &MatchId, refunds: &[Refund], window_start: Option<DateTime<Utc>>) -> Vec<Payout> {
    refunds
        .iter()
        .map(|r| {
            Payout::Refund(RefundRequest {
                match_id: match_id.clone(),
                user_id: r.user_id.clone(),
                amount: r.amount,
                original_ref: r.transaction_ref.clone(),
                idempotency_key: settlement_key("refund", match_id, &r.user_id, window_start),
            })
        })
        .collect()
}
