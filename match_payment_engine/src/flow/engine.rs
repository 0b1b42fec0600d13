use chrono::{DateTime, Utc};
use log::*;
use mp_common::Money;

use super::{compute_window_duration, PaymentFlowError};
use crate::db_types::{
    Adjustment,
    MatchPaymentState,
    MatchStage,
    NewMatch,
    PaymentStatus,
    Refund,
    UserId,
};

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub state: MatchPaymentState,
    /// True when this join brought a free-joining match up to its minimum headcount. The caller is expected to
    /// soft-lock the match.
    pub quorum_reached: bool,
}

#[derive(Debug, Clone)]
pub enum HardLockOutcome {
    /// The window closed with enough paying players. Non-payers were removed.
    Locked { state: MatchPaymentState, evicted: Vec<UserId>, refunds: Vec<Refund> },
    /// Too few players paid. The match has been reset to free joining with no participants, and every payment
    /// collected so far must be returned.
    QuorumLost { state: MatchPaymentState, evicted: Vec<UserId>, refunds: Vec<Refund> },
    /// The match was already hard-locked. Nothing changed.
    AlreadyLocked(MatchPaymentState),
}

impl HardLockOutcome {
    pub fn state(&self) -> &MatchPaymentState {
        match self {
            HardLockOutcome::Locked { state, .. } => state,
            HardLockOutcome::QuorumLost { state, .. } => state,
            HardLockOutcome::AlreadyLocked(state) => state,
        }
    }

    pub fn refunds(&self) -> &[Refund] {
        match self {
            HardLockOutcome::Locked { refunds, .. } | HardLockOutcome::QuorumLost { refunds, .. } => refunds,
            HardLockOutcome::AlreadyLocked(_) => &[],
        }
    }

    pub fn is_quorum_lost(&self) -> bool {
        matches!(self, HardLockOutcome::QuorumLost { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub state: MatchPaymentState,
    /// Non-zero settlement deltas only. Positive amounts are refunds, negative amounts are top-ups owed.
    pub adjustments: Vec<Adjustment>,
}

#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub state: MatchPaymentState,
    pub refunds: Vec<Refund>,
}

/// Builds the initial payment state for a newly created match.
pub fn new_match(new: NewMatch, now: DateTime<Utc>) -> Result<MatchPaymentState, PaymentFlowError> {
    if new.match_id.as_str().trim().is_empty() {
        return Err(PaymentFlowError::InvalidMatchConfiguration("The match id cannot be empty".into()));
    }
    if new.min_players == 0 {
        return Err(PaymentFlowError::InvalidMatchConfiguration("A match needs at least one player".into()));
    }
    if new.min_players > new.max_players {
        return Err(PaymentFlowError::InvalidMatchConfiguration(format!(
            "min_players ({}) cannot exceed max_players ({})",
            new.min_players, new.max_players
        )));
    }
    if new.total_cost < Money::ZERO {
        return Err(PaymentFlowError::InvalidMatchConfiguration("The total cost cannot be negative".into()));
    }
    Ok(MatchPaymentState {
        match_id: new.match_id,
        organizer_id: new.organizer_id,
        stage: MatchStage::FreeJoining,
        min_players: new.min_players,
        max_players: new.max_players,
        current_player_count: 0,
        total_cost: new.total_cost,
        cost_per_player: Money::ZERO,
        starts_at: new.starts_at,
        payment_window_start: None,
        payment_window_end: None,
        player_payments: Vec::new(),
        cancel_reason: None,
        version: 0,
        created_at: now,
        updated_at: now,
    })
}

/// Adds `user_id` to the match.
///
/// Players joining during free-joining owe nothing yet. Players joining while the payment window is open are priced
/// at the current per-player share and given the window's deadline; existing players' obligations are not
/// renegotiated mid-window.
pub fn evaluate_join(
    mut state: MatchPaymentState,
    user_id: UserId,
    now: DateTime<Utc>,
) -> Result<JoinOutcome, PaymentFlowError> {
    if matches!(state.stage, MatchStage::HardLock) || state.stage.is_terminal() {
        return Err(PaymentFlowError::JoiningClosed(state.stage));
    }
    if state.participant(&user_id).is_some() {
        return Err(PaymentFlowError::AlreadyJoined(user_id));
    }
    if state.stage.accepts_payments() && state.payment_window_end.map(|end| now >= end).unwrap_or(false) {
        return Err(PaymentFlowError::JoiningClosed(state.stage));
    }
    if state.is_full() {
        return Err(PaymentFlowError::MatchFull(state.max_players));
    }
    let had_quorum = state.has_quorum();
    state.player_payments.push(PaymentStatus::new(user_id.clone(), state.stage, now));
    recount(&mut state);
    if state.stage.accepts_payments() {
        let share = state.cost_per_player;
        let deadline = state.payment_window_end;
        if let Some(p) = state.participant_mut(&user_id) {
            p.amount_due = share;
            p.payment_deadline = deadline;
            p.refresh_paid_flag();
            if p.is_paid {
                p.paid_at = Some(now);
            }
        }
        trace!("🧮️ Late joiner {user_id} in {} owes {share}", state.match_id);
    }
    state.updated_at = now;
    let quorum_reached = state.stage == MatchStage::FreeJoining && !had_quorum && state.has_quorum();
    Ok(JoinOutcome { state, quorum_reached })
}

/// Removes an unpaid participant.
///
/// Falling below quorum during the payment window does not revert the match; it stays open for new joins and the
/// quorum is only enforced at hard lock.
pub fn remove_participant(
    mut state: MatchPaymentState,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> Result<MatchPaymentState, PaymentFlowError> {
    if matches!(state.stage, MatchStage::HardLock) || state.stage.is_terminal() {
        return Err(PaymentFlowError::MatchClosed(state.stage));
    }
    let participant = state.participant(user_id).ok_or_else(|| PaymentFlowError::ParticipantNotFound(user_id.clone()))?;
    // A settled zero share leaves nothing to refund
    if participant.amount_paid.is_positive() {
        return Err(PaymentFlowError::CannotLeaveAfterPayment);
    }
    state.player_payments.retain(|p| &p.user_id != user_id);
    recount(&mut state);
    state.updated_at = now;
    Ok(state)
}

/// Prices every participant's share and opens the payment window.
///
/// `amount_due = round_half_up(total_cost / current_player_count)`, and the window length is taken from
/// [`compute_window_duration`] using the time remaining until the event starts.
pub fn enter_soft_lock(mut state: MatchPaymentState, now: DateTime<Utc>) -> Result<MatchPaymentState, PaymentFlowError> {
    if state.stage != MatchStage::FreeJoining {
        return Err(PaymentFlowError::InvalidTransition { from: state.stage, to: MatchStage::SoftLock });
    }
    if !state.has_quorum() {
        return Err(PaymentFlowError::QuorumNotMet { current: state.current_player_count, required: state.min_players });
    }
    let window = compute_window_duration(state.starts_at - now);
    let window_end = now + window;
    recount(&mut state);
    let share = state.cost_per_player;
    for p in state.player_payments.iter_mut() {
        p.amount_due = share;
        p.payment_deadline = Some(window_end);
        p.refresh_paid_flag();
        if p.is_paid {
            p.paid_at = Some(now);
        }
    }
    state.payment_window_start = Some(now);
    state.payment_window_end = Some(window_end);
    set_stage(&mut state, MatchStage::SoftLock, now);
    debug!(
        "🧮️ {} soft-locked with {} players at {share} each. Window closes in {} minutes",
        state.match_id,
        state.current_player_count,
        window.num_minutes()
    );
    Ok(state)
}

/// The immediate SoftLock → PaymentWindow step.
pub fn open_payment_window(
    mut state: MatchPaymentState,
    now: DateTime<Utc>,
) -> Result<MatchPaymentState, PaymentFlowError> {
    if state.stage != MatchStage::SoftLock {
        return Err(PaymentFlowError::InvalidTransition { from: state.stage, to: MatchStage::PaymentWindow });
    }
    set_stage(&mut state, MatchStage::PaymentWindow, now);
    Ok(state)
}

/// Records a payment from `user_id`.
///
/// Payments accumulate. A payment that leaves `amount_paid` below `amount_due` is recorded but does not satisfy the
/// obligation.
pub fn record_payment(
    mut state: MatchPaymentState,
    user_id: &UserId,
    amount: Money,
    transaction_ref: Option<String>,
    now: DateTime<Utc>,
) -> Result<MatchPaymentState, PaymentFlowError> {
    if !state.stage.accepts_payments() {
        return Err(PaymentFlowError::WindowNotActive(state.stage));
    }
    if state.payment_window_end.map(|end| now >= end).unwrap_or(false) {
        return Err(PaymentFlowError::WindowNotActive(state.stage));
    }
    if !amount.is_positive() {
        return Err(PaymentFlowError::InvalidAmount);
    }
    let stage = state.stage;
    let p = state.participant_mut(user_id).ok_or_else(|| PaymentFlowError::ParticipantNotFound(user_id.clone()))?;
    if p.is_paid {
        return Err(PaymentFlowError::AlreadyPaid(user_id.clone()));
    }
    p.amount_paid = p.amount_paid.checked_add(amount).ok_or(PaymentFlowError::InvalidAmount)?;
    p.stage = stage;
    if transaction_ref.is_some() {
        p.transaction_ref = transaction_ref;
    }
    p.refresh_paid_flag();
    if p.is_paid {
        p.paid_at = Some(now);
    } else {
        debug!("🧮️ Partial payment from {user_id}: {} of {} received", p.amount_paid, p.amount_due);
    }
    state.updated_at = now;
    Ok(state)
}

/// Closes the payment window and removes everyone who has not paid in full.
///
/// Calling this on a match that is already hard-locked is a no-op. Evicted players who made a partial payment are
/// refunded in either outcome.
pub fn enter_hard_lock(mut state: MatchPaymentState, now: DateTime<Utc>) -> Result<HardLockOutcome, PaymentFlowError> {
    if state.stage == MatchStage::HardLock {
        return Ok(HardLockOutcome::AlreadyLocked(state));
    }
    if !state.stage.accepts_payments() {
        return Err(PaymentFlowError::WindowNotActive(state.stage));
    }
    let closes_at = state.payment_window_end.ok_or(PaymentFlowError::WindowNotActive(state.stage))?;
    if now < closes_at {
        return Err(PaymentFlowError::WindowStillOpen { closes_at });
    }
    let (paid, unpaid): (Vec<PaymentStatus>, Vec<PaymentStatus>) =
        std::mem::take(&mut state.player_payments).into_iter().partition(|p| p.is_paid);
    let evicted = unpaid.iter().map(|p| p.user_id.clone()).collect::<Vec<_>>();
    let mut refunds = unpaid.iter().filter(|p| p.amount_paid.is_positive()).map(refund_for).collect::<Vec<_>>();

    if paid.len() < state.min_players as usize {
        refunds.extend(paid.iter().map(refund_for));
        info!(
            "🧮️ {} lost quorum at hard lock: {} paid, {} required. Resetting to free joining.",
            state.match_id,
            paid.len(),
            state.min_players
        );
        state.payment_window_start = None;
        state.payment_window_end = None;
        recount(&mut state);
        set_stage(&mut state, MatchStage::FreeJoining, now);
        return Ok(HardLockOutcome::QuorumLost { state, evicted, refunds });
    }

    state.player_payments = paid;
    recount(&mut state);
    set_stage(&mut state, MatchStage::HardLock, now);
    debug!(
        "🧮️ {} hard-locked with {} players. {} evicted. Final share is {}",
        state.match_id,
        state.current_player_count,
        evicted.len(),
        state.cost_per_player
    );
    Ok(HardLockOutcome::Locked { state, evicted, refunds })
}

/// Settles the final team.
///
/// Each participant's adjustment is `amount_paid - cost_per_player`. After settlement every participant's recorded
/// `amount_paid` equals the final share, so the sum over the team equals `total_cost` up to per-player rounding.
pub fn confirm_final_team(mut state: MatchPaymentState, now: DateTime<Utc>) -> Result<ConfirmOutcome, PaymentFlowError> {
    let unpaid = state.player_payments.iter().filter(|p| !p.is_paid).count();
    if state.stage != MatchStage::HardLock || unpaid > 0 {
        return Err(PaymentFlowError::IncompletePayment { stage: state.stage, unpaid });
    }
    let share = state.cost_per_player;
    let mut adjustments = Vec::new();
    for p in state.player_payments.iter_mut() {
        let delta = p.amount_paid - share;
        if !delta.is_zero() {
            adjustments.push(Adjustment {
                user_id: p.user_id.clone(),
                amount: delta,
                transaction_ref: p.transaction_ref.clone(),
            });
        }
        p.amount_due = share;
        p.amount_paid = share;
    }
    set_stage(&mut state, MatchStage::Confirmed, now);
    Ok(ConfirmOutcome { state, adjustments })
}

/// Calls the match off from any non-terminal stage. Everyone who has paid anything gets it back in full.
pub fn cancel(mut state: MatchPaymentState, reason: &str, now: DateTime<Utc>) -> Result<CancelOutcome, PaymentFlowError> {
    if state.stage.is_terminal() {
        return Err(PaymentFlowError::MatchClosed(state.stage));
    }
    let refunds =
        state.player_payments.iter().filter(|p| p.amount_paid.is_positive()).map(refund_for).collect::<Vec<_>>();
    state.cancel_reason = Some(reason.to_string());
    set_stage(&mut state, MatchStage::Cancelled, now);
    Ok(CancelOutcome { state, refunds })
}

fn refund_for(p: &PaymentStatus) -> Refund {
    Refund { user_id: p.user_id.clone(), amount: p.amount_paid, transaction_ref: p.transaction_ref.clone() }
}

fn recount(state: &mut MatchPaymentState) {
    // Headcount is bounded by max_players (a u32), so this cannot truncate
    state.current_player_count = state.player_payments.len() as u32;
    state.cost_per_player = state.total_cost.split_round_half_up(state.current_player_count).unwrap_or(Money::ZERO);
}

fn set_stage(state: &mut MatchPaymentState, stage: MatchStage, now: DateTime<Utc>) {
    state.stage = stage;
    state.player_payments.iter_mut().for_each(|p| p.stage = stage);
    state.updated_at = now;
}
