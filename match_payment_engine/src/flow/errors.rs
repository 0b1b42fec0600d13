use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{MatchStage, UserId};

/// Domain errors reported by the payment flow engine.
///
/// Ordering errors mean an operation was invoked while the match is in a stage that does not permit it. Participant
/// errors describe something the individual player cannot do. Neither kind is transient; retrying will not help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentFlowError {
    // ---- ordering errors ----
    #[error("Not enough players to lock the match: {current} joined, {required} required")]
    QuorumNotMet { current: u32, required: u32 },
    #[error("The payment window is still open until {closes_at}")]
    WindowStillOpen { closes_at: DateTime<Utc> },
    #[error("The payment window is not open for this match (stage: {0})")]
    WindowNotActive(MatchStage),
    #[error("The final team cannot be confirmed: the match is in {stage} and {unpaid} participant(s) have not paid")]
    IncompletePayment { stage: MatchStage, unpaid: usize },
    #[error("This match is not accepting new players (stage: {0})")]
    JoiningClosed(MatchStage),
    #[error("This match is closed to changes (stage: {0})")]
    MatchClosed(MatchStage),
    #[error("Cannot move a match from {from} to {to}")]
    InvalidTransition { from: MatchStage, to: MatchStage },
    #[error("Invalid match configuration. {0}")]
    InvalidMatchConfiguration(String),
    // ---- participant errors ----
    #[error("You cannot leave a match you have already paid for. Ask the organizer for a refund first.")]
    CannotLeaveAfterPayment,
    #[error("{0} has already paid their share")]
    AlreadyPaid(UserId),
    #[error("{0} has already joined this match")]
    AlreadyJoined(UserId),
    #[error("This match is full ({0} players)")]
    MatchFull(u32),
    #[error("{0} is not a participant in this match")]
    ParticipantNotFound(UserId),
    #[error("Payment amounts must be positive and within range")]
    InvalidAmount,
}

impl PaymentFlowError {
    /// Participant errors are meant for user-facing messaging. Everything else indicates the caller acted out of turn.
    pub fn is_participant_error(&self) -> bool {
        matches!(
            self,
            Self::CannotLeaveAfterPayment
                | Self::AlreadyPaid(_)
                | Self::AlreadyJoined(_)
                | Self::MatchFull(_)
                | Self::ParticipantNotFound(_)
                | Self::InvalidAmount
        )
    }
}
