use mp_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Adjustment, MatchPaymentState, Refund, UserId};

/// What happened when a payment window was closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExpiryOutcome {
    Locked { state: MatchPaymentState, evicted: Vec<UserId>, refunds: Vec<Refund> },
    QuorumLost { state: MatchPaymentState, evicted: Vec<UserId>, refunds: Vec<Refund> },
    /// The window had already been closed (or the match had moved on). Nothing was written.
    Unchanged { state: MatchPaymentState },
}

impl ExpiryOutcome {
    pub fn state(&self) -> &MatchPaymentState {
        match self {
            ExpiryOutcome::Locked { state, .. } => state,
            ExpiryOutcome::QuorumLost { state, .. } => state,
            ExpiryOutcome::Unchanged { state } => state,
        }
    }

    pub fn into_state(self) -> MatchPaymentState {
        match self {
            ExpiryOutcome::Locked { state, .. } => state,
            ExpiryOutcome::QuorumLost { state, .. } => state,
            ExpiryOutcome::Unchanged { state } => state,
        }
    }

    pub fn total_refunded(&self) -> Money {
        match self {
            ExpiryOutcome::Locked { refunds, .. } | ExpiryOutcome::QuorumLost { refunds, .. } => {
                refunds.iter().map(|r| r.amount).sum()
            },
            ExpiryOutcome::Unchanged { .. } => Money::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmResult {
    pub state: MatchPaymentState,
    pub adjustments: Vec<Adjustment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    pub state: MatchPaymentState,
    pub refunds: Vec<Refund>,
}
