use chrono::{DateTime, Utc};
use mp_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Adjustment, MatchId, MatchPaymentState, Refund, StageChange, UserId};

/// Emitted after a stage transition has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChangedEvent {
    pub match_id: MatchId,
    pub change: StageChange,
    pub timestamp: DateTime<Utc>,
}

impl StageChangedEvent {
    pub fn new(match_id: MatchId, change: StageChange, timestamp: DateTime<Utc>) -> Self {
        Self { match_id, change, timestamp }
    }
}

/// Emitted when a payment window closes without enough paying players and the match restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumLostEvent {
    pub match_id: MatchId,
    pub evicted: Vec<UserId>,
    pub refunds: Vec<Refund>,
}

impl QuorumLostEvent {
    pub fn new(match_id: MatchId, evicted: Vec<UserId>, refunds: Vec<Refund>) -> Self {
        Self { match_id, evicted, refunds }
    }

    pub fn total_refunded(&self) -> Money {
        self.refunds.iter().map(|r| r.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecordedEvent {
    pub match_id: MatchId,
    pub user_id: UserId,
    pub amount: Money,
    pub transaction_ref: String,
    /// True if this payment settled the participant's share in full
    pub settled: bool,
}

/// Emitted once the organizer has confirmed the final team and settlement adjustments have been issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfirmedEvent {
    pub state: MatchPaymentState,
    pub adjustments: Vec<Adjustment>,
}
