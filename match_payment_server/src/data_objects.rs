use chrono::{DateTime, Utc};
use match_payment_engine::db_types::{MatchId, NewMatch, UserId};
use mp_common::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMatchRequest {
    pub match_id: MatchId,
    pub organizer_id: UserId,
    pub min_players: u32,
    pub max_players: u32,
    pub total_cost: Money,
    pub starts_at: DateTime<Utc>,
}

impl From<CreateMatchRequest> for NewMatch {
    fn from(req: CreateMatchRequest) -> Self {
        NewMatch::new(req.match_id, req.organizer_id, req.min_players, req.max_players, req.total_cost, req.starts_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub user_id: UserId,
    pub amount: Money,
    /// Supplied by clients that may retry, so that a repeated request is not charged twice
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}
