use mp_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{MatchId, UserId},
    reminders::{NotificationMessage, Urgency},
};

/// Delivers notifications to participants. The transport (push, e-mail, chat) is the implementor's concern.
#[allow(async_fn_in_trait)]
pub trait NotificationDelivery: Clone {
    async fn send(&self, user_id: &UserId, message: &NotificationMessage, urgency: Urgency) -> Result<(), DeliveryError>;
}

/// Moves money. Every request carries an idempotency key: repeating a request with the same key must not move money
/// twice, and must return the original transaction reference.
#[allow(async_fn_in_trait)]
pub trait PaymentCapture: Clone {
    /// Charges the participant and returns the processor's transaction reference.
    async fn charge(&self, request: ChargeRequest) -> Result<String, CaptureError>;

    async fn refund(&self, request: RefundRequest) -> Result<String, CaptureError>;

    /// Asks the participant to pay an additional amount after the final team was settled.
    async fn request_top_up(&self, request: TopUpRequest) -> Result<String, CaptureError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub match_id: MatchId,
    pub user_id: UserId,
    pub amount: Money,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub match_id: MatchId,
    pub user_id: UserId,
    pub amount: Money,
    /// The charge being refunded, if known
    pub original_ref: Option<String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUpRequest {
    pub match_id: MatchId,
    pub user_id: UserId,
    pub amount: Money,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("The notification could not be delivered: {0}")]
    Failed(String),
    #[error("The notification was not delivered within {0} seconds")]
    TimedOut(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("The payment was declined: {0}")]
    Declined(String),
    #[error("The payment processor is unavailable: {0}")]
    Unavailable(String),
}
