use thiserror::Error;

use crate::{
    db_types::MatchId,
    flow::PaymentFlowError,
    traits::{CaptureError, StoreError},
};

#[derive(Debug, Clone, Error)]
pub enum MatchFlowError {
    #[error("{0}")]
    Flow(#[from] PaymentFlowError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Capture(#[from] CaptureError),
    #[error(
        "Payment {transaction_ref} for {match_id} was taken but could not be applied, and reversing it failed. {reason}"
    )]
    CompensationFailed { match_id: MatchId, transaction_ref: String, reason: String },
}

impl MatchFlowError {
    /// Infrastructure failures (database unavailable, lost write races) that a retry may resolve. Engine errors are
    /// never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            MatchFlowError::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MatchFlowError::Store(StoreError::MatchNotFound(_)))
    }
}
