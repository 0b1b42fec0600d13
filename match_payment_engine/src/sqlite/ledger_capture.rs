use log::*;

use super::{
    db::journal::{self, NewJournalEntry},
    SqliteDatabase,
};
use crate::{
    db_types::{JournalEntry, JournalEntryKind, MatchId},
    helpers::Clock,
    traits::{CaptureError, ChargeRequest, PaymentCapture, RefundRequest, StoreError, TopUpRequest},
};

/// A [`PaymentCapture`] that records every money movement in the `payment_journal` table instead of calling a card
/// processor.
///
/// Useful for deployments where settlement happens out of band, and as a deterministic collaborator in tests.
/// Idempotency keys are enforced by a unique index, so repeating a request returns the original reference.
#[derive(Debug, Clone)]
pub struct LedgerPaymentCapture {
    db: SqliteDatabase,
    clock: Clock,
}

impl LedgerPaymentCapture {
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db, clock: Clock::System }
    }

    /// Stamps journal entries from `clock`. Share the orchestrator's clock so that both agree on the time.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    async fn record(&self, entry: NewJournalEntry) -> Result<String, CaptureError> {
        let mut conn = self.db.pool().acquire().await.map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        let (stored, _) = journal::idempotent_insert(entry, &mut conn).await.map_err(unavailable)?;
        Ok(stored.transaction_ref)
    }

    pub async fn entries_for_match(&self, match_id: &MatchId) -> Result<Vec<JournalEntry>, StoreError> {
        let mut conn = self.db.pool().acquire().await?;
        journal::fetch_for_match(match_id, &mut conn).await
    }
}

fn unavailable(e: StoreError) -> CaptureError {
    error!("🗃️ Payment journal write failed. {e}");
    CaptureError::Unavailable(e.to_string())
}

impl PaymentCapture for LedgerPaymentCapture {
    async fn charge(&self, request: ChargeRequest) -> Result<String, CaptureError> {
        if !request.amount.is_positive() {
            return Err(CaptureError::Declined(format!("Cannot charge {}", request.amount)));
        }
        self.record(NewJournalEntry {
            match_id: request.match_id,
            user_id: request.user_id,
            kind: JournalEntryKind::Charge,
            amount: request.amount,
            idempotency_key: request.idempotency_key,
            created_at: self.clock.now(),
        })
        .await
    }

    async fn refund(&self, request: RefundRequest) -> Result<String, CaptureError> {
        if !request.amount.is_positive() {
            return Err(CaptureError::Declined(format!("Cannot refund {}", request.amount)));
        }
        self.record(NewJournalEntry {
            match_id: request.match_id,
            user_id: request.user_id,
            kind: JournalEntryKind::Refund,
            amount: request.amount,
            idempotency_key: request.idempotency_key,
            created_at: self.clock.now(),
        })
        .await
    }

    async fn request_top_up(&self, request: TopUpRequest) -> Result<String, CaptureError> {
        self.record(NewJournalEntry {
            match_id: request.match_id,
            user_id: request.user_id,
            kind: JournalEntryKind::TopUpRequest,
            amount: request.amount,
            idempotency_key: request.idempotency_key,
            created_at: self.clock.now(),
        })
        .await
    }
}
