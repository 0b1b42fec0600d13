use chrono::{DateTime, Duration, Utc};

use crate::{
    db_types::{MatchId, UserId},
    reminders::DeadlineReminder,
    traits::StoreError,
};

/// Durable storage for deadline reminder campaigns.
///
/// Multiple server instances may sweep the same store. [`ReminderStore::claim_due_reminders`] hands each due reminder
/// to at most one of them at a time by leasing it.
#[allow(async_fn_in_trait)]
pub trait ReminderStore: Clone {
    /// Inserts the reminder, replacing any existing campaign with the same id. Any lease on the old row is dropped.
    async fn upsert_reminder(&self, reminder: &DeadlineReminder) -> Result<(), StoreError>;

    async fn fetch_reminder(&self, match_id: &MatchId, user_id: &UserId)
        -> Result<Option<DeadlineReminder>, StoreError>;

    async fn fetch_reminders_for_match(&self, match_id: &MatchId) -> Result<Vec<DeadlineReminder>, StoreError>;

    /// Cancels the participant's campaign. Returns `false` if there was no active campaign to cancel.
    async fn cancel_reminder(&self, match_id: &MatchId, user_id: &UserId) -> Result<bool, StoreError>;

    /// Cancels every active campaign for the match, returning the number cancelled.
    async fn cancel_reminders_for_match(&self, match_id: &MatchId) -> Result<u64, StoreError>;

    /// Leases up to `limit` active reminders whose `next_fire_at <= now` to `owner` until `now + lease`.
    ///
    /// Reminders already leased to someone else are skipped unless that lease has expired.
    async fn claim_due_reminders(
        &self,
        now: DateTime<Utc>,
        owner: &str,
        lease: Duration,
        limit: i64,
    ) -> Result<Vec<DeadlineReminder>, StoreError>;

    /// Writes the advanced reminder and releases the lease, but only if `owner` still holds it and the campaign is
    /// still active. Returns `false` if the write was skipped.
    async fn complete_firing(&self, reminder: &DeadlineReminder, owner: &str) -> Result<bool, StoreError>;
}
