use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use futures_util::{stream, StreamExt};
use log::*;

use super::{reminder_message, DeadlineReminder, ReminderKind, ReminderPlan};
use crate::{
    db_types::{MatchId, UserId},
    traits::{NotificationDelivery, ReminderStore, StoreError},
};

/// Receives "deadline reached" events from the sweep. The orchestrator implements this to close payment windows.
#[allow(async_fn_in_trait)]
pub trait DeadlineHandler {
    async fn on_deadline_reached(&self, match_id: &MatchId);
}

impl DeadlineHandler for () {
    async fn on_deadline_reached(&self, _match_id: &MatchId) {}
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Identifies this instance as a lease holder
    pub owner: String,
    pub lease: Duration,
    pub batch_size: i64,
    /// Maximum number of deliveries in flight at once
    pub concurrency: usize,
    pub delivery_timeout: std::time::Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            owner: format!("sweeper-{:08x}", rand::random::<u32>()),
            lease: Duration::seconds(120),
            batch_size: 100,
            concurrency: 16,
            delivery_timeout: std::time::Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    pub claimed: usize,
    pub delivered: usize,
    pub failed_deliveries: usize,
    /// Reminders whose lease was lost (or which were cancelled) before the advanced row could be written
    pub skipped_writes: usize,
    /// Matches whose payment deadline was announced in this sweep
    pub deadlines: Vec<MatchId>,
}

struct FireOutcome {
    match_id: MatchId,
    kind: Option<ReminderKind>,
    delivered: bool,
    written: bool,
}

pub struct ReminderScheduler<S, N> {
    store: S,
    notifier: N,
    config: SweepConfig,
}

impl<S, N> ReminderScheduler<S, N>
where
    S: ReminderStore,
    N: NotificationDelivery,
{
    pub fn new(store: S, notifier: N, config: SweepConfig) -> Self {
        Self { store, notifier, config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Arms (or re-arms) the campaign for `user_id` in `match_id`.
    pub async fn create(
        &self,
        match_id: &MatchId,
        user_id: &UserId,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<DeadlineReminder, StoreError> {
        let reminder = ReminderPlan::create(match_id, user_id, deadline, now);
        self.store.upsert_reminder(&reminder).await?;
        debug!("⏰️ Reminders armed for {user_id} in {match_id}. Deadline {deadline}");
        Ok(reminder)
    }

    /// Cancels the participant's campaign. Cancelling a campaign that does not exist, or was already cancelled, is
    /// not an error.
    pub async fn cancel(&self, match_id: &MatchId, user_id: &UserId) -> Result<(), StoreError> {
        if self.store.cancel_reminder(match_id, user_id).await? {
            debug!("⏰️ Reminders cancelled for {user_id} in {match_id}");
        }
        Ok(())
    }

    pub async fn cancel_all_for_match(&self, match_id: &MatchId) -> Result<u64, StoreError> {
        let n = self.store.cancel_reminders_for_match(match_id).await?;
        debug!("⏰️ {n} reminder campaigns cancelled for {match_id}");
        Ok(n)
    }

    /// Fires every reminder that is due at `now`.
    ///
    /// Delivery happens before the advanced row is written, so a crash between the two can repeat a message but never
    /// lose one. Delivery failures are logged and the reminder advances regardless. After all writes, each match with a
    /// "deadline reached" event is passed to `handler` once.
    pub async fn sweep<H: DeadlineHandler>(&self, now: DateTime<Utc>, handler: &H) -> Result<SweepResult, StoreError> {
        let owner = self.config.owner.as_str();
        let due = self.store.claim_due_reminders(now, owner, self.config.lease, self.config.batch_size).await?;
        let mut result = SweepResult { claimed: due.len(), ..Default::default() };
        if due.is_empty() {
            return Ok(result);
        }
        trace!("⏰️ {owner} claimed {} due reminders", due.len());
        let outcomes = stream::iter(due)
            .map(|r| self.fire_one(r, now))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;
        let mut deadlines = BTreeSet::new();
        for outcome in outcomes {
            match outcome.kind {
                Some(_) if outcome.delivered => result.delivered += 1,
                Some(_) => result.failed_deliveries += 1,
                None => {},
            }
            if !outcome.written {
                result.skipped_writes += 1;
            }
            if outcome.kind == Some(ReminderKind::DeadlineReached) {
                deadlines.insert(outcome.match_id.0);
            }
        }
        for match_id in deadlines {
            let match_id = MatchId(match_id);
            info!("⏰️ Payment deadline reached for {match_id}");
            handler.on_deadline_reached(&match_id).await;
            result.deadlines.push(match_id);
        }
        debug!(
            "⏰️ Sweep complete. {} claimed, {} delivered, {} failed, {} not written",
            result.claimed, result.delivered, result.failed_deliveries, result.skipped_writes
        );
        Ok(result)
    }

    async fn fire_one(&self, reminder: DeadlineReminder, now: DateTime<Utc>) -> FireOutcome {
        let match_id = reminder.match_id.clone();
        let (advanced, kind) = ReminderPlan::fire(reminder, now);
        let mut delivered = false;
        if let Some(kind) = kind {
            let message = reminder_message(kind, &advanced.match_id, advanced.deadline, now);
            let send = self.notifier.send(&advanced.user_id, &message, kind.into());
            match tokio::time::timeout(self.config.delivery_timeout, send).await {
                Ok(Ok(())) => {
                    trace!("⏰️ {kind} reminder delivered to {} for {match_id}", advanced.user_id);
                    delivered = true;
                },
                Ok(Err(e)) => warn!("⏰️ {kind} reminder to {} for {match_id} failed. {e}", advanced.user_id),
                Err(_) => warn!(
                    "⏰️ {kind} reminder to {} for {match_id} timed out after {}s",
                    advanced.user_id,
                    self.config.delivery_timeout.as_secs()
                ),
            }
        }
        let written = match self.store.complete_firing(&advanced, &self.config.owner).await {
            Ok(true) => true,
            Ok(false) => {
                debug!("⏰️ Reminder {} for {match_id} changed hands or was cancelled mid-sweep", advanced.reminder_id);
                false
            },
            Err(e) => {
                error!("⏰️ Could not advance reminder {} for {match_id}. It will be retried. {e}", advanced.reminder_id);
                false
            },
        };
        FireOutcome { match_id, kind, delivered, written }
    }
}
