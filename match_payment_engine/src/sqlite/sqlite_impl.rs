//! `SqliteDatabase` is the concrete SQLite implementation of the match payment engine's storage backend.
//!
//! It implements both [`MatchStore`] and [`ReminderStore`], so that a lifecycle transition and the reminder changes
//! it implies can be written in a single transaction.
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, matches, new_pool, reminders, stage_log};
use crate::{
    db_types::{MatchId, MatchPaymentState, StageLogEntry, UserId},
    reminders::DeadlineReminder,
    traits::{MatchStore, ReminderChange, ReminderStore, StoreError, TransitionCommit},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl MatchStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_match(&self, state: &MatchPaymentState) -> Result<MatchPaymentState, StoreError> {
        let mut tx = self.pool.begin().await?;
        matches::insert_match(state, &mut tx).await?;
        tx.commit().await?;
        Ok(state.clone())
    }

    async fn fetch_match(&self, match_id: &MatchId) -> Result<Option<MatchPaymentState>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        matches::fetch_match(match_id, &mut conn).await
    }

    /// In one transaction:
    /// * updates the match row, guarded by the expected version
    /// * replaces the participant rows
    /// * appends the stage log entries
    /// * applies the reminder changes
    async fn commit_transition(&self, commit: TransitionCommit) -> Result<MatchPaymentState, StoreError> {
        let TransitionCommit { mut state, expected_version, stage_changes, reminders: changes } = commit;
        let mut tx = self.pool.begin().await?;
        let version = matches::update_match(&state, expected_version, &mut tx).await?;
        matches::replace_participants(&state.match_id, &state.player_payments, &mut tx).await?;
        for change in &stage_changes {
            stage_log::append(&state.match_id, change, state.updated_at, &mut tx).await?;
        }
        for change in &changes {
            match change {
                ReminderChange::Arm(reminder) => reminders::upsert(reminder, &mut tx).await?,
                ReminderChange::CancelParticipant(user_id) => {
                    reminders::cancel(&state.match_id, user_id, &mut tx).await?;
                },
                ReminderChange::CancelAll => {
                    reminders::cancel_for_match(&state.match_id, &mut tx).await?;
                },
            }
        }
        tx.commit().await?;
        state.version = version;
        debug!(
            "🗃️ {} committed at version {version} ({} stage change(s), {} reminder change(s))",
            state.match_id,
            stage_changes.len(),
            changes.len()
        );
        Ok(state)
    }

    async fn fetch_expired_windows(&self, now: DateTime<Utc>) -> Result<Vec<MatchId>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        matches::fetch_expired_windows(now, &mut conn).await
    }

    async fn fetch_stage_log(&self, match_id: &MatchId) -> Result<Vec<StageLogEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        stage_log::fetch_for_match(match_id, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl ReminderStore for SqliteDatabase {
    async fn upsert_reminder(&self, reminder: &DeadlineReminder) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        reminders::upsert(reminder, &mut conn).await
    }

    async fn fetch_reminder(
        &self,
        match_id: &MatchId,
        user_id: &UserId,
    ) -> Result<Option<DeadlineReminder>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        reminders::fetch(match_id, user_id, &mut conn).await
    }

    async fn fetch_reminders_for_match(&self, match_id: &MatchId) -> Result<Vec<DeadlineReminder>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        reminders::fetch_for_match(match_id, &mut conn).await
    }

    async fn cancel_reminder(&self, match_id: &MatchId, user_id: &UserId) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        reminders::cancel(match_id, user_id, &mut conn).await
    }

    async fn cancel_reminders_for_match(&self, match_id: &MatchId) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        reminders::cancel_for_match(match_id, &mut conn).await
    }

    async fn claim_due_reminders(
        &self,
        now: DateTime<Utc>,
        owner: &str,
        lease: Duration,
        limit: i64,
    ) -> Result<Vec<DeadlineReminder>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        reminders::claim_due(now, owner, lease, limit, &mut conn).await
    }

    async fn complete_firing(&self, reminder: &DeadlineReminder, owner: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        reminders::complete_firing(reminder, owner, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
