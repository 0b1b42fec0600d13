use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{MatchId, MatchPaymentState, StageLogEntry},
    traits::{ReminderStore, TransitionCommit},
};

/// The durable record store for match payment state.
///
/// Backends must make [`MatchStore::commit_transition`] atomic: the state update, participant rows, stage log entries
/// and reminder changes either all land or none do.
#[allow(async_fn_in_trait)]
pub trait MatchStore: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a brand-new match. Fails with [`StoreError::MatchAlreadyExists`] if the id is taken.
    async fn insert_match(&self, state: &MatchPaymentState) -> Result<MatchPaymentState, StoreError>;

    /// Fetches the current state of the match, including all participants.
    async fn fetch_match(&self, match_id: &MatchId) -> Result<Option<MatchPaymentState>, StoreError>;

    /// Writes the result of a lifecycle transition.
    ///
    /// The write succeeds only if the stored version equals `commit.expected_version`, in which case the version is
    /// incremented and the updated state is returned. Otherwise [`StoreError::VersionConflict`] is returned and
    /// nothing is written.
    async fn commit_transition(&self, commit: TransitionCommit) -> Result<MatchPaymentState, StoreError>;

    /// Matches whose payment window has closed (`payment_window_end <= now`) but which have not been hard-locked yet.
    async fn fetch_expired_windows(&self, now: DateTime<Utc>) -> Result<Vec<MatchId>, StoreError>;

    /// The stage audit log for the match, oldest first.
    async fn fetch_stage_log(&self, match_id: &MatchId) -> Result<Vec<StageLogEntry>, StoreError>;

    async fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A backend that stores both matches and their reminder campaigns, so that transitions can update them together.
pub trait MatchBackend: MatchStore + ReminderStore {}

impl<T: MatchStore + ReminderStore> MatchBackend for T {}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested match {0} does not exist")]
    MatchNotFound(MatchId),
    #[error("Cannot create match, since {0} already exists")]
    MatchAlreadyExists(MatchId),
    #[error("Match {match_id} was modified concurrently (expected version {expected})")]
    VersionConflict { match_id: MatchId, expected: i64 },
    #[error("Stored data could not be decoded. {0}")]
    CorruptRecord(String),
}

impl StoreError {
    /// Transient failures that are worth retrying after re-reading the match.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::DatabaseError(_) | StoreError::VersionConflict { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
