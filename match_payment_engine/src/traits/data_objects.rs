use crate::{
    db_types::{MatchPaymentState, StageChange, UserId},
    reminders::DeadlineReminder,
};

/// A change to a match's reminder campaigns, applied in the same transaction as the state write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderChange {
    /// Insert or replace the campaign for a participant
    Arm(DeadlineReminder),
    CancelParticipant(UserId),
    CancelAll,
}

/// Everything a single lifecycle transition writes.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    pub state: MatchPaymentState,
    /// The version the state was read at. The write is rejected if the stored version differs.
    pub expected_version: i64,
    pub stage_changes: Vec<StageChange>,
    pub reminders: Vec<ReminderChange>,
}

impl TransitionCommit {
    pub fn new(state: MatchPaymentState, expected_version: i64) -> Self {
        Self { state, expected_version, stage_changes: Vec::new(), reminders: Vec::new() }
    }

    pub fn with_stage_change(mut self, change: StageChange) -> Self {
        self.stage_changes.push(change);
        self
    }

    pub fn with_reminder(mut self, change: ReminderChange) -> Self {
        self.reminders.push(change);
        self
    }

    pub fn with_reminders<I: IntoIterator<Item = ReminderChange>>(mut self, changes: I) -> Self {
        self.reminders.extend(changes);
        self
    }
}
