//! # Deadline reminder scheduler
//!
//! Every participant with an open payment obligation gets a reminder campaign: seven days, three days and one day
//! before the deadline, then hourly through the final day, then a single "deadline reached" event.
//!
//! Campaigns are durable rows rather than in-process timers. [`ReminderPlan`] is the pure planner that decides what
//! fires next. [`ReminderScheduler::sweep`] periodically leases due rows, delivers their messages, advances them and
//! hands "deadline reached" events to a [`DeadlineHandler`].
mod messages;
mod plan;
mod scheduler;

pub use messages::{
    cancelled_notice,
    confirmed_notice,
    evicted_notice,
    quorum_lost_notice,
    reminder_message,
    time_remaining,
    window_opened_notice,
    NotificationMessage,
    Urgency,
};
pub use plan::{ArmedOffsets, DeadlineReminder, ReminderKind, ReminderPlan, ReminderStatus, TriggeredOffsets};
pub use scheduler::{DeadlineHandler, ReminderScheduler, SweepConfig, SweepResult};
