use std::fmt::Display;

use chrono::{DateTime, Utc};
use mp_common::Money;
use serde::{Deserialize, Serialize};

use super::ReminderKind;
use crate::db_types::MatchId;

/// How pressing a notification is. Delivery collaborators may route on this (e.g. push vs. e-mail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Urgency {
    SevenDay,
    ThreeDay,
    OneDay,
    Hourly,
    DeadlineReached,
    /// Lifecycle announcements that are not part of a reminder campaign
    Notice,
}

impl From<ReminderKind> for Urgency {
    fn from(kind: ReminderKind) -> Self {
        match kind {
            ReminderKind::SevenDay => Urgency::SevenDay,
            ReminderKind::ThreeDay => Urgency::ThreeDay,
            ReminderKind::OneDay => Urgency::OneDay,
            ReminderKind::Hourly => Urgency::Hourly,
            ReminderKind::DeadlineReached => Urgency::DeadlineReached,
        }
    }
}

impl Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Urgency::SevenDay => "sevenDay",
            Urgency::ThreeDay => "threeDay",
            Urgency::OneDay => "oneDay",
            Urgency::Hourly => "hourly",
            Urgency::DeadlineReached => "deadlineReached",
            Urgency::Notice => "notice",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub match_id: MatchId,
    pub title: String,
    pub body: String,
    pub time_remaining: Option<String>,
}

impl NotificationMessage {
    pub fn new<T: Into<String>, B: Into<String>>(match_id: MatchId, title: T, body: B) -> Self {
        Self { match_id, title: title.into(), body: body.into(), time_remaining: None }
    }

    pub fn with_time_remaining(mut self, remaining: String) -> Self {
        self.time_remaining = Some(remaining);
        self
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// A human-readable rendering of the time left until `deadline`, e.g. "3 days", "1 day 4 hours" or "45 minutes".
///
/// Only the two most significant units are shown.
pub fn time_remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (deadline - now).num_seconds();
    if secs <= 0 {
        return "no time".to_string();
    }
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    match (days, hours, minutes) {
        (0, 0, 0) => "less than a minute".to_string(),
        (0, 0, m) => plural(m, "minute"),
        (0, h, 0) => plural(h, "hour"),
        (0, h, m) => format!("{} {}", plural(h, "hour"), plural(m, "minute")),
        (d, 0, _) => plural(d, "day"),
        (d, h, _) => format!("{} {}", plural(d, "day"), plural(h, "hour")),
    }
}

/// The message sent for a reminder campaign event.
pub fn reminder_message(
    kind: ReminderKind,
    match_id: &MatchId,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> NotificationMessage {
    let remaining = time_remaining(deadline, now);
    let (title, body) = match kind {
        ReminderKind::SevenDay => {
            ("Payment reminder", format!("Your share for match {match_id} is due in {remaining}."))
        },
        ReminderKind::ThreeDay => ("Payment due soon", format!("{remaining} left to pay your share for match {match_id}.")),
        ReminderKind::OneDay => (
            "Payment due tomorrow",
            format!("Only {remaining} left to pay for match {match_id}. Unpaid players lose their spot."),
        ),
        ReminderKind::Hourly => (
            "Payment window closing",
            format!("{remaining} left to secure your spot in match {match_id}. Pay now to keep your place."),
        ),
        ReminderKind::DeadlineReached => {
            ("Payment window closed", format!("The payment window for match {match_id} has closed."))
        },
    };
    let msg = NotificationMessage::new(match_id.clone(), title, body);
    match kind {
        ReminderKind::DeadlineReached => msg,
        _ => msg.with_time_remaining(remaining),
    }
}

/// Sent to every participant when the match reaches quorum and the payment window opens.
pub fn window_opened_notice(
    match_id: &MatchId,
    amount_due: Money,
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
) -> NotificationMessage {
    let remaining = time_remaining(deadline, now);
    NotificationMessage::new(
        match_id.clone(),
        "Match is on! Time to pay",
        format!("Match {match_id} has enough players. Pay your share of {amount_due} within {remaining} to keep your spot."),
    )
    .with_time_remaining(remaining)
}

/// Sent to every former participant when a window closes without enough paying players.
pub fn quorum_lost_notice(match_id: &MatchId) -> NotificationMessage {
    NotificationMessage::new(
        match_id.clone(),
        "Match restarted",
        format!("Match {match_id} restarted: no longer enough confirmed players, refunds issued."),
    )
}

/// Sent to players removed at hard lock while the match itself goes ahead.
pub fn evicted_notice(match_id: &MatchId) -> NotificationMessage {
    NotificationMessage::new(
        match_id.clone(),
        "Removed from match",
        format!("The payment window for match {match_id} closed before your payment arrived, so your spot was released."),
    )
}

pub fn cancelled_notice(match_id: &MatchId, reason: &str) -> NotificationMessage {
    NotificationMessage::new(
        match_id.clone(),
        "Match cancelled",
        format!("The organizer cancelled match {match_id} ({reason}). Any payment you made has been refunded."),
    )
}

pub fn confirmed_notice(match_id: &MatchId, final_share: Money) -> NotificationMessage {
    NotificationMessage::new(
        match_id.clone(),
        "Match confirmed",
        format!("The final team for match {match_id} is confirmed. Your final share is {final_share}."),
    )
}
