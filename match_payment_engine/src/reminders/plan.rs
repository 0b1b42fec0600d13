use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{ConversionError, MatchId, UserId},
    helpers::reminder_id,
};

/// The events in a reminder campaign, in the order they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReminderKind {
    SevenDay,
    ThreeDay,
    OneDay,
    Hourly,
    DeadlineReached,
}

impl ReminderKind {
    /// How far before the deadline a fixed-offset reminder fires.
    pub fn offset(&self) -> Option<Duration> {
        match self {
            ReminderKind::SevenDay => Some(Duration::days(7)),
            ReminderKind::ThreeDay => Some(Duration::days(3)),
            ReminderKind::OneDay => Some(Duration::days(1)),
            ReminderKind::Hourly | ReminderKind::DeadlineReached => None,
        }
    }
}

impl Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderKind::SevenDay => write!(f, "SevenDay"),
            ReminderKind::ThreeDay => write!(f, "ThreeDay"),
            ReminderKind::OneDay => write!(f, "OneDay"),
            ReminderKind::Hourly => write!(f, "Hourly"),
            ReminderKind::DeadlineReached => write!(f, "DeadlineReached"),
        }
    }
}

impl FromStr for ReminderKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SevenDay" => Ok(Self::SevenDay),
            "ThreeDay" => Ok(Self::ThreeDay),
            "OneDay" => Ok(Self::OneDay),
            "Hourly" => Ok(Self::Hourly),
            "DeadlineReached" => Ok(Self::DeadlineReached),
            s => Err(ConversionError::new(format!("Invalid reminder kind: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderStatus {
    Active,
    /// The deadline has been reached and announced. Nothing further will fire.
    Retired,
    Cancelled,
}

impl Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderStatus::Active => write!(f, "Active"),
            ReminderStatus::Retired => write!(f, "Retired"),
            ReminderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for ReminderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Retired" => Ok(Self::Retired),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError::new(format!("Invalid reminder status: {s}"))),
        }
    }
}

/// Which reminders were armed when the campaign was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmedOffsets {
    pub seven_day: bool,
    pub three_day: bool,
    pub one_day: bool,
    pub hourly: bool,
}

/// What has fired so far.
///
/// Fixed offsets record when they were marked. `hourly` records the scheduled tick time of every hourly reminder
/// that was delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggeredOffsets {
    pub seven_day: Option<DateTime<Utc>>,
    pub three_day: Option<DateTime<Utc>>,
    pub one_day: Option<DateTime<Utc>>,
    pub hourly: Vec<DateTime<Utc>>,
    pub deadline_reached: Option<DateTime<Utc>>,
}

/// The reminder campaign for one participant in one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineReminder {
    pub reminder_id: String,
    pub match_id: MatchId,
    pub user_id: UserId,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub scheduled: ArmedOffsets,
    pub triggered: TriggeredOffsets,
    /// Hourly ticks are counted from here. Set when the one-day reminder fires, or at creation when the deadline is
    /// already less than a day away.
    pub hourly_since: Option<DateTime<Utc>>,
    pub status: ReminderStatus,
    pub next_fire_at: Option<DateTime<Utc>>,
    pub next_kind: Option<ReminderKind>,
}

impl DeadlineReminder {
    pub fn is_active(&self) -> bool {
        self.status == ReminderStatus::Active
    }

    fn fixed_offsets(&self) -> [(ReminderKind, bool, Option<DateTime<Utc>>); 3] {
        [
            (ReminderKind::SevenDay, self.scheduled.seven_day, self.triggered.seven_day),
            (ReminderKind::ThreeDay, self.scheduled.three_day, self.triggered.three_day),
            (ReminderKind::OneDay, self.scheduled.one_day, self.triggered.one_day),
        ]
    }

    fn mark_fixed(&mut self, kind: ReminderKind, now: DateTime<Utc>) {
        match kind {
            ReminderKind::SevenDay => self.triggered.seven_day = Some(now),
            ReminderKind::ThreeDay => self.triggered.three_day = Some(now),
            ReminderKind::OneDay => {
                self.triggered.one_day = Some(now);
                if self.hourly_since.is_none() {
                    self.hourly_since = Some(now);
                }
            },
            _ => {},
        }
    }

    fn hourly_anchor(&self) -> DateTime<Utc> {
        self.hourly_since.unwrap_or(self.deadline - Duration::days(1))
    }
}

/// Pure planning functions for a [`DeadlineReminder`]. None of these perform I/O.
pub struct ReminderPlan;

impl ReminderPlan {
    /// Arms a new campaign.
    ///
    /// A fixed offset is armed only if it falls strictly after `now`. Hourly reminders are armed whenever the deadline
    /// is still in the future, and start immediately if the deadline is less than a day away.
    pub fn create(match_id: &MatchId, user_id: &UserId, deadline: DateTime<Utc>, now: DateTime<Utc>) -> DeadlineReminder {
        let armed = |kind: ReminderKind| kind.offset().map(|o| deadline - o > now).unwrap_or(false);
        let scheduled = ArmedOffsets {
            seven_day: armed(ReminderKind::SevenDay),
            three_day: armed(ReminderKind::ThreeDay),
            one_day: armed(ReminderKind::OneDay),
            hourly: deadline > now,
        };
        let hourly_since = (deadline - now <= Duration::days(1)).then_some(now);
        let mut reminder = DeadlineReminder {
            reminder_id: reminder_id(match_id, user_id),
            match_id: match_id.clone(),
            user_id: user_id.clone(),
            deadline,
            created_at: now,
            scheduled,
            triggered: TriggeredOffsets::default(),
            hourly_since,
            status: ReminderStatus::Active,
            next_fire_at: None,
            next_kind: None,
        };
        Self::refresh_schedule(&mut reminder);
        trace!(
            "⏰️ Reminder campaign for {user_id} in {match_id} armed. Next: {:?} at {:?}",
            reminder.next_kind,
            reminder.next_fire_at
        );
        reminder
    }

    /// The next event this reminder will produce, if any.
    pub fn next_event(reminder: &DeadlineReminder) -> Option<(DateTime<Utc>, ReminderKind)> {
        if !reminder.is_active() {
            return None;
        }
        for (kind, armed, fired) in reminder.fixed_offsets() {
            if armed && fired.is_none() {
                let offset = kind.offset()?;
                return Some((reminder.deadline - offset, kind));
            }
        }
        if reminder.scheduled.hourly {
            if let Some(tick) = Self::next_hourly_tick(reminder) {
                return Some((tick, ReminderKind::Hourly));
            }
        }
        match reminder.triggered.deadline_reached {
            None => Some((reminder.deadline, ReminderKind::DeadlineReached)),
            Some(_) => None,
        }
    }

    /// Marks every event due at `now` and returns the single event that should be delivered.
    ///
    /// After an outage several events may be due at once. Older fixed offsets are marked without delivery and
    /// missed hourly ticks collapse into the most recent one, so the participant receives one message per sweep.
    pub fn fire(mut reminder: DeadlineReminder, now: DateTime<Utc>) -> (DeadlineReminder, Option<ReminderKind>) {
        let mut deliver = None;
        while let Some((at, kind)) = Self::next_event(&reminder) {
            if at > now {
                break;
            }
            match kind {
                ReminderKind::SevenDay | ReminderKind::ThreeDay | ReminderKind::OneDay => {
                    reminder.mark_fixed(kind, now);
                },
                ReminderKind::Hourly => {
                    let tick = Self::latest_hourly_tick(&reminder, now).unwrap_or(at).max(at);
                    reminder.triggered.hourly.push(tick);
                },
                ReminderKind::DeadlineReached => {
                    reminder.triggered.deadline_reached = Some(now);
                    reminder.status = ReminderStatus::Retired;
                },
            }
            if let Some(skipped) = deliver.replace(kind) {
                debug!("⏰️ {skipped} reminder for {} was missed and superseded by {kind}", reminder.user_id);
            }
        }
        Self::refresh_schedule(&mut reminder);
        (reminder, deliver)
    }

    /// Recomputes the denormalised `next_fire_at` and `next_kind` fields used by the sweep query.
    pub fn refresh_schedule(reminder: &mut DeadlineReminder) {
        let next = Self::next_event(reminder);
        reminder.next_fire_at = next.map(|(t, _)| t);
        reminder.next_kind = next.map(|(_, k)| k);
    }

    fn next_hourly_tick(reminder: &DeadlineReminder) -> Option<DateTime<Utc>> {
        let since = reminder.hourly_anchor();
        let after = reminder.triggered.hourly.last().copied().unwrap_or(since).max(since);
        let elapsed_hours = (after - since).num_seconds() / 3600;
        let tick = since + Duration::hours(elapsed_hours + 1);
        (tick < reminder.deadline).then_some(tick)
    }

    /// The most recent hourly tick at or before `now` that is still strictly before the deadline.
    fn latest_hourly_tick(reminder: &DeadlineReminder, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let since = reminder.hourly_anchor();
        let last_possible = reminder.deadline - Duration::nanoseconds(1);
        let until = now.min(last_possible);
        let hours = (until - since).num_seconds() / 3600;
        (hours >= 1).then(|| since + Duration::hours(hours))
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn new_reminder(deadline: DateTime<Utc>) -> DeadlineReminder {
        ReminderPlan::create(&MatchId::from("m1"), &UserId::from("alice"), deadline, t0())
    }

    /// Fires at each scheduled time in turn and records what was delivered.
    fn run_to_completion(mut r: DeadlineReminder) -> Vec<(DateTime<Utc>, ReminderKind)> {
        let mut delivered = Vec::new();
        while let Some((at, _)) = ReminderPlan::next_event(&r) {
            let (next, kind) = ReminderPlan::fire(r, at);
            if let Some(kind) = kind {
                delivered.push((at, kind));
            }
            r = next;
        }
        assert_eq!(r.status, ReminderStatus::Retired);
        delivered
    }

    #[test]
    fn ten_day_campaign() {
        let deadline = t0() + Duration::days(10);
        let r = new_reminder(deadline);
        assert_eq!(r.scheduled, ArmedOffsets { seven_day: true, three_day: true, one_day: true, hourly: true });
        assert_eq!(r.next_fire_at, Some(t0() + Duration::days(3)));
        assert_eq!(r.next_kind, Some(ReminderKind::SevenDay));

        let delivered = run_to_completion(r);
        assert_eq!(delivered[0], (t0() + Duration::days(3), ReminderKind::SevenDay));
        assert_eq!(delivered[1], (t0() + Duration::days(7), ReminderKind::ThreeDay));
        assert_eq!(delivered[2], (t0() + Duration::days(9), ReminderKind::OneDay));
        let hourly = delivered.iter().filter(|(_, k)| *k == ReminderKind::Hourly).collect::<Vec<_>>();
        assert_eq!(hourly.len(), 23);
        assert_eq!(hourly[0].0, t0() + Duration::days(9) + Duration::hours(1));
        assert_eq!(hourly[22].0, t0() + Duration::days(9) + Duration::hours(23));
        assert_eq!(delivered.last(), Some(&(deadline, ReminderKind::DeadlineReached)));
        assert_eq!(delivered.iter().filter(|(_, k)| *k == ReminderKind::DeadlineReached).count(), 1);
        assert_eq!(delivered.len(), 3 + 23 + 1);
    }

    #[test]
    fn short_window_goes_straight_to_hourly() {
        let r = new_reminder(t0() + Duration::minutes(90));
        assert!(!r.scheduled.seven_day && !r.scheduled.three_day && !r.scheduled.one_day);
        assert!(r.scheduled.hourly);
        assert_eq!(r.hourly_since, Some(t0()));
        let delivered = run_to_completion(r);
        assert_eq!(delivered, vec![
            (t0() + Duration::hours(1), ReminderKind::Hourly),
            (t0() + Duration::minutes(90), ReminderKind::DeadlineReached),
        ]);
    }

    #[test]
    fn offsets_in_the_past_are_not_armed() {
        let r = new_reminder(t0() + Duration::days(5));
        assert!(!r.scheduled.seven_day);
        assert!(r.scheduled.three_day);
        assert!(r.scheduled.one_day);
        // Exactly seven days away: the offset would fire at creation, which is not strictly after now
        let r = new_reminder(t0() + Duration::days(7));
        assert!(!r.scheduled.seven_day);
    }

    #[test]
    fn missed_offsets_collapse_to_the_latest() {
        let deadline = t0() + Duration::days(10);
        let r = new_reminder(deadline);
        // Down from day 2 until day 8
        let (r, kind) = ReminderPlan::fire(r, t0() + Duration::days(8));
        assert_eq!(kind, Some(ReminderKind::ThreeDay));
        assert!(r.triggered.seven_day.is_some());
        assert!(r.triggered.three_day.is_some());
        assert_eq!(r.next_kind, Some(ReminderKind::OneDay));
        // Firing again at the same instant delivers nothing
        let (r, kind) = ReminderPlan::fire(r, t0() + Duration::days(8));
        assert_eq!(kind, None);
        assert_eq!(r.next_fire_at, Some(t0() + Duration::days(9)));
    }

    #[test]
    fn missed_hourly_ticks_collapse() {
        let deadline = t0() + Duration::hours(10);
        let r = new_reminder(deadline);
        let (r, kind) = ReminderPlan::fire(r, t0() + Duration::hours(5) + Duration::minutes(30));
        assert_eq!(kind, Some(ReminderKind::Hourly));
        assert_eq!(r.triggered.hourly, vec![t0() + Duration::hours(5)]);
        assert_eq!(r.next_fire_at, Some(t0() + Duration::hours(6)));
    }

    #[test]
    fn outage_past_deadline_delivers_deadline_once() {
        let deadline = t0() + Duration::days(2);
        let r = new_reminder(deadline);
        let (r, kind) = ReminderPlan::fire(r, deadline + Duration::hours(3));
        assert_eq!(kind, Some(ReminderKind::DeadlineReached));
        assert_eq!(r.status, ReminderStatus::Retired);
        assert_eq!(r.next_fire_at, None);
        let (_, kind) = ReminderPlan::fire(r, deadline + Duration::hours(4));
        assert_eq!(kind, None);
    }

    #[test]
    fn cancelled_reminders_never_fire() {
        let mut r = new_reminder(t0() + Duration::hours(3));
        r.status = ReminderStatus::Cancelled;
        assert_eq!(ReminderPlan::next_event(&r), None);
        let (_, kind) = ReminderPlan::fire(r, t0() + Duration::days(1));
        assert_eq!(kind, None);
    }

    #[test]
    fn past_deadline_only_announces_deadline() {
        let r = new_reminder(t0() - Duration::minutes(1));
        assert!(!r.scheduled.hourly);
        assert_eq!(r.next_kind, Some(ReminderKind::DeadlineReached));
    }
}
