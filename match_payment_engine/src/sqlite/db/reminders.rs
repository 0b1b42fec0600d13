use chrono::{DateTime, Duration, Utc};
use log::trace;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{MatchId, UserId},
    helpers::{from_millis, to_millis},
    reminders::{ArmedOffsets, DeadlineReminder, ReminderKind, ReminderStatus, TriggeredOffsets},
    traits::StoreError,
};

#[derive(Debug, FromRow)]
struct ReminderRow {
    reminder_id: String,
    match_id: String,
    user_id: String,
    deadline: i64,
    created_at: i64,
    armed_seven_day: bool,
    armed_three_day: bool,
    armed_one_day: bool,
    armed_hourly: bool,
    fired_seven_day: Option<i64>,
    fired_three_day: Option<i64>,
    fired_one_day: Option<i64>,
    hourly_fired: String,
    deadline_fired_at: Option<i64>,
    hourly_since: Option<i64>,
    status: String,
    next_fire_at: Option<i64>,
    next_kind: Option<String>,
}

impl TryFrom<ReminderRow> for DeadlineReminder {
    type Error = StoreError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let corrupt = |e: String| StoreError::CorruptRecord(format!("reminder {}: {e}", row.reminder_id));
        let hourly: Vec<i64> = serde_json::from_str(&row.hourly_fired).map_err(|e| corrupt(e.to_string()))?;
        let status = row.status.parse::<ReminderStatus>().map_err(|e| corrupt(e.to_string()))?;
        let next_kind = match row.next_kind.as_deref() {
            Some(k) => Some(k.parse::<ReminderKind>().map_err(|e| corrupt(e.to_string()))?),
            None => None,
        };
        Ok(DeadlineReminder {
            reminder_id: row.reminder_id,
            match_id: MatchId(row.match_id),
            user_id: UserId(row.user_id),
            deadline: from_millis(row.deadline),
            created_at: from_millis(row.created_at),
            scheduled: ArmedOffsets {
                seven_day: row.armed_seven_day,
                three_day: row.armed_three_day,
                one_day: row.armed_one_day,
                hourly: row.armed_hourly,
            },
            triggered: TriggeredOffsets {
                seven_day: row.fired_seven_day.map(from_millis),
                three_day: row.fired_three_day.map(from_millis),
                one_day: row.fired_one_day.map(from_millis),
                hourly: hourly.into_iter().map(from_millis).collect(),
                deadline_reached: row.deadline_fired_at.map(from_millis),
            },
            hourly_since: row.hourly_since.map(from_millis),
            status,
            next_fire_at: row.next_fire_at.map(from_millis),
            next_kind,
        })
    }
}

fn hourly_json(reminder: &DeadlineReminder) -> Result<String, StoreError> {
    let ticks = reminder.triggered.hourly.iter().copied().map(to_millis).collect::<Vec<i64>>();
    serde_json::to_string(&ticks).map_err(|e| StoreError::CorruptRecord(e.to_string()))
}

/// Inserts the reminder, or replaces the existing campaign with the same id. Replacing drops any lease.
pub async fn upsert(reminder: &DeadlineReminder, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let hourly = hourly_json(reminder)?;
    sqlx::query(
        r#"
            INSERT INTO deadline_reminders (
                reminder_id,
                match_id,
                user_id,
                deadline,
                created_at,
                armed_seven_day,
                armed_three_day,
                armed_one_day,
                armed_hourly,
                fired_seven_day,
                fired_three_day,
                fired_one_day,
                hourly_fired,
                deadline_fired_at,
                hourly_since,
                status,
                next_fire_at,
                next_kind,
                lease_owner,
                lease_expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, NULL, NULL)
            ON CONFLICT (reminder_id) DO UPDATE SET
                deadline = excluded.deadline,
                created_at = excluded.created_at,
                armed_seven_day = excluded.armed_seven_day,
                armed_three_day = excluded.armed_three_day,
                armed_one_day = excluded.armed_one_day,
                armed_hourly = excluded.armed_hourly,
                fired_seven_day = excluded.fired_seven_day,
                fired_three_day = excluded.fired_three_day,
                fired_one_day = excluded.fired_one_day,
                hourly_fired = excluded.hourly_fired,
                deadline_fired_at = excluded.deadline_fired_at,
                hourly_since = excluded.hourly_since,
                status = excluded.status,
                next_fire_at = excluded.next_fire_at,
                next_kind = excluded.next_kind,
                lease_owner = NULL,
                lease_expires_at = NULL
        "#,
    )
    .bind(reminder.reminder_id.as_str())
    .bind(reminder.match_id.as_str())
    .bind(reminder.user_id.as_str())
    .bind(to_millis(reminder.deadline))
    .bind(to_millis(reminder.created_at))
    .bind(reminder.scheduled.seven_day)
    .bind(reminder.scheduled.three_day)
    .bind(reminder.scheduled.one_day)
    .bind(reminder.scheduled.hourly)
    .bind(reminder.triggered.seven_day.map(to_millis))
    .bind(reminder.triggered.three_day.map(to_millis))
    .bind(reminder.triggered.one_day.map(to_millis))
    .bind(hourly)
    .bind(reminder.triggered.deadline_reached.map(to_millis))
    .bind(reminder.hourly_since.map(to_millis))
    .bind(reminder.status.to_string())
    .bind(reminder.next_fire_at.map(to_millis))
    .bind(reminder.next_kind.map(|k| k.to_string()))
    .execute(conn)
    .await?;
    trace!("🗃️ Reminder {} for {} saved", reminder.reminder_id, reminder.user_id);
    Ok(())
}

pub async fn fetch(
    match_id: &MatchId,
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<DeadlineReminder>, StoreError> {
    let row: Option<ReminderRow> =
        sqlx::query_as("SELECT * FROM deadline_reminders WHERE match_id = $1 AND user_id = $2")
            .bind(match_id.as_str())
            .bind(user_id.as_str())
            .fetch_optional(conn)
            .await?;
    row.map(DeadlineReminder::try_from).transpose()
}

pub async fn fetch_for_match(
    match_id: &MatchId,
    conn: &mut SqliteConnection,
) -> Result<Vec<DeadlineReminder>, StoreError> {
    let rows: Vec<ReminderRow> = sqlx::query_as("SELECT * FROM deadline_reminders WHERE match_id = $1 ORDER BY user_id")
        .bind(match_id.as_str())
        .fetch_all(conn)
        .await?;
    rows.into_iter().map(DeadlineReminder::try_from).collect()
}

/// Cancels the participant's active campaign. Returns whether anything changed.
pub async fn cancel(match_id: &MatchId, user_id: &UserId, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
            UPDATE deadline_reminders
            SET status = 'Cancelled', next_fire_at = NULL, next_kind = NULL, lease_owner = NULL, lease_expires_at = NULL
            WHERE match_id = $1 AND user_id = $2 AND status = 'Active'
        "#,
    )
    .bind(match_id.as_str())
    .bind(user_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn cancel_for_match(match_id: &MatchId, conn: &mut SqliteConnection) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
            UPDATE deadline_reminders
            SET status = 'Cancelled', next_fire_at = NULL, next_kind = NULL, lease_owner = NULL, lease_expires_at = NULL
            WHERE match_id = $1 AND status = 'Active'
        "#,
    )
    .bind(match_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Leases up to `limit` due, active reminders to `owner`. A single UPDATE statement, so concurrent claimers can never
/// receive the same row while its lease is live.
pub async fn claim_due(
    now: DateTime<Utc>,
    owner: &str,
    lease: Duration,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DeadlineReminder>, StoreError> {
    let now_ms = to_millis(now);
    let rows: Vec<ReminderRow> = sqlx::query_as(
        r#"
            UPDATE deadline_reminders
            SET lease_owner = $1, lease_expires_at = $2
            WHERE reminder_id IN (
                SELECT reminder_id FROM deadline_reminders
                WHERE status = 'Active'
                  AND next_fire_at IS NOT NULL
                  AND next_fire_at <= $3
                  AND (lease_owner IS NULL OR lease_expires_at <= $3)
                ORDER BY next_fire_at
                LIMIT $4
            )
            RETURNING *
        "#,
    )
    .bind(owner)
    .bind(now_ms + lease.num_milliseconds())
    .bind(now_ms)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(DeadlineReminder::try_from).collect()
}

/// Writes the advanced reminder and clears the lease, provided `owner` still holds it and the campaign was not
/// cancelled in the meantime.
pub async fn complete_firing(
    reminder: &DeadlineReminder,
    owner: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, StoreError> {
    let hourly = hourly_json(reminder)?;
    let result = sqlx::query(
        r#"
            UPDATE deadline_reminders SET
                fired_seven_day = $1,
                fired_three_day = $2,
                fired_one_day = $3,
                hourly_fired = $4,
                deadline_fired_at = $5,
                hourly_since = $6,
                status = $7,
                next_fire_at = $8,
                next_kind = $9,
                lease_owner = NULL,
                lease_expires_at = NULL
            WHERE reminder_id = $10 AND lease_owner = $11 AND status = 'Active'
        "#,
    )
    .bind(reminder.triggered.seven_day.map(to_millis))
    .bind(reminder.triggered.three_day.map(to_millis))
    .bind(reminder.triggered.one_day.map(to_millis))
    .bind(hourly)
    .bind(reminder.triggered.deadline_reached.map(to_millis))
    .bind(reminder.hourly_since.map(to_millis))
    .bind(reminder.status.to_string())
    .bind(reminder.next_fire_at.map(to_millis))
    .bind(reminder.next_kind.map(|k| k.to_string()))
    .bind(reminder.reminder_id.as_str())
    .bind(owner)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
