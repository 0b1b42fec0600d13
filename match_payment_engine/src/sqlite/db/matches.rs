use chrono::{DateTime, Utc};
use log::{debug, trace};
use mp_common::Money;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{MatchId, MatchPaymentState, MatchStage, PaymentStatus, UserId},
    helpers::{from_millis, to_millis},
    traits::StoreError,
};

#[derive(Debug, FromRow)]
struct MatchRow {
    match_id: String,
    organizer_id: String,
    stage: String,
    min_players: i64,
    max_players: i64,
    current_player_count: i64,
    total_cost: i64,
    cost_per_player: i64,
    starts_at: i64,
    payment_window_start: Option<i64>,
    payment_window_end: Option<i64>,
    cancel_reason: Option<String>,
    version: i64,
    created_at: i64,
    updated_at: i64,
}

#[derive(Debug, FromRow)]
struct ParticipantRow {
    user_id: String,
    stage: String,
    amount_due: i64,
    amount_paid: i64,
    is_paid: bool,
    paid_at: Option<i64>,
    payment_deadline: Option<i64>,
    joined_at: i64,
    transaction_ref: Option<String>,
}

fn parse_stage(s: &str) -> Result<MatchStage, StoreError> {
    s.parse().map_err(|e| StoreError::CorruptRecord(format!("{e}")))
}

fn player_count(n: i64, field: &str) -> Result<u32, StoreError> {
    u32::try_from(n).map_err(|_| StoreError::CorruptRecord(format!("{field} is out of range: {n}")))
}

impl TryFrom<ParticipantRow> for PaymentStatus {
    type Error = StoreError;

    fn try_from(row: ParticipantRow) -> Result<Self, Self::Error> {
        Ok(PaymentStatus {
            user_id: UserId(row.user_id),
            stage: parse_stage(&row.stage)?,
            amount_due: Money::from(row.amount_due),
            amount_paid: Money::from(row.amount_paid),
            is_paid: row.is_paid,
            paid_at: row.paid_at.map(from_millis),
            payment_deadline: row.payment_deadline.map(from_millis),
            joined_at: from_millis(row.joined_at),
            transaction_ref: row.transaction_ref,
        })
    }
}

impl MatchRow {
    fn into_state(self, player_payments: Vec<PaymentStatus>) -> Result<MatchPaymentState, StoreError> {
        Ok(MatchPaymentState {
            match_id: MatchId(self.match_id),
            organizer_id: UserId(self.organizer_id),
            stage: parse_stage(&self.stage)?,
            min_players: player_count(self.min_players, "min_players")?,
            max_players: player_count(self.max_players, "max_players")?,
            current_player_count: player_count(self.current_player_count, "current_player_count")?,
            total_cost: Money::from(self.total_cost),
            cost_per_player: Money::from(self.cost_per_player),
            starts_at: from_millis(self.starts_at),
            payment_window_start: self.payment_window_start.map(from_millis),
            payment_window_end: self.payment_window_end.map(from_millis),
            player_payments,
            cancel_reason: self.cancel_reason,
            version: self.version,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
        })
    }
}

/// Inserts a new match and its participants. Fails if the match id already exists.
pub async fn insert_match(state: &MatchPaymentState, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    if match_exists(&state.match_id, conn).await? {
        return Err(StoreError::MatchAlreadyExists(state.match_id.clone()));
    }
    sqlx::query(
        r#"
            INSERT INTO matches (
                match_id,
                organizer_id,
                stage,
                min_players,
                max_players,
                current_player_count,
                total_cost,
                cost_per_player,
                starts_at,
                payment_window_start,
                payment_window_end,
                cancel_reason,
                version,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15);
        "#,
    )
    .bind(state.match_id.as_str())
    .bind(state.organizer_id.as_str())
    .bind(state.stage.to_string())
    .bind(i64::from(state.min_players))
    .bind(i64::from(state.max_players))
    .bind(i64::from(state.current_player_count))
    .bind(state.total_cost.value())
    .bind(state.cost_per_player.value())
    .bind(to_millis(state.starts_at))
    .bind(state.payment_window_start.map(to_millis))
    .bind(state.payment_window_end.map(to_millis))
    .bind(state.cancel_reason.as_deref())
    .bind(state.version)
    .bind(to_millis(state.created_at))
    .bind(to_millis(state.updated_at))
    .execute(&mut *conn)
    .await?;
    replace_participants(&state.match_id, &state.player_payments, conn).await?;
    debug!("🗃️ Match {} inserted", state.match_id);
    Ok(())
}

pub async fn match_exists(match_id: &MatchId, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let found: Option<(String,)> = sqlx::query_as("SELECT match_id FROM matches WHERE match_id = $1")
        .bind(match_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// Fetches the match and its participants, in join order.
pub async fn fetch_match(
    match_id: &MatchId,
    conn: &mut SqliteConnection,
) -> Result<Option<MatchPaymentState>, StoreError> {
    let row: Option<MatchRow> = sqlx::query_as("SELECT * FROM matches WHERE match_id = $1")
        .bind(match_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let participants = fetch_participants(match_id, conn).await?;
    row.into_state(participants).map(Some)
}

pub async fn fetch_participants(
    match_id: &MatchId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentStatus>, StoreError> {
    let rows: Vec<ParticipantRow> = sqlx::query_as("SELECT * FROM match_participants WHERE match_id = $1 ORDER BY seq")
        .bind(match_id.as_str())
        .fetch_all(conn)
        .await?;
    rows.into_iter().map(PaymentStatus::try_from).collect()
}

/// Writes the match columns if, and only if, the stored version is `expected_version`. Returns the new version.
///
/// This is not atomic with the participant rows. Call it inside a transaction together with
/// [`replace_participants`].
pub async fn update_match(
    state: &MatchPaymentState,
    expected_version: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, StoreError> {
    let result = sqlx::query(
        r#"
            UPDATE matches SET
                stage = $1,
                current_player_count = $2,
                cost_per_player = $3,
                payment_window_start = $4,
                payment_window_end = $5,
                cancel_reason = $6,
                updated_at = $7,
                version = version + 1
            WHERE match_id = $8 AND version = $9
        "#,
    )
    .bind(state.stage.to_string())
    .bind(i64::from(state.current_player_count))
    .bind(state.cost_per_player.value())
    .bind(state.payment_window_start.map(to_millis))
    .bind(state.payment_window_end.map(to_millis))
    .bind(state.cancel_reason.as_deref())
    .bind(to_millis(state.updated_at))
    .bind(state.match_id.as_str())
    .bind(expected_version)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return if match_exists(&state.match_id, conn).await? {
            trace!("🗃️ Version conflict on {} (expected {expected_version})", state.match_id);
            Err(StoreError::VersionConflict { match_id: state.match_id.clone(), expected: expected_version })
        } else {
            Err(StoreError::MatchNotFound(state.match_id.clone()))
        };
    }
    Ok(expected_version + 1)
}

/// Replaces the participant rows for the match with `participants`, preserving their order.
pub async fn replace_participants(
    match_id: &MatchId,
    participants: &[PaymentStatus],
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM match_participants WHERE match_id = $1").bind(match_id.as_str()).execute(&mut *conn).await?;
    for (seq, p) in participants.iter().enumerate() {
        sqlx::query(
            r#"
                INSERT INTO match_participants (
                    match_id,
                    user_id,
                    seq,
                    stage,
                    amount_due,
                    amount_paid,
                    is_paid,
                    paid_at,
                    payment_deadline,
                    joined_at,
                    transaction_ref
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11);
            "#,
        )
        .bind(match_id.as_str())
        .bind(p.user_id.as_str())
        .bind(seq as i64)
        .bind(p.stage.to_string())
        .bind(p.amount_due.value())
        .bind(p.amount_paid.value())
        .bind(p.is_paid)
        .bind(p.paid_at.map(to_millis))
        .bind(p.payment_deadline.map(to_millis))
        .bind(to_millis(p.joined_at))
        .bind(p.transaction_ref.as_deref())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Matches still taking payments whose window closed at or before `now`.
pub async fn fetch_expired_windows(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<MatchId>, StoreError> {
    let ids: Vec<(String,)> = sqlx::query_as(
        r#"
            SELECT match_id FROM matches
            WHERE stage IN ('SoftLock', 'PaymentWindow') AND payment_window_end <= $1
            ORDER BY payment_window_end
        "#,
    )
    .bind(to_millis(now))
    .fetch_all(conn)
    .await?;
    Ok(ids.into_iter().map(|(id,)| MatchId(id)).collect())
}
