use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{MatchId, MatchStage, StageChange, StageLogEntry},
    helpers::{from_millis, to_millis},
    traits::StoreError,
};

#[derive(Debug, FromRow)]
struct StageLogRow {
    id: i64,
    match_id: String,
    from_stage: String,
    to_stage: String,
    reason: String,
    created_at: i64,
}

impl TryFrom<StageLogRow> for StageLogEntry {
    type Error = StoreError;

    fn try_from(row: StageLogRow) -> Result<Self, Self::Error> {
        let parse = |s: &str| s.parse::<MatchStage>().map_err(|e| StoreError::CorruptRecord(format!("{e}")));
        Ok(StageLogEntry {
            id: row.id,
            match_id: MatchId(row.match_id),
            from_stage: parse(&row.from_stage)?,
            to_stage: parse(&row.to_stage)?,
            reason: row.reason,
            created_at: from_millis(row.created_at),
        })
    }
}

pub async fn append(
    match_id: &MatchId,
    change: &StageChange,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO match_stage_log (match_id, from_stage, to_stage, reason, created_at) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(match_id.as_str())
    .bind(change.from.to_string())
    .bind(change.to.to_string())
    .bind(change.reason.as_str())
    .bind(to_millis(at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_for_match(match_id: &MatchId, conn: &mut SqliteConnection) -> Result<Vec<StageLogEntry>, StoreError> {
    let rows: Vec<StageLogRow> = sqlx::query_as("SELECT * FROM match_stage_log WHERE match_id = $1 ORDER BY id")
        .bind(match_id.as_str())
        .fetch_all(conn)
        .await?;
    rows.into_iter().map(StageLogEntry::try_from).collect()
}
