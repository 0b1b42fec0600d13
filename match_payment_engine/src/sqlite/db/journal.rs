use chrono::{DateTime, Utc};
use log::debug;
use mp_common::Money;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{JournalEntry, JournalEntryKind, MatchId, UserId},
    helpers::{from_millis, to_millis},
    traits::StoreError,
};

#[derive(Debug, FromRow)]
struct JournalRow {
    transaction_ref: String,
    match_id: String,
    user_id: String,
    kind: String,
    amount: i64,
    idempotency_key: String,
    created_at: i64,
}

impl TryFrom<JournalRow> for JournalEntry {
    type Error = StoreError;

    fn try_from(row: JournalRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "Charge" => JournalEntryKind::Charge,
            "Refund" => JournalEntryKind::Refund,
            "TopUpRequest" => JournalEntryKind::TopUpRequest,
            k => return Err(StoreError::CorruptRecord(format!("Unknown journal entry kind: {k}"))),
        };
        Ok(JournalEntry {
            transaction_ref: row.transaction_ref,
            match_id: MatchId(row.match_id),
            user_id: UserId(row.user_id),
            kind,
            amount: Money::from(row.amount),
            idempotency_key: row.idempotency_key,
            created_at: from_millis(row.created_at),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub match_id: MatchId,
    pub user_id: UserId,
    pub kind: JournalEntryKind,
    pub amount: Money,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// Records the entry unless one with the same idempotency key already exists. Either way, returns the stored entry
/// and whether it was newly inserted.
pub async fn idempotent_insert(
    entry: NewJournalEntry,
    conn: &mut SqliteConnection,
) -> Result<(JournalEntry, bool), StoreError> {
    let transaction_ref = format!("{}-{:016x}", ref_prefix(entry.kind), rand::random::<u64>());
    let result = sqlx::query(
        r#"
            INSERT INTO payment_journal (transaction_ref, match_id, user_id, kind, amount, idempotency_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (idempotency_key) DO NOTHING
        "#,
    )
    .bind(&transaction_ref)
    .bind(entry.match_id.as_str())
    .bind(entry.user_id.as_str())
    .bind(entry.kind.to_string())
    .bind(entry.amount.value())
    .bind(entry.idempotency_key.as_str())
    .bind(to_millis(entry.created_at))
    .execute(&mut *conn)
    .await?;
    let inserted = result.rows_affected() == 1;
    let stored = fetch_by_key(&entry.idempotency_key, conn)
        .await?
        .ok_or_else(|| StoreError::DatabaseError(format!("Journal entry {} vanished", entry.idempotency_key)))?;
    if inserted {
        debug!(
            "🗃️ {} of {} for {} in {} journaled as {}",
            stored.kind, stored.amount, stored.user_id, stored.match_id, stored.transaction_ref
        );
    } else {
        debug!("🗃️ Duplicate request {} resolved to {}", entry.idempotency_key, stored.transaction_ref);
    }
    Ok((stored, inserted))
}

fn ref_prefix(kind: JournalEntryKind) -> &'static str {
    match kind {
        JournalEntryKind::Charge => "ch",
        JournalEntryKind::Refund => "rf",
        JournalEntryKind::TopUpRequest => "tu",
    }
}

pub async fn fetch_by_key(key: &str, conn: &mut SqliteConnection) -> Result<Option<JournalEntry>, StoreError> {
    let row: Option<JournalRow> = sqlx::query_as("SELECT * FROM payment_journal WHERE idempotency_key = $1")
        .bind(key)
        .fetch_optional(conn)
        .await?;
    row.map(JournalEntry::try_from).transpose()
}

pub async fn fetch_for_match(match_id: &MatchId, conn: &mut SqliteConnection) -> Result<Vec<JournalEntry>, StoreError> {
    let rows: Vec<JournalRow> =
        sqlx::query_as("SELECT * FROM payment_journal WHERE match_id = $1 ORDER BY created_at, rowid")
            .bind(match_id.as_str())
            .fetch_all(conn)
            .await?;
    rows.into_iter().map(JournalEntry::try_from).collect()
}
