//! Timestamps are persisted as integer milliseconds since the Unix epoch so that range queries on `next_fire_at` and
//! `payment_window_end` compare numerically.
use chrono::{DateTime, TimeZone, Utc};
use log::warn;

pub fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(|| {
        warn!("🗃️ Timestamp {ms} is out of range. Using the Unix epoch instead");
        DateTime::<Utc>::UNIX_EPOCH
    })
}
