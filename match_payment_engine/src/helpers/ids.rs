use std::fmt::Write;

use blake2::{Blake2b512, Digest};

use crate::db_types::{MatchId, UserId};

/// The deterministic identifier of the deadline reminder for `user_id` in `match_id`.
///
/// The id is the first 32 bytes of `Blake2b512(match_id || 0x00 || user_id)`, hex encoded. The separator keeps
/// `("ab", "c")` and `("a", "bc")` apart.
pub fn reminder_id(match_id: &MatchId, user_id: &UserId) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(match_id.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(user_id.as_str().as_bytes());
    let digest = hasher.finalize();
    digest[..32].iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// A fresh random idempotency key for capture calls that have no natural deterministic key (e.g. charges).
pub fn new_idempotency_key(prefix: &str) -> String {
    format!("{prefix}:{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>())
}
