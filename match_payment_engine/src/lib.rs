//! Match Payment Engine
//!
//! The match payment engine runs the money side of a pickup sports match. Players join freely until the match has
//! enough of them, at which point it soft-locks and a payment window opens. Everyone who has paid by the time the
//! window closes is in; everyone else is evicted. If too few paid, the paying players are refunded and the match starts
//! over. Once the organizer confirms the final team, each player's share is settled against what they paid.
//!
//! The library is divided into a few sections:
//! 1. The payment flow engine ([`mod@flow`]). Pure functions that compute the next match state. No I/O.
//! 2. Deadline reminders ([`mod@reminders`]). A planner that decides when each participant is reminded about the
//!    payment deadline, and a scheduler that sweeps durable reminder rows and delivers them.
//! 3. Storage and collaborator contracts ([`mod@traits`]) and the SQLite backend that implements them.
//! 4. The public API ([`MatchFlowApi`]). The lifecycle state machine that ties the above together. It is the only
//!    writer of match payment state.
//!
//! The engine also emits events when a match changes stage, loses quorum, records a payment or is confirmed. A simple
//! actor framework ([`mod@events`]) lets you hook into these and perform custom actions.
pub mod db_types;
pub mod events;
pub mod flow;
pub mod helpers;
mod mpe_api;
pub mod reminders;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use mpe_api::{
    errors::MatchFlowError,
    flow_objects,
    match_flow_api::MatchFlowApi,
    MatchLocks,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, LedgerPaymentCapture, SqliteDatabase};
