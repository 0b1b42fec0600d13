//! SQLite backend for the match payment engine.
mod ledger_capture;
mod sqlite_impl;

pub mod db;
pub use ledger_capture::LedgerPaymentCapture;
pub use sqlite_impl::SqliteDatabase;
