//! Helpers for tests that exercise the engine against a real SQLite database.
pub mod prepare_env;
mod recorders;

pub use recorders::{CaptureCall, RecordingCapture, RecordingNotifier, SentNotification};
