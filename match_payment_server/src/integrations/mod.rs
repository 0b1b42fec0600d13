//! Connections between the match payment engine and the outside world.
//!
//! * [`notifier`] delivers participant notifications, either to a webhook or to the log.
//! * [`lifecycle_events`] subscribes to the engine's lifecycle events and writes them to the audit log.
pub mod lifecycle_events;
pub mod notifier;
