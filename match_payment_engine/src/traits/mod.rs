//! # Storage and collaborator contracts
//!
//! The traits in this module define what the match payment engine needs from the outside world.
//!
//! * [`MatchStore`] persists match payment state. Writes are versioned: a commit only succeeds if nobody else has
//!   written the match since it was read.
//! * [`ReminderStore`] persists deadline reminder campaigns and hands out leased batches of due reminders to the
//!   sweep.
//! * [`NotificationDelivery`] and [`PaymentCapture`] are the outbound collaborators. The engine decides who is owed
//!   what and who to tell; these traits carry it out.
mod collaborators;
mod data_objects;
mod match_store;
mod reminder_store;

pub use collaborators::{
    CaptureError,
    ChargeRequest,
    DeliveryError,
    NotificationDelivery,
    PaymentCapture,
    RefundRequest,
    TopUpRequest,
};
pub use data_objects::{ReminderChange, TransitionCommit};
pub use match_store::{MatchBackend, MatchStore, StoreError};
pub use reminder_store::ReminderStore;
