//! # Payment flow engine
//!
//! Pure calculations over a [`MatchPaymentState`]. Nothing in this module performs I/O, reads the clock, or knows
//! about reminders: callers pass `now` in and persist whatever comes back. Every function consumes the state and
//! returns the next one, so an error leaves the caller's copy untouched.
//!
//! The orchestrator ([`crate::MatchFlowApi`]) sequences these calls against participant events.
//!
//! [`MatchPaymentState`]: crate::db_types::MatchPaymentState
mod engine;
mod errors;
mod policy;

pub use engine::{
    cancel,
    confirm_final_team,
    enter_hard_lock,
    enter_soft_lock,
    evaluate_join,
    new_match,
    open_payment_window,
    record_payment,
    remove_participant,
    CancelOutcome,
    ConfirmOutcome,
    HardLockOutcome,
    JoinOutcome,
};
pub use errors::PaymentFlowError;
pub use policy::compute_window_duration;
