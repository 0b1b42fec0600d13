//! # Match payment engine public API
//!
//! [`match_flow_api::MatchFlowApi`] is the lifecycle state machine. It is the only writer of match payment state: it
//! sequences the pure [`crate::flow`] functions against participant and organizer events, moves money through the
//! [`crate::traits::PaymentCapture`] collaborator, and arms or cancels reminder campaigns as the match changes stage.
//!
//! An API instance is created by supplying a backend that implements [`crate::traits::MatchStore`] and
//! [`crate::traits::ReminderStore`], plus the two outbound collaborators:
//!
//! ```rust,ignore
//! use match_payment_engine::{events::EventProducers, LedgerPaymentCapture, MatchFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let capture = LedgerPaymentCapture::new(db.clone());
//! let api = MatchFlowApi::new(db, my_notifier, capture, EventProducers::default());
//! let state = api.on_participant_join(&match_id, user_id).await?;
//! ```
pub mod errors;
pub mod flow_objects;
pub mod match_flow_api;
mod match_locks;

pub use match_locks::MatchLocks;
