//! # Match payment server
//! This crate hosts the HTTP server for the match payment engine. It is responsible for:
//! Accepting join, leave, payment and organizer requests and passing them to the match flow API.
//! Running the reminder worker, which delivers deadline reminders and closes expired payment windows.
//! Delivering participant notifications and logging lifecycle events.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/matches`: Creates a match.
//! * `/matches/{match_id}`: The current payment state of a match. `/stages` returns its stage history.
//! * `/matches/{match_id}/{join|leave|pay}`: Participant actions.
//! * `/matches/{match_id}/{expire|confirm|cancel}`: Organizer and operator actions.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod reminder_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
