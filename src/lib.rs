//! Bipolar slider polls with a median-based, soft-veto ranking computed once
//! at close.
//!
//! Ballots are stored per (poll, voter) in SQLite and replaced wholesale on
//! resubmission. Closing a poll runs [`voting::calculate_results`] over the
//! committed scores inside the same transaction that flips the poll status,
//! and freezes the outcome as a [`models::ResultSnapshot`].

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod tasks;
pub mod voting;

pub use error::{PollError, Result};
