//! # replaykeep-store
//!
//! Local match history storage, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for match summaries,
//! their participants and the tracked accounts whose history is synced.
//! Multi-row writes go through a single transaction so a match is never
//! visible without its participants.

pub mod accounts;
pub mod database;
pub mod executor;
pub mod filter;
pub mod matches;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::{Result, StoreError, UpsertRow};
pub use executor::Executor;
pub use filter::MatchFilter;
pub use matches::MatchField;
pub use models::*;
