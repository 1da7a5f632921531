//! # replaykeep-daemon
//!
//! Keeps a local archive of match summaries and replay files for a set of
//! tracked accounts.
//!
//! - [`sync::MatchSync`] runs one account's sync pass and serves reads that
//!   refresh stale accounts first.
//! - [`replay_store::ReplayStore`] publishes replay files atomically and
//!   decodes them back into chunks on demand.
//! - [`scheduler::Scheduler`] drives a pass over every tracked account on a
//!   fixed interval.

pub mod config;
pub mod error;
pub mod replay_store;
pub mod scheduler;
pub mod sync;

pub use config::DaemonConfig;
pub use error::{FetchError, LoadError, MatchError, SyncError};
