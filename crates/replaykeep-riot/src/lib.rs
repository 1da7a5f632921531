//! # replaykeep-riot
//!
//! Thin client for the upstream match API.
//!
//! - [`Region`] maps platform codes to the regional routing hosts.
//! - [`MatchApi`] is the seam the sync orchestrator depends on; [`RiotClient`]
//!   is the HTTP implementation.
//! - [`MatchDetail`] is the wire shape of the match-detail endpoint and
//!   converts into the store's records.

pub mod client;
pub mod models;
pub mod region;

mod error;

pub use client::{MatchApi, RiotClient, API_KEY_HEADER, DEFAULT_TIMEOUT};
pub use error::{ApiError, Result};
pub use models::{MatchDetail, MatchInfo, ReplayList};
pub use region::{Region, RegionalRoute};
