//! Domain model structs persisted in the local database.
//!
//! [`Participant`] deserializes straight from the upstream match-detail
//! participant records (camelCase keys, unknown keys ignored).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Match summary
// ---------------------------------------------------------------------------

/// Top-level metadata for one match. The primary key is the numeric upstream
/// match id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub id: i64,
    /// Epoch seconds. `None` marks a placeholder row whose summary has not
    /// been fetched yet.
    pub started_at: Option<i64>,
    pub duration_secs: Option<i64>,
    pub queue_id: Option<i64>,
    pub replay_synced: bool,
}

impl MatchSummary {
    /// Whether the summary itself has been fetched from upstream.
    pub fn is_fetched(&self) -> bool {
        self.started_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// One player's statistics within a match, keyed by `(match id,
/// participant_id)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Participant {
    /// 1-based position within the match.
    pub participant_id: i64,
    pub champion_id: i64,
    pub champ_level: i64,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub total_minions_killed: i64,
    pub double_kills: i64,
    pub triple_kills: i64,
    pub quadra_kills: i64,
    pub penta_kills: i64,
    pub item0: i64,
    pub item1: i64,
    pub item2: i64,
    pub item3: i64,
    pub item4: i64,
    pub item5: i64,
    pub item6: i64,
    pub summoner1_id: i64,
    pub summoner2_id: i64,
    pub lane: String,
    pub puuid: String,
    pub riot_id_game_name: String,
    pub riot_id_tagline: String,
    pub total_damage_dealt_to_champions: i64,
    pub total_damage_taken: i64,
    pub win: bool,
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// A summary together with its participants, ordered by `participant_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Match {
    pub summary: MatchSummary,
    pub participants: Vec<Participant>,
}

// ---------------------------------------------------------------------------
// Tracked account
// ---------------------------------------------------------------------------

/// An upstream player account whose match history is synced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackedAccount {
    /// Upstream player identifier (primary key).
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    /// Platform region code, e.g. `"EUW"`.
    pub region: String,
    /// End of the last sync pass. `None` if the account was never synced.
    pub synced_at: Option<DateTime<Utc>>,
    pub tracked: bool,
}
