//! v001 -- Initial schema creation.
//!
//! Creates `matches`, `participants` and `accounts`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Matches
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS matches (
    id            INTEGER PRIMARY KEY NOT NULL,  -- upstream numeric match id
    started_at    INTEGER,                       -- epoch seconds, NULL until the summary is fetched
    duration      INTEGER,                       -- seconds
    queue_id      INTEGER,
    replay_synced INTEGER NOT NULL DEFAULT 0     -- boolean 0/1
);

CREATE INDEX IF NOT EXISTS idx_matches_started_at ON matches(started_at DESC);

-- ----------------------------------------------------------------
-- Participants
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS participants (
    match_id                        INTEGER NOT NULL,
    participant_id                  INTEGER NOT NULL,
    champion_id                     INTEGER NOT NULL,
    champ_level                     INTEGER NOT NULL DEFAULT 1,
    kills                           INTEGER NOT NULL,
    deaths                          INTEGER NOT NULL,
    assists                         INTEGER NOT NULL,
    total_minions_killed            INTEGER NOT NULL,
    double_kills                    INTEGER NOT NULL,
    triple_kills                    INTEGER NOT NULL,
    quadra_kills                    INTEGER NOT NULL,
    penta_kills                     INTEGER NOT NULL,
    item0                           INTEGER NOT NULL,
    item1                           INTEGER NOT NULL,
    item2                           INTEGER NOT NULL,
    item3                           INTEGER NOT NULL,
    item4                           INTEGER NOT NULL,
    item5                           INTEGER NOT NULL,
    item6                           INTEGER NOT NULL,
    summoner1_id                    INTEGER NOT NULL,
    summoner2_id                    INTEGER NOT NULL,
    lane                            TEXT NOT NULL,
    puuid                           TEXT NOT NULL,
    riot_id_game_name               TEXT NOT NULL,
    riot_id_tagline                 TEXT NOT NULL,
    total_damage_dealt_to_champions INTEGER NOT NULL,
    total_damage_taken              INTEGER NOT NULL,
    win                             INTEGER NOT NULL,   -- boolean 0/1

    PRIMARY KEY (match_id, participant_id),
    FOREIGN KEY (match_id) REFERENCES matches(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_participants_puuid ON participants(puuid);

-- ----------------------------------------------------------------
-- Tracked accounts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS accounts (
    puuid     TEXT PRIMARY KEY NOT NULL,
    game_name TEXT NOT NULL,
    tag_line  TEXT NOT NULL,
    region    TEXT NOT NULL,                 -- platform region code, e.g. "EUW"
    synced_at INTEGER,                       -- epoch seconds of the last sync pass
    tracked   INTEGER NOT NULL DEFAULT 1     -- boolean 0/1
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
