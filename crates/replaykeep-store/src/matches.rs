use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};
use tracing::{debug, warn};

use crate::database::Database;
use crate::error::{Result, StoreError, UpsertRow};
use crate::executor::Executor;
use crate::filter::MatchFilter;
use crate::models::{Match, MatchSummary, Participant};

/// Largest page [`Database::list_matches`] returns.
pub const MAX_LIST_LIMIT: u32 = 100;

const UPSERT_SUMMARY_SQL: &str = "
    INSERT INTO matches (id, started_at, duration, queue_id, replay_synced)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (id) DO UPDATE SET
        started_at    = excluded.started_at,
        duration      = excluded.duration,
        queue_id      = excluded.queue_id,
        replay_synced = MAX(matches.replay_synced, excluded.replay_synced)";

const UPSERT_PARTICIPANT_SQL: &str = "
    INSERT INTO participants (
        match_id, participant_id, champion_id, champ_level, kills, deaths, assists,
        total_minions_killed, double_kills, triple_kills, quadra_kills, penta_kills,
        item0, item1, item2, item3, item4, item5, item6,
        summoner1_id, summoner2_id, lane, puuid, riot_id_game_name, riot_id_tagline,
        total_damage_dealt_to_champions, total_damage_taken, win
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
        ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28
    )
    ON CONFLICT (match_id, participant_id) DO UPDATE SET
        champion_id                     = excluded.champion_id,
        champ_level                     = excluded.champ_level,
        kills                           = excluded.kills,
        deaths                          = excluded.deaths,
        assists                         = excluded.assists,
        total_minions_killed            = excluded.total_minions_killed,
        double_kills                    = excluded.double_kills,
        triple_kills                    = excluded.triple_kills,
        quadra_kills                    = excluded.quadra_kills,
        penta_kills                     = excluded.penta_kills,
        item0                           = excluded.item0,
        item1                           = excluded.item1,
        item2                           = excluded.item2,
        item3                           = excluded.item3,
        item4                           = excluded.item4,
        item5                           = excluded.item5,
        item6                           = excluded.item6,
        summoner1_id                    = excluded.summoner1_id,
        summoner2_id                    = excluded.summoner2_id,
        lane                            = excluded.lane,
        puuid                           = excluded.puuid,
        riot_id_game_name               = excluded.riot_id_game_name,
        riot_id_tagline                 = excluded.riot_id_tagline,
        total_damage_dealt_to_champions = excluded.total_damage_dealt_to_champions,
        total_damage_taken              = excluded.total_damage_taken,
        win                             = excluded.win";

const MATCH_COLUMNS: &str = "
    m.id, m.started_at, m.duration, m.queue_id, m.replay_synced,
    p.match_id, p.participant_id, p.champion_id, p.champ_level, p.kills, p.deaths, p.assists,
    p.total_minions_killed, p.double_kills, p.triple_kills, p.quadra_kills, p.penta_kills,
    p.item0, p.item1, p.item2, p.item3, p.item4, p.item5, p.item6,
    p.summoner1_id, p.summoner2_id, p.lane, p.puuid, p.riot_id_game_name, p.riot_id_tagline,
    p.total_damage_dealt_to_champions, p.total_damage_taken, p.win";

/// A column of `matches` that may be targeted by
/// [`Database::update_match_fields`], together with its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    StartedAt(Option<i64>),
    Duration(Option<i64>),
    QueueId(Option<i64>),
    ReplaySynced(bool),
}

impl MatchField {
    pub fn column(&self) -> &'static str {
        match self {
            MatchField::StartedAt(_) => "started_at",
            MatchField::Duration(_) => "duration",
            MatchField::QueueId(_) => "queue_id",
            MatchField::ReplaySynced(_) => "replay_synced",
        }
    }

    fn value(&self) -> Value {
        match *self {
            MatchField::StartedAt(v) | MatchField::Duration(v) | MatchField::QueueId(v) => {
                v.map_or(Value::Null, Value::Integer)
            }
            MatchField::ReplaySynced(v) => Value::Integer(v.into()),
        }
    }
}

impl Database {
    /// Insert or update a single summary row outside of any transaction.
    pub fn upsert_match_summary(&self, summary: &MatchSummary) -> Result<()> {
        upsert_summary(self.conn(), summary).map_err(|source| StoreError::Upsert {
            match_id: summary.id,
            row: UpsertRow::Summary,
            source,
        })?;
        Ok(())
    }

    /// Atomically upsert a summary and all of its participants.
    ///
    /// The summary row is written first, then each participant in order. On
    /// any failure the transaction is rolled back and the error names the
    /// failing row.
    pub fn upsert_match_with_participants(
        &mut self,
        summary: &MatchSummary,
        participants: &[Participant],
    ) -> Result<()> {
        let match_id = summary.id;
        let tx = self.conn_mut().transaction()?;

        upsert_summary(&tx, summary).map_err(|source| {
            warn!(match_id, error = %source, "summary upsert failed, rolling back");
            StoreError::Upsert {
                match_id,
                row: UpsertRow::Summary,
                source,
            }
        })?;

        for (index, participant) in participants.iter().enumerate() {
            upsert_participant(&tx, match_id, participant).map_err(|source| {
                warn!(
                    match_id,
                    index,
                    participant_id = participant.participant_id,
                    error = %source,
                    "participant upsert failed, rolling back"
                );
                StoreError::Upsert {
                    match_id,
                    row: UpsertRow::Participant {
                        index,
                        participant_id: participant.participant_id,
                    },
                    source,
                }
            })?;
        }

        tx.commit()?;

        debug!(
            match_id,
            participants = participants.len(),
            "upserted match with participants"
        );
        Ok(())
    }

    /// Set the given columns of one match. Returns whether a row was changed.
    ///
    /// An empty field list is a no-op; naming a column twice is rejected.
    pub fn update_match_fields(&self, match_id: i64, fields: &[MatchField]) -> Result<bool> {
        update_fields(self.conn(), match_id, fields)
    }

    /// Record that the replay for `match_id` is stored, creating a bare
    /// placeholder row if the summary has not been ingested.
    pub fn mark_replay_synced(&mut self, match_id: i64) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO matches (id) VALUES (?1)",
            params![match_id],
        )?;
        update_fields(&tx, match_id, &[MatchField::ReplaySynced(true)])?;
        tx.commit()?;
        Ok(())
    }

    /// Look up one match, with participants, by id.
    pub fn find_match(&self, match_id: i64) -> Result<Option<Match>> {
        let mut found = self.list_matches(&MatchFilter::by_match_id(match_id), 1, 0)?;
        Ok(found.pop())
    }

    /// List matches satisfying `filter`, newest first, with participants.
    ///
    /// `limit` is clamped to `1..=MAX_LIST_LIMIT`; zero means the maximum.
    pub fn list_matches(
        &self,
        filter: &MatchFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Match>> {
        let limit = if limit == 0 || limit > MAX_LIST_LIMIT {
            MAX_LIST_LIMIT
        } else {
            limit
        };

        let predicates = filter.predicates();
        let mut sql = String::from(
            "SELECT DISTINCT m.id
             FROM matches m
             LEFT JOIN participants p ON p.match_id = m.id",
        );
        if !predicates.is_empty() {
            let clauses: Vec<&str> = predicates.iter().map(|(clause, _)| *clause).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY m.id DESC LIMIT ? OFFSET ?");

        let mut args: Vec<Value> = predicates.into_iter().map(|(_, value)| value).collect();
        args.push(Value::Integer(limit.into()));
        args.push(Value::Integer(offset.into()));

        let ids: Vec<i64> = self
            .conn()
            .query(&sql, params_from_iter(args), |row| row.get(0))?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {MATCH_COLUMNS}
             FROM matches m
             LEFT JOIN participants p ON p.match_id = m.id
             WHERE m.id IN ({placeholders})
             ORDER BY m.started_at DESC, m.id DESC, p.participant_id ASC"
        );
        let rows = self
            .conn()
            .query(&sql, params_from_iter(ids.iter()), row_to_pair)?;

        let mut matches: Vec<Match> = Vec::with_capacity(ids.len());
        let mut index: HashMap<i64, usize> = HashMap::with_capacity(ids.len());
        for (summary, participant) in rows {
            let slot = *index.entry(summary.id).or_insert_with(|| {
                matches.push(Match {
                    summary,
                    participants: Vec::new(),
                });
                matches.len() - 1
            });
            if let Some(participant) = participant {
                matches[slot].participants.push(participant);
            }
        }

        Ok(matches)
    }

    /// Delete a match; its participants go with it.
    pub fn delete_match(&self, match_id: i64) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM matches WHERE id = ?1", params![match_id])?;
        Ok(affected > 0)
    }
}

fn upsert_summary<E: Executor>(exec: &E, summary: &MatchSummary) -> rusqlite::Result<usize> {
    exec.execute(
        UPSERT_SUMMARY_SQL,
        params![
            summary.id,
            summary.started_at,
            summary.duration_secs,
            summary.queue_id,
            summary.replay_synced,
        ],
    )
}

fn upsert_participant<E: Executor>(
    exec: &E,
    match_id: i64,
    p: &Participant,
) -> rusqlite::Result<usize> {
    exec.execute(
        UPSERT_PARTICIPANT_SQL,
        params![
            match_id,
            p.participant_id,
            p.champion_id,
            p.champ_level,
            p.kills,
            p.deaths,
            p.assists,
            p.total_minions_killed,
            p.double_kills,
            p.triple_kills,
            p.quadra_kills,
            p.penta_kills,
            p.item0,
            p.item1,
            p.item2,
            p.item3,
            p.item4,
            p.item5,
            p.item6,
            p.summoner1_id,
            p.summoner2_id,
            p.lane,
            p.puuid,
            p.riot_id_game_name,
            p.riot_id_tagline,
            p.total_damage_dealt_to_champions,
            p.total_damage_taken,
            p.win,
        ],
    )
}

fn update_fields<E: Executor>(exec: &E, match_id: i64, fields: &[MatchField]) -> Result<bool> {
    if fields.is_empty() {
        return Ok(false);
    }

    let mut set_clauses = Vec::with_capacity(fields.len());
    let mut args = Vec::with_capacity(fields.len() + 1);
    for (i, field) in fields.iter().enumerate() {
        let column = field.column();
        if fields[..i].iter().any(|earlier| earlier.column() == column) {
            return Err(StoreError::InvalidField(column));
        }
        set_clauses.push(format!("{column} = ?"));
        args.push(field.value());
    }
    args.push(Value::Integer(match_id));

    let sql = format!("UPDATE matches SET {} WHERE id = ?", set_clauses.join(", "));
    let affected = exec.execute(&sql, params_from_iter(args))?;
    Ok(affected > 0)
}

/// Map a joined row into its summary and, if the join matched, participant.
fn row_to_pair(row: &Row<'_>) -> rusqlite::Result<(MatchSummary, Option<Participant>)> {
    let summary = MatchSummary {
        id: row.get(0)?,
        started_at: row.get(1)?,
        duration_secs: row.get(2)?,
        queue_id: row.get(3)?,
        replay_synced: row.get(4)?,
    };

    let joined: Option<i64> = row.get(5)?;
    if joined.is_none() {
        return Ok((summary, None));
    }

    let participant = Participant {
        participant_id: row.get(6)?,
        champion_id: row.get(7)?,
        champ_level: row.get(8)?,
        kills: row.get(9)?,
        deaths: row.get(10)?,
        assists: row.get(11)?,
        total_minions_killed: row.get(12)?,
        double_kills: row.get(13)?,
        triple_kills: row.get(14)?,
        quadra_kills: row.get(15)?,
        penta_kills: row.get(16)?,
        item0: row.get(17)?,
        item1: row.get(18)?,
        item2: row.get(19)?,
        item3: row.get(20)?,
        item4: row.get(21)?,
        item5: row.get(22)?,
        item6: row.get(23)?,
        summoner1_id: row.get(24)?,
        summoner2_id: row.get(25)?,
        lane: row.get(26)?,
        puuid: row.get(27)?,
        riot_id_game_name: row.get(28)?,
        riot_id_tagline: row.get(29)?,
        total_damage_dealt_to_champions: row.get(30)?,
        total_damage_taken: row.get(31)?,
        win: row.get(32)?,
    };

    Ok((summary, Some(participant)))
}
