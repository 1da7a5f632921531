//! Typed filters for listing stored matches.
//!
//! Every predicate is a fixed SQL fragment paired with a bound value, so the
//! set of SQL the store can emit is closed and visible here.

use rusqlite::types::Value;

/// Optional constraints on a match listing. All set fields must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFilter {
    pub match_id: Option<i64>,
    /// Matches the account took part in.
    pub puuid: Option<String>,
    /// Inclusive lower bound on `started_at` (epoch seconds).
    pub started_after: Option<i64>,
    /// Inclusive upper bound on `started_at` (epoch seconds).
    pub started_before: Option<i64>,
    pub replay_synced: Option<bool>,
    pub champion_id: Option<i64>,
    pub lane: Option<String>,
    pub win: Option<bool>,
}

impl MatchFilter {
    pub fn by_match_id(match_id: i64) -> Self {
        Self {
            match_id: Some(match_id),
            ..Self::default()
        }
    }

    pub fn by_puuid(puuid: impl Into<String>) -> Self {
        Self {
            puuid: Some(puuid.into()),
            ..Self::default()
        }
    }

    /// The `WHERE` fragments and their bound values, in placeholder order.
    pub(crate) fn predicates(&self) -> Vec<(&'static str, Value)> {
        let mut out = Vec::new();

        if let Some(id) = self.match_id {
            out.push(("m.id = ?", Value::Integer(id)));
        }
        if let Some(puuid) = &self.puuid {
            out.push(("p.puuid = ?", Value::Text(puuid.clone())));
        }
        if let Some(min) = self.started_after {
            out.push(("m.started_at >= ?", Value::Integer(min)));
        }
        if let Some(max) = self.started_before {
            out.push(("m.started_at <= ?", Value::Integer(max)));
        }
        if let Some(synced) = self.replay_synced {
            out.push(("m.replay_synced = ?", Value::Integer(synced.into())));
        }
        if let Some(champion) = self.champion_id {
            out.push(("p.champion_id = ?", Value::Integer(champion)));
        }
        if let Some(lane) = &self.lane {
            out.push(("p.lane = ?", Value::Text(lane.clone())));
        }
        if let Some(win) = self.win {
            out.push(("p.win = ?", Value::Integer(win.into())));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_has_no_predicates() {
        assert!(MatchFilter::default().predicates().is_empty());
    }

    #[test]
    fn predicates_follow_field_order() {
        let filter = MatchFilter {
            win: Some(true),
            puuid: Some("abc".into()),
            started_after: Some(10),
            ..MatchFilter::default()
        };

        let fragments: Vec<&str> = filter.predicates().iter().map(|(sql, _)| *sql).collect();
        assert_eq!(
            fragments,
            vec!["p.puuid = ?", "m.started_at >= ?", "p.win = ?"]
        );
    }
}
