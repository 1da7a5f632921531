//! Wire shapes of the upstream match endpoints.

use replaykeep_store::{MatchSummary, Participant};
use serde::Deserialize;

/// Body of the replay-list endpoint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ReplayList {
    #[serde(rename = "matchFileURLs", default)]
    pub urls: Vec<String>,
}

/// Body of the match-detail endpoint. Only `info` is consumed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MatchDetail {
    pub info: MatchInfo,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub game_id: i64,
    /// Epoch milliseconds.
    pub game_start_timestamp: i64,
    /// Seconds.
    pub game_duration: i64,
    #[serde(default)]
    pub queue_id: Option<i64>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl MatchDetail {
    /// Split into the rows persisted for `match_id`.
    ///
    /// The start time is converted to epoch seconds. The replay marker is
    /// left unset; the store keeps any marker already recorded.
    pub fn into_records(self, match_id: i64) -> (MatchSummary, Vec<Participant>) {
        let info = self.info;
        let summary = MatchSummary {
            id: match_id,
            started_at: Some(info.game_start_timestamp / 1000),
            duration_secs: Some(info.game_duration),
            queue_id: info.queue_id,
            replay_synced: false,
        };
        (summary, info.participants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL: &str = r#"{
        "metadata": {"matchId": "EUW1_7000000001"},
        "info": {
            "gameId": 7000000001,
            "gameStartTimestamp": 1700000000123,
            "gameDuration": 1834,
            "queueId": 420,
            "participants": [
                {"participantId": 1, "championId": 157, "puuid": "a", "win": true},
                {"participantId": 2, "championId": 64, "puuid": "b", "win": false}
            ]
        }
    }"#;

    #[test]
    fn detail_converts_to_records() {
        let detail: MatchDetail = serde_json::from_str(DETAIL).unwrap();
        assert_eq!(detail.info.game_id, 7000000001);

        let (summary, participants) = detail.into_records(7000000001);
        assert_eq!(summary.started_at, Some(1_700_000_000));
        assert_eq!(summary.duration_secs, Some(1834));
        assert_eq!(summary.queue_id, Some(420));
        assert!(!summary.replay_synced);
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].champion_id, 157);
        assert!(!participants[1].win);
    }

    #[test]
    fn replay_list_tolerates_missing_key() {
        let list: ReplayList = serde_json::from_str("{}").unwrap();
        assert!(list.urls.is_empty());

        let list: ReplayList =
            serde_json::from_str(r#"{"matchFileURLs": ["https://x/EUW1_1.replay"]}"#).unwrap();
        assert_eq!(list.urls.len(), 1);
    }
}
