//! Daemon configuration loaded from environment variables.
//!
//! Everything except the API key has a default so the daemon can start with
//! no configuration for local development.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Daemon configuration.
#[derive(Clone)]
pub struct DaemonConfig {
    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./data/replaykeep.db`
    pub database_path: PathBuf,

    /// Directory holding `<match id>.rofl` files.
    /// Env: `REPLAY_DIR`, else `$BIN_DIR/replays`
    /// Default: `./bin/replays`
    pub replay_dir: PathBuf,

    /// Upstream API key. Required to run the daemon.
    /// Env: `RIOT_API_KEY`
    pub riot_api_key: Option<String>,

    /// Accounts registered as tracked at startup.
    /// Env: `TRACK_ACCOUNTS`, comma separated `REGION:PUUID[:NAME#TAG]`
    /// Default: none
    pub track_accounts: Vec<AccountSeed>,

    /// Period of the background sync loop.
    /// Env: `SYNC_INTERVAL_SECS`
    /// Default: 15 minutes
    pub sync_interval: Duration,

    /// Age after which a read triggers a sync first.
    /// Env: `SYNC_REFRESH_SECS`
    /// Default: 5 minutes
    pub sync_refresh: Duration,

    /// Timeout applied to every upstream HTTP call.
    /// Env: `HTTP_TIMEOUT_SECS`
    /// Default: 30 seconds
    pub http_timeout: Duration,

    /// A stored replay must be larger than this to count as complete.
    /// Env: `MIN_REPLAY_BYTES`
    /// Default: 1 MiB
    pub min_replay_bytes: u64,

    /// Accounts synced in parallel by one scheduler pass.
    /// Env: `MAX_CONCURRENT_ACCOUNTS`
    /// Default: `4`
    pub max_concurrent_accounts: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/replaykeep.db"),
            replay_dir: PathBuf::from("./bin/replays"),
            riot_api_key: None,
            track_accounts: Vec::new(),
            sync_interval: Duration::from_secs(15 * 60),
            sync_refresh: Duration::from_secs(5 * 60),
            http_timeout: Duration::from_secs(30),
            min_replay_bytes: 1024 * 1024, // 1 MiB
            max_concurrent_accounts: 4,
        }
    }
}

impl fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("database_path", &self.database_path)
            .field("replay_dir", &self.replay_dir)
            .field(
                "riot_api_key",
                &self.riot_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("track_accounts", &self.track_accounts)
            .field("sync_interval", &self.sync_interval)
            .field("sync_refresh", &self.sync_refresh)
            .field("http_timeout", &self.http_timeout)
            .field("min_replay_bytes", &self.min_replay_bytes)
            .field("max_concurrent_accounts", &self.max_concurrent_accounts)
            .finish()
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(dir) = var("REPLAY_DIR") {
            config.replay_dir = PathBuf::from(dir);
        } else if let Some(bin) = var("BIN_DIR") {
            config.replay_dir = PathBuf::from(bin).join("replays");
        }

        if let Some(key) = var("RIOT_API_KEY") {
            if !key.trim().is_empty() {
                config.riot_api_key = Some(key);
            }
        }

        if let Some(list) = var("TRACK_ACCOUNTS") {
            config.track_accounts = list
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .filter_map(|entry| match AccountSeed::parse(entry) {
                    Some(seed) => Some(seed),
                    None => {
                        tracing::warn!(entry, "Invalid TRACK_ACCOUNTS entry, ignoring");
                        None
                    }
                })
                .collect();
        }

        if let Some(secs) = parse_var::<u64>(&var, "SYNC_INTERVAL_SECS") {
            config.sync_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_var::<u64>(&var, "SYNC_REFRESH_SECS") {
            config.sync_refresh = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&var, "HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(bytes) = parse_var::<u64>(&var, "MIN_REPLAY_BYTES") {
            config.min_replay_bytes = bytes;
        }
        if let Some(n) = parse_var::<usize>(&var, "MAX_CONCURRENT_ACCOUNTS") {
            config.max_concurrent_accounts = n.max(1);
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }
}

/// An account to register as tracked, as written in `TRACK_ACCOUNTS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSeed {
    pub region: String,
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
}

impl AccountSeed {
    /// Parse `REGION:PUUID` or `REGION:PUUID:NAME#TAG`.
    fn parse(entry: &str) -> Option<Self> {
        let mut parts = entry.splitn(3, ':');
        let region = parts.next()?.trim();
        let puuid = parts.next()?.trim();
        if region.is_empty() || puuid.is_empty() {
            return None;
        }
        let (game_name, tag_line) = match parts.next() {
            Some(riot_id) => riot_id.split_once('#')?,
            None => ("", ""),
        };
        Some(Self {
            region: region.to_ascii_uppercase(),
            puuid: puuid.to_string(),
            game_name: game_name.to_string(),
            tag_line: tag_line.to_string(),
        })
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> DaemonConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = from_pairs(&[]);
        assert_eq!(config.database_path, PathBuf::from("./data/replaykeep.db"));
        assert_eq!(config.replay_dir, PathBuf::from("./bin/replays"));
        assert_eq!(config.sync_interval, Duration::from_secs(900));
        assert_eq!(config.sync_refresh, Duration::from_secs(300));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.min_replay_bytes, 1024 * 1024);
        assert!(config.riot_api_key.is_none());
    }

    #[test]
    fn test_bin_dir_fallback() {
        let config = from_pairs(&[("BIN_DIR", "/opt/rk")]);
        assert_eq!(config.replay_dir, PathBuf::from("/opt/rk/replays"));

        let config = from_pairs(&[("BIN_DIR", "/opt/rk"), ("REPLAY_DIR", "/srv/replays")]);
        assert_eq!(config.replay_dir, PathBuf::from("/srv/replays"));
    }

    #[test]
    fn test_invalid_number_keeps_default() {
        let config = from_pairs(&[("SYNC_INTERVAL_SECS", "soon"), ("MAX_CONCURRENT_ACCOUNTS", "8")]);
        assert_eq!(config.sync_interval, Duration::from_secs(900));
        assert_eq!(config.max_concurrent_accounts, 8);
    }

    #[test]
    fn test_track_accounts() {
        let config = from_pairs(&[(
            "TRACK_ACCOUNTS",
            "euw:abc-123:Player#EUW, KR:def-456 ,broken,NA:ghi:NoTag",
        )]);
        assert_eq!(
            config.track_accounts,
            vec![
                AccountSeed {
                    region: "EUW".into(),
                    puuid: "abc-123".into(),
                    game_name: "Player".into(),
                    tag_line: "EUW".into(),
                },
                AccountSeed {
                    region: "KR".into(),
                    puuid: "def-456".into(),
                    game_name: String::new(),
                    tag_line: String::new(),
                },
            ]
        );
    }

    #[test]
    fn test_api_key_is_redacted() {
        let config = from_pairs(&[("RIOT_API_KEY", "RGAPI-secret")]);
        assert_eq!(config.riot_api_key.as_deref(), Some("RGAPI-secret"));
        assert!(!format!("{config:?}").contains("RGAPI-secret"));
    }
}
