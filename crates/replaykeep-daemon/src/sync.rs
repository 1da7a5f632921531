//! Per-account match synchronisation.
//!
//! A pass lists the account's replay URLs and, for each one in upstream
//! order, fills in whatever is missing locally: the match summary with its
//! participants, then the replay file. A failure on one match is logged and
//! the pass moves on; only failing to list replays aborts the pass.

use std::io;
use std::panic;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use replaykeep_riot::{MatchApi, Region};
use replaykeep_store::{Database, Match, MatchFilter, StoreError, TrackedAccount};
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::error::{MatchError, SyncError};
use crate::replay_store::{ReplayStatus, ReplayStore};

/// Identity of a match as carried in a replay URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRef {
    /// Upstream identifier, e.g. `EUW1_7000000001`.
    pub full_id: String,
    /// Numeric part, used as the local primary key.
    pub id: i64,
}

static MATCH_REF_RE: OnceLock<Regex> = OnceLock::new();

fn match_ref_regex() -> &'static Regex {
    MATCH_REF_RE.get_or_init(|| {
        Regex::new(r"([A-Z0-9]+_(\d+))\.replay")
            .unwrap_or_else(|error| panic!("match ref regex failed to compile: {error}"))
    })
}

/// Pull the match identity out of a replay URL such as
/// `https://host/path/EUW1_7000000001.replay?sig=...`.
pub fn extract_match_ref(url: &str) -> Option<MatchRef> {
    let caps = match_ref_regex().captures(url)?;
    let full_id = caps.get(1)?.as_str().to_string();
    let id = caps.get(2)?.as_str().parse().ok()?;
    Some(MatchRef { full_id, id })
}

/// Run a blocking store call on tokio's blocking pool. A panic inside `f`
/// resumes on the caller.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
        Err(e) => Err(StoreError::Io(io::Error::new(io::ErrorKind::Interrupted, e))),
    }
}

/// Counters for one account pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub replays_listed: usize,
    pub summaries_stored: usize,
    pub replays_stored: usize,
    pub failures: usize,
}

/// Sync orchestrator for one worker. Owns its own database handle.
pub struct MatchSync {
    db: Arc<Mutex<Database>>,
    api: Arc<dyn MatchApi>,
    replays: ReplayStore,
    sync_refresh: Duration,
    span: Span,
}

impl MatchSync {
    pub fn new(
        db: Database,
        api: Arc<dyn MatchApi>,
        replays: ReplayStore,
        sync_refresh: Duration,
        span: Span,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            api,
            replays,
            sync_refresh,
            span,
        }
    }

    pub fn replays(&self) -> &ReplayStore {
        &self.replays
    }

    /// Run `f` against the database on the blocking pool. The lock is taken
    /// and released inside the blocking task.
    async fn with_db<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        blocking(move || {
            let mut db = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut db)
        })
        .await
    }

    /// One full pass for `account`. The account's cursor advances once every
    /// listed replay has been attempted, whether or not each succeeded.
    pub async fn sync_account(&self, account: &TrackedAccount) -> Result<SyncReport, SyncError> {
        let span = info_span!(parent: &self.span, "sync_account", puuid = %account.puuid);
        self.run_pass(account).instrument(span).await
    }

    async fn run_pass(&self, account: &TrackedAccount) -> Result<SyncReport, SyncError> {
        let region: Region = account.region.parse().map_err(SyncError::Region)?;

        let urls = self
            .api
            .fetch_replay_urls(&account.puuid, region)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to list replays, aborting pass");
                SyncError::ListReplays(e)
            })?;

        let mut report = SyncReport {
            replays_listed: urls.len(),
            ..SyncReport::default()
        };

        for url in &urls {
            self.sync_match(url, region, &mut report).await;
        }

        let now = Utc::now();
        let puuid = account.puuid.clone();
        if !self
            .with_db(move |db| db.set_account_synced_at(&puuid, now))
            .await?
        {
            warn!("Account is not stored, cursor not recorded");
        }

        info!(
            listed = report.replays_listed,
            summaries = report.summaries_stored,
            replays = report.replays_stored,
            failures = report.failures,
            "Sync pass complete"
        );
        Ok(report)
    }

    async fn sync_match(&self, url: &str, region: Region, report: &mut SyncReport) {
        let Some(match_ref) = extract_match_ref(url) else {
            warn!(url, "Replay URL carries no match id, skipping");
            report.failures += 1;
            return;
        };
        let match_id = match_ref.id;

        let existing = match self.with_db(move |db| db.find_match(match_id)).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(match_id, error = %e, "Failed to load stored match, skipping");
                report.failures += 1;
                return;
            }
        };

        let needs_summary = existing.as_ref().map_or(true, |m| !m.summary.is_fetched());
        let needs_replay = existing.as_ref().map_or(true, |m| !m.summary.replay_synced);

        if needs_summary {
            match self.sync_summary(&match_ref, region).await {
                Ok(()) => report.summaries_stored += 1,
                Err(e) => {
                    warn!(match_id, full_id = %match_ref.full_id, error = %e, "Summary sync failed");
                    report.failures += 1;
                }
            }
        }

        if needs_replay {
            match self.sync_replay(match_id, url).await {
                Ok(()) => report.replays_stored += 1,
                Err(e) => {
                    warn!(match_id, error = %e, "Replay sync failed");
                    report.failures += 1;
                }
            }
        }

        if !needs_summary && !needs_replay {
            debug!(match_id, "Match already complete");
        }
    }

    async fn sync_summary(
        &self,
        match_ref: &MatchRef,
        region: Region,
    ) -> Result<(), MatchError> {
        let detail = self
            .api
            .fetch_match_detail(&match_ref.full_id, region)
            .await?;

        if detail.info.game_id != match_ref.id {
            warn!(
                match_id = match_ref.id,
                game_id = detail.info.game_id,
                "Match detail id differs from replay URL"
            );
        }

        let (summary, participants) = detail.into_records(match_ref.id);
        let count = participants.len();
        self.with_db(move |db| db.upsert_match_with_participants(&summary, &participants))
            .await?;
        debug!(match_id = match_ref.id, participants = count, "Stored summary");
        Ok(())
    }

    async fn sync_replay(
        &self,
        match_id: i64,
        url: &str,
    ) -> Result<(), MatchError> {
        if let ReplayStatus::Downloaded { bytes } =
            self.replays.ensure_downloaded(match_id, url).await?
        {
            debug!(match_id, bytes, "Downloaded replay");
        }
        self.with_db(move |db| db.mark_replay_synced(match_id)).await?;
        Ok(())
    }

    /// Whether the account's cursor is missing or older than the refresh
    /// window.
    pub fn is_stale(&self, account: &TrackedAccount, now: DateTime<Utc>) -> bool {
        match account.synced_at {
            None => true,
            Some(at) => (now - at)
                .to_std()
                .map_or(false, |age| age > self.sync_refresh),
        }
    }

    /// List stored matches for `puuid`, syncing first if its data is stale.
    ///
    /// A failed sync is logged and whatever is stored is returned. Unknown
    /// accounts are read without syncing.
    pub async fn list_matches(
        &self,
        puuid: &str,
        mut filter: MatchFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Match>, StoreError> {
        let owned = puuid.to_string();
        match self.with_db(move |db| db.get_account(&owned)).await {
            Ok(account) if self.is_stale(&account, Utc::now()) => {
                if let Err(e) = self.sync_account(&account).await {
                    warn!(parent: &self.span, puuid, error = %e, "Sync before read failed");
                }
            }
            Ok(_) => {}
            Err(StoreError::NotFound) => {
                debug!(parent: &self.span, puuid, "Untracked account, reading stored matches");
            }
            Err(e) => return Err(e),
        }

        filter.puuid = Some(puuid.to_string());
        self.with_db(move |db| db.list_matches(&filter, limit, offset))
            .await
    }
}
