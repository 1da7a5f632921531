//! Periodic sync of every tracked account.
//!
//! Each pass spawns one supervised task per account into a [`JoinSet`]. A
//! task that fails or panics is logged and the remaining accounts and later
//! passes carry on.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use replaykeep_riot::MatchApi;
use replaykeep_store::{Database, StoreError, TrackedAccount};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::error::SyncError;
use crate::replay_store::ReplayStore;
use crate::sync::{blocking, MatchSync, SyncReport};

/// Everything a worker needs to build its own [`MatchSync`].
#[derive(Clone)]
pub struct SyncContext {
    pub database_path: PathBuf,
    pub api: Arc<dyn MatchApi>,
    pub replays: ReplayStore,
    pub sync_refresh: Duration,
}

impl SyncContext {
    /// A worker with a fresh database connection.
    pub async fn worker(&self, span: Span) -> Result<MatchSync, SyncError> {
        let path = self.database_path.clone();
        let db = blocking(move || Database::open_at(&path)).await?;
        Ok(MatchSync::new(
            db,
            self.api.clone(),
            self.replays.clone(),
            self.sync_refresh,
            span,
        ))
    }
}

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub accounts: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub panicked: usize,
}

pub struct Scheduler {
    ctx: SyncContext,
    interval: Duration,
    max_concurrent: usize,
    span: Span,
}

impl Scheduler {
    pub fn new(ctx: SyncContext, interval: Duration, max_concurrent: usize, span: Span) -> Self {
        Self {
            ctx,
            interval,
            max_concurrent: max_concurrent.max(1),
            span,
        }
    }

    /// Run a pass immediately, then one per interval, until `shutdown`
    /// resolves. A pass in flight at shutdown is dropped; matches it already
    /// committed stay committed.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => break,
            }
            tokio::select! {
                summary = self.run_pass() => {
                    info!(parent: &self.span, ?summary, "Scheduled sync pass finished");
                }
                _ = &mut shutdown => {
                    warn!(parent: &self.span, "Shutdown during sync pass, abandoning it");
                    break;
                }
            }
        }

        info!(parent: &self.span, "Scheduler stopped");
    }

    /// Sync every tracked account once.
    pub async fn run_pass(&self) -> PassSummary {
        let span = info_span!(parent: &self.span, "sync_pass");
        self.run_pass_inner().instrument(span).await
    }

    async fn run_pass_inner(&self) -> PassSummary {
        let accounts = match self.tracked_accounts().await {
            Ok(accounts) => accounts,
            Err(e) => {
                error!(error = %e, "Failed to list tracked accounts, skipping pass");
                return PassSummary::default();
            }
        };

        let mut summary = PassSummary {
            accounts: accounts.len(),
            ..PassSummary::default()
        };
        debug!(accounts = summary.accounts, "Starting sync pass");

        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for account in accounts {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let ctx = self.ctx.clone();
            let span = info_span!("account_worker", puuid = %account.puuid);
            tasks.spawn(
                async move {
                    let _permit = permit;
                    sync_one(&ctx, &account).await
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(report)) => {
                    debug!(?report, "Account synced");
                    summary.succeeded += 1;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Account sync failed");
                    summary.failed += 1;
                }
                Err(e) if e.is_panic() => {
                    error!(error = %e, "Account sync panicked");
                    summary.panicked += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Account sync cancelled");
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    async fn tracked_accounts(&self) -> Result<Vec<TrackedAccount>, StoreError> {
        let path = self.ctx.database_path.clone();
        blocking(move || Database::open_at(&path)?.list_tracked_accounts()).await
    }
}

async fn sync_one(ctx: &SyncContext, account: &TrackedAccount) -> Result<SyncReport, SyncError> {
    let worker = ctx.worker(Span::current()).await?;
    worker.sync_account(account).await
}
