//! # replaykeep-daemon
//!
//! Background service that periodically syncs match history and replay
//! files for every tracked account into a local SQLite database and replay
//! directory.

use std::sync::Arc;

use anyhow::Context;
use replaykeep_daemon::config::DaemonConfig;
use replaykeep_daemon::replay_store::{HttpTransport, ReplayStore};
use replaykeep_daemon::scheduler::{Scheduler, SyncContext};
use replaykeep_riot::RiotClient;
use replaykeep_rofl::ReplayDecoder;
use replaykeep_store::{Database, TrackedAccount};
use tracing::{error, info, info_span};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,replaykeep_daemon=debug")),
        )
        .init();

    info!("Starting replaykeep daemon v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = DaemonConfig::from_env();
    info!(?config, "Loaded configuration");

    let api_key = config
        .riot_api_key
        .clone()
        .context("RIOT_API_KEY must be set")?;

    // -----------------------------------------------------------------------
    // 3. Prepare storage and register seeded accounts
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;

    for seed in &config.track_accounts {
        let account = TrackedAccount {
            puuid: seed.puuid.clone(),
            game_name: seed.game_name.clone(),
            tag_line: seed.tag_line.clone(),
            region: seed.region.clone(),
            synced_at: None,
            tracked: true,
        };
        db.upsert_account(&account)?;
        info!(puuid = %seed.puuid, region = %seed.region, "Tracking account");
    }

    let tracked = db.list_tracked_accounts()?.len();
    info!(tracked, "Database ready");
    drop(db);

    let transport = Arc::new(HttpTransport::new(config.http_timeout)?);
    let replays = ReplayStore::new(
        config.replay_dir.clone(),
        config.min_replay_bytes,
        transport,
    )
    .await?
    .with_decoder(ReplayDecoder::new(info_span!("decoder")));

    // -----------------------------------------------------------------------
    // 4. Build the upstream client and the scheduler
    // -----------------------------------------------------------------------
    let api = Arc::new(RiotClient::new(&api_key, config.http_timeout)?);

    let ctx = SyncContext {
        database_path: config.database_path.clone(),
        api,
        replays,
        sync_refresh: config.sync_refresh,
    };
    let scheduler = Scheduler::new(
        ctx,
        config.sync_interval,
        config.max_concurrent_accounts,
        info_span!("scheduler"),
    );

    // -----------------------------------------------------------------------
    // 5. Run until Ctrl+C
    // -----------------------------------------------------------------------
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    scheduler.run(shutdown).await;

    Ok(())
}
