//! Run the daily or weekly reset once, outside the scheduler, or repair
//! users' XP counters from their ledgers.
//!
//! # Examples
//! ```sh
//! ENGINE_DATABASE_URL=postgres://... cargo run --bin reset-tasks -- --job weekly
//! ENGINE_DATABASE_URL=postgres://... cargo run --bin reset-tasks -- \
//!     --job reconcile --user-id 3fa85f64-5717-4562-b3fc-2c963f66afa6
//! ```
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig as _;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use engine::domain::{ResetReport, ResetRun, UserId};
use engine::outbound::memory::InMemoryProgressionStore;
use engine::outbound::persistence::{DbPool, PoolConfig};
use engine::settings::EngineSettings;
use engine::wiring::{EngineComponents, StorePorts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Job {
    Daily,
    Weekly,
    All,
    /// Recompute the XP totals of `--user-id` users from their ledgers.
    Reconcile,
}

/// `reset-tasks` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "reset-tasks",
    about = "Pre-assign the current period's recurring tasks or repair XP totals once",
    version
)]
struct CliArgs {
    /// Which reset to run.
    #[arg(long, value_enum, default_value_t = Job::Daily)]
    job: Job,
    /// Database connection URL. Falls back to `ENGINE_DATABASE_URL` when omitted.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
    /// User whose XP total `--job reconcile` repairs; repeat for several.
    #[arg(long = "user-id", value_name = "uuid")]
    user_ids: Vec<Uuid>,
}

fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    if args.job == Job::Reconcile && args.user_ids.is_empty() {
        return Err(io::Error::other("--job reconcile needs at least one --user-id"));
    }
    let settings = EngineSettings::load_from_iter([OsString::from("reset-tasks")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;

    let stores = match args.database_url.or_else(|| settings.database_url.clone()) {
        Some(url) => {
            let pool = DbPool::new(PoolConfig::new(url))
                .await
                .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
            StorePorts::postgres(&pool)
        }
        None => {
            warn!("no database configured; resetting an empty in-memory store");
            StorePorts::in_memory(&Arc::new(InMemoryProgressionStore::new()))
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let engine = EngineComponents::assemble(stores, &settings, clock)
        .await
        .map_err(|error| io::Error::other(format!("assemble engine: {error}")))?;

    if matches!(args.job, Job::Daily | Job::All) {
        let run = engine
            .reset_jobs
            .reset_daily_tasks()
            .await
            .map_err(|error| io::Error::other(format!("daily reset: {error}")))?;
        log_run("daily", &run);
    }
    if matches!(args.job, Job::Weekly | Job::All) {
        let run = engine
            .reset_jobs
            .reset_weekly_tasks()
            .await
            .map_err(|error| io::Error::other(format!("weekly reset: {error}")))?;
        log_run("weekly", &run);
    }
    if args.job == Job::Reconcile {
        for user_id in args.user_ids.into_iter().map(UserId::from_uuid) {
            let outcome = engine
                .ledger
                .reconcile_total(&user_id)
                .await
                .map_err(|error| io::Error::other(format!("reconcile {user_id}: {error}")))?;
            info!(
                user_id = %user_id,
                recorded = outcome.recorded_total,
                ledger = outcome.ledger_total,
                drifted = outcome.drifted(),
                "xp total reconciled"
            );
        }
    }
    Ok(())
}

fn log_run(job: &str, run: &ResetRun) {
    match run {
        ResetRun::Completed(ResetReport {
            created, failures, ..
        }) => info!(job, created, failures, "reset complete"),
        ResetRun::Skipped => info!(job, "reset skipped"),
    }
}
