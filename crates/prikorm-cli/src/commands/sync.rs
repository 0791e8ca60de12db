use std::path::Path;

use prikorm_core::config::SyncTimings;
use prikorm_core::sync::{PullOutcome, PushOutcome, SupabaseRemoteStore, SyncScheduler};
use prikorm_core::{EntityStore, SyncStatus};
use serde::Serialize;

use crate::cli::SyncCommands;
use crate::commands::common::{
    format_optional_timestamp, format_timestamp, open_remote, open_store, require_family_code,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusItem {
    pub family_code: Option<String>,
    pub state: String,
    pub remote_updated_at: Option<i64>,
    pub last_push_at: Option<i64>,
    pub last_pull_at: Option<i64>,
    pub last_error: Option<String>,
}

impl SyncStatusItem {
    pub fn new(family_code: Option<String>, status: &SyncStatus) -> Self {
        Self {
            family_code,
            state: status.state.to_string(),
            remote_updated_at: status.remote_updated_at,
            last_push_at: status.last_push_at,
            last_pull_at: status.last_pull_at,
            last_error: status.last_error.clone(),
        }
    }
}

pub async fn run_sync(command: SyncCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        SyncCommands::Push => run_sync_push(db_path).await,
        SyncCommands::Pull => run_sync_pull(db_path).await,
        SyncCommands::Status { json } => run_sync_status(json, db_path).await,
        SyncCommands::Watch => run_sync_watch(db_path).await,
    }
}

async fn open_scheduler(
    db_path: &Path,
) -> Result<(EntityStore, SyncScheduler<SupabaseRemoteStore>), CliError> {
    let store = open_store(db_path)?;
    require_family_code(&store).await?;
    let remote = open_remote()?;
    let scheduler = SyncScheduler::new(store.clone(), remote, SyncTimings::from_env()).await?;
    Ok((store, scheduler))
}

pub async fn run_sync_push(db_path: &Path) -> Result<(), CliError> {
    let (_, scheduler) = open_scheduler(db_path).await?;
    match scheduler.push_now().await {
        PushOutcome::Pushed { remote_updated_at } => {
            println!("Pushed snapshot at {}", format_timestamp(remote_updated_at));
            Ok(())
        }
        PushOutcome::Skipped(reason) => {
            println!("Push skipped: {reason:?}");
            Ok(())
        }
        PushOutcome::Failed(message) => Err(CliError::SyncFailed(message)),
    }
}

pub async fn run_sync_pull(db_path: &Path) -> Result<(), CliError> {
    let (_, scheduler) = open_scheduler(db_path).await?;
    print_pull_outcome(scheduler.pull_now().await)
}

fn print_pull_outcome(outcome: PullOutcome) -> Result<(), CliError> {
    match outcome {
        PullOutcome::Applied {
            remote_updated_at,
            report,
        } => {
            println!(
                "Merged snapshot from {}: {report}",
                format_timestamp(remote_updated_at)
            );
        }
        PullOutcome::UpToDate { remote_updated_at } => {
            println!(
                "Already up to date (remote {})",
                format_timestamp(remote_updated_at)
            );
        }
        PullOutcome::NothingRemote => println!("The family has no shared data yet"),
        PullOutcome::Skipped(reason) => println!("Pull skipped: {reason:?}"),
        PullOutcome::Failed(message) => return Err(CliError::SyncFailed(message)),
    }
    Ok(())
}

pub async fn run_sync_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let settings = store.sync_settings().await?;
    let item = SyncStatusItem::new(settings.family_code, &settings.status);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    for line in format_status_lines(&item) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(item: &SyncStatusItem) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Family:      {}",
            item.family_code.as_deref().unwrap_or("not configured")
        ),
        format!("State:       {}", item.state),
        format!(
            "Remote:      {}",
            format_optional_timestamp(item.remote_updated_at)
        ),
        format!("Last push:   {}", format_optional_timestamp(item.last_push_at)),
        format!("Last pull:   {}", format_optional_timestamp(item.last_pull_at)),
    ];
    if let Some(error) = &item.last_error {
        lines.push(format!("Last error:  {error}"));
    }
    lines
}

async fn run_sync_watch(db_path: &Path) -> Result<(), CliError> {
    let (store, scheduler) = open_scheduler(db_path).await?;
    let mut status = scheduler.subscribe_status();
    scheduler.start();
    println!(
        "Watching family sync every {}s; press Ctrl-C to stop",
        scheduler.timings().poll_interval.as_secs()
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                let family_code = store.family_code().await?;
                tracing::info!(
                    state = %current.state,
                    remote_updated_at = ?current.remote_updated_at,
                    "sync status changed"
                );
                for line in format_status_lines(&SyncStatusItem::new(family_code, &current)) {
                    println!("{line}");
                }
            }
        }
    }

    scheduler.stop();
    println!("Stopped");
    Ok(())
}
