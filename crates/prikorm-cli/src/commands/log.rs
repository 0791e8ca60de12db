use std::path::Path;

use chrono::NaiveDate;
use prikorm_core::models::LogDetails;
use prikorm_core::LogEntry;

use crate::cli::{LogCommands, ReactionArg, SlotArgs};
use crate::commands::common::{format_log_lines, open_store, slot_key};
use crate::error::CliError;

pub async fn run_log(command: LogCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        LogCommands::Done { slot, plan } => run_log_done(&slot, plan, db_path).await.map(|_| ()),
        LogCommands::Set {
            slot,
            done,
            amount,
            reaction,
            note,
        } => {
            let details = LogDetails {
                done,
                amount,
                reaction: reaction.map(ReactionArg::into_reaction),
                note,
            };
            run_log_set(&slot, details, db_path).await.map(|_| ())
        }
        LogCommands::List { day, date, json } => run_log_list(day, date, json, db_path).await,
        LogCommands::Delete { slot } => run_log_delete(&slot, db_path).await.map(|_| ()),
    }
}

pub async fn run_log_done(
    slot: &SlotArgs,
    plan: Option<String>,
    db_path: &Path,
) -> Result<LogEntry, CliError> {
    let store = open_store(db_path)?;
    let entry = store.toggle_done(&slot_key(slot), plan).await?;
    for line in format_log_lines(std::slice::from_ref(&entry)) {
        println!("{line}");
    }
    Ok(entry)
}

pub async fn run_log_set(
    slot: &SlotArgs,
    details: LogDetails,
    db_path: &Path,
) -> Result<LogEntry, CliError> {
    if details.is_empty() {
        return Err(CliError::InvalidArgument(
            "pass at least one of --done, --amount, --reaction, --note".to_string(),
        ));
    }
    let store = open_store(db_path)?;
    let entry = store.set_log_details(&slot_key(slot), details).await?;
    for line in format_log_lines(std::slice::from_ref(&entry)) {
        println!("{line}");
    }
    Ok(entry)
}

pub async fn list_logs(
    day: Option<u32>,
    date: Option<NaiveDate>,
    db_path: &Path,
) -> Result<Vec<LogEntry>, CliError> {
    let store = open_store(db_path)?;
    let entries = match (day, date) {
        (Some(day), Some(date)) => store.list_logs_for_day(day, date).await?,
        _ => store
            .list_logs()
            .await?
            .into_iter()
            .filter(|entry| day.map_or(true, |day| entry.day_index == day))
            .filter(|entry| date.map_or(true, |date| entry.date == date))
            .collect(),
    };
    Ok(entries)
}

async fn run_log_list(
    day: Option<u32>,
    date: Option<NaiveDate>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let entries = list_logs(day, date, db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("No entries recorded.");
    } else {
        for line in format_log_lines(&entries) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_log_delete(slot: &SlotArgs, db_path: &Path) -> Result<bool, CliError> {
    let store = open_store(db_path)?;
    let key = slot_key(slot);
    let deleted = store.delete_log(&key).await?;
    if deleted {
        println!("Deleted {key}");
    } else {
        println!("No entry for {key}");
    }
    Ok(deleted)
}
