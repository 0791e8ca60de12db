use std::path::Path;

use prikorm_core::{DayMetaOverride, PlanOverride};

use crate::cli::{FocusCommands, PlanCommands};
use crate::commands::common::{join_words, open_store};
use crate::error::CliError;

pub async fn run_plan(command: PlanCommands, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    match command {
        PlanCommands::Set { day, time, text } => {
            let item = store
                .upsert_plan_override(day, &time, &join_words(&text)?)
                .await?;
            println!("{}", format_plan_line(&item));
        }
        PlanCommands::Reset { day, time } => {
            if store.reset_plan_override(day, &time).await? {
                println!("Plan for day {day} {} restored to default", time.trim());
            } else {
                println!("No plan override for day {day} {}", time.trim());
            }
        }
        PlanCommands::List { json } => {
            let items = store.list_plan_overrides().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("No plan overrides.");
            } else {
                for item in &items {
                    println!("{}", format_plan_line(item));
                }
            }
        }
    }
    Ok(())
}

pub async fn run_focus(command: FocusCommands, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    match command {
        FocusCommands::Set { day, text } => {
            let item = store.upsert_day_focus(day, &join_words(&text)?).await?;
            println!("{}", format_focus_line(&item));
        }
        FocusCommands::Reset { day } => {
            if store.reset_day_focus(day).await? {
                println!("Focus for day {day} restored to default");
            } else {
                println!("No focus override for day {day}");
            }
        }
        FocusCommands::List { json } => {
            let items = store.list_day_meta().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("No focus overrides.");
            } else {
                for item in &items {
                    println!("{}", format_focus_line(item));
                }
            }
        }
    }
    Ok(())
}

pub fn format_plan_line(item: &PlanOverride) -> String {
    format!("day {:<3} {:<5}  {}", item.day_index, item.time, item.plan_text)
}

pub fn format_focus_line(item: &DayMetaOverride) -> String {
    format!(
        "day {:<3} {}",
        item.day_index,
        item.focus.as_deref().unwrap_or("-")
    )
}
