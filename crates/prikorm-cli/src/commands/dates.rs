use std::path::Path;

use chrono::NaiveDate;

use crate::cli::DateCommands;
use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_dates(command: DateCommands, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    match command {
        DateCommands::SetStart { date, clear } => {
            let date = if clear { None } else { date };
            store.set_start_date(date).await?;
            println!("Start date: {}", format_date(date));
        }
        DateCommands::SetSelected { date, clear } => {
            let date = if clear { None } else { date };
            store.set_selected_date(date).await?;
            println!("Selected date: {}", format_date(date));
        }
        DateCommands::Show => {
            println!("Start date: {}", format_date(store.start_date().await?));
            println!("Selected date: {}", format_date(store.selected_date().await?));
        }
    }
    Ok(())
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "not set".to_string(), |date| date.to_string())
}
