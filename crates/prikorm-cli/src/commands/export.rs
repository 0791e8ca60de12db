use std::path::Path;

use prikorm_core::sync::{MergeReport, Snapshot};

use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_export(output_path: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let rendered = store.export_snapshot().await?.to_json_pretty()?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

pub async fn run_import(path: &Path, db_path: &Path) -> Result<MergeReport, CliError> {
    let raw = std::fs::read_to_string(path)?;
    let snapshot = Snapshot::from_json_str(&raw)?;

    let store = open_store(db_path)?;
    let report = store.apply_snapshot(&snapshot).await?;
    if report.is_noop() {
        println!("Nothing to import; local data is already newer or equal");
    } else {
        println!("Imported {report}");
    }
    Ok(report)
}
