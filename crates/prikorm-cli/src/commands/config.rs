use std::path::Path;

use prikorm_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::commands::common::resolve_remote_config;
use crate::config::{default_config_path, CliConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            table,
        } => {
            let path = default_config_path();
            run_config_init_at(&path, supabase_url, supabase_anon_key, table)?;
            println!("Saved remote configuration to {}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_config_show(),
    }
}

/// Merge explicit values into the config file at `path`; omitted flags keep
/// the saved values.
pub fn run_config_init_at(
    path: &Path,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    table: Option<String>,
) -> Result<CliConfig, CliError> {
    let existing = CliConfig::load_from_path(path).map_err(CliError::Config)?;

    let config = CliConfig {
        version: existing.version.max(1),
        supabase_url: normalize_text_option(supabase_url).or(existing.supabase_url),
        supabase_anon_key: normalize_text_option(supabase_anon_key).or(existing.supabase_anon_key),
        table: normalize_text_option(table).or(existing.table),
    };

    if let Some(url) = config.supabase_url.as_deref() {
        if !is_http_url(url) {
            return Err(CliError::InvalidArgument(format!(
                "Supabase URL must start with http:// or https://: {url}"
            )));
        }
    }

    config.save_to_path(path).map_err(CliError::Config)?;
    CliConfig::load_from_path(path).map_err(CliError::Config)
}

fn run_config_show() -> Result<(), CliError> {
    match resolve_remote_config()? {
        Some(remote) => {
            println!("Supabase URL: {}", remote.url);
            println!("Anon key:     {}", redact_key(&remote.anon_key));
            println!("Table:        {}", remote.table);
        }
        None => println!("Remote is not configured."),
    }
    println!("Config file:  {}", default_config_path().display());
    Ok(())
}

pub fn redact_key(key: &str) -> String {
    let visible = key.chars().take(4).collect::<String>();
    format!("{visible}…")
}
