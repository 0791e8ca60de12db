use std::path::Path;

use prikorm_core::models::generate_family_code;

use crate::cli::FamilyCommands;
use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_family(command: FamilyCommands, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    match command {
        FamilyCommands::Create => {
            let code = store.set_family_code(&generate_family_code()).await?;
            println!("Created family {code}");
            println!("Share this code and run `prikorm family join {code}` on the other device.");
        }
        FamilyCommands::Join { code } => {
            let code = store.set_family_code(&code).await?;
            println!("Joined family {code}");
            println!("Run `prikorm sync pull` to fetch the family's data.");
        }
        FamilyCommands::Leave => {
            store.clear_family_code().await?;
            println!("Left family; local data kept");
        }
        FamilyCommands::Show => match store.family_code().await? {
            Some(code) => println!("{code}"),
            None => println!("No family code configured."),
        },
    }
    Ok(())
}
