//! Profile management commands

use anyhow::{bail, Result};
use clap::Subcommand;
use profsync_core::SyncService;

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// List all profiles
    List,
    /// Create a profile as a copy of another
    Create {
        /// Profile name
        name: String,
        /// Profile to copy (defaults to the active profile)
        #[arg(short, long)]
        from: Option<String>,
    },
    /// Create a profile that inherits from another
    Extend {
        /// Profile name
        name: String,
        /// Parent profile
        #[arg(short, long)]
        from: String,
    },
    /// Delete a profile
    Delete {
        /// Profile name
        name: String,
    },
    /// Make a profile the active one
    Switch {
        /// Profile name
        name: String,
        /// Restore the profile after switching
        #[arg(long)]
        restore: bool,
    },
}

pub async fn execute(service: &SyncService, action: ProfileCommands) -> Result<()> {
    match action {
        ProfileCommands::List => {
            let active = service.current_profile().await;
            let profiles = service.list_profiles().await?;
            if profiles.is_empty() {
                println!("No profiles found.");
            } else {
                println!("Profiles:");
                for name in profiles {
                    let marker = if name == active { "*" } else { " " };
                    println!("{marker} {name}");
                }
            }
        }
        ProfileCommands::Create { name, from } => {
            service.create_profile(&name, from.as_deref()).await?;
            println!("Created profile: {name}");
        }
        ProfileCommands::Extend { name, from } => {
            service.extend_profile(&name, &from).await?;
            println!("Created profile: {name} (extends {from})");
        }
        ProfileCommands::Delete { name } => {
            service.delete_profile(&name).await?;
            println!("Deleted profile: {name}");
        }
        ProfileCommands::Switch { name, restore } => {
            if !service.switch_profile(&name, restore).await? {
                bail!("profile '{name}' restored with failures");
            }
            println!("Switched to profile: {name}");
        }
    }
    Ok(())
}
