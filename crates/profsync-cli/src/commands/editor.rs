//! Local editor maintenance commands

use anyhow::Result;
use profsync_core::SyncService;
use std::io::{self, Write};

pub async fn list_missing_extensions(service: &SyncService) -> Result<()> {
    let missing = service.missing_extensions().await?;
    if missing.is_empty() {
        println!("No missing extensions.");
        return Ok(());
    }

    println!("Enabled:");
    for id in &missing.enabled {
        println!("  {id}");
    }
    println!("\nDisabled:");
    for id in &missing.disabled {
        println!("  {id}");
    }
    Ok(())
}

pub async fn reset(service: &SyncService, force: bool) -> Result<()> {
    if !force {
        print!("Remove all your settings and extensions? [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let report = service.reset().await?;
    for id in &report.uninstalled {
        println!("Uninstalled: {id}");
    }
    println!("Deleted {} files", report.deleted_count);

    if !report.errors.is_empty() {
        eprintln!("\nErrors:");
        for err in &report.errors {
            eprintln!("  {err}");
        }
    }
    Ok(())
}
