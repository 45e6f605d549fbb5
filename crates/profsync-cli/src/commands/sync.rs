//! Transfer and inspection commands

use anyhow::{bail, Result};
use profsync_core::differences::ChangeKind;
use profsync_core::scheduler::Debouncer;
use profsync_core::watcher::watch as watch_file;
use profsync_core::{Resource, Review, SyncService};
use std::sync::Arc;
use std::time::Duration;

pub async fn upload(service: &SyncService, only: Vec<Resource>) -> Result<()> {
    let ok = if only.is_empty() {
        service.upload().await?
    } else {
        service.upload_resources(only).await?
    };
    if !ok {
        bail!("upload failed");
    }
    println!("Uploaded profile '{}'.", service.current_profile().await);
    Ok(())
}

pub async fn download(service: &SyncService, only: Vec<Resource>) -> Result<()> {
    let ok = if only.is_empty() {
        service.download().await?
    } else {
        service.download_resources(only).await?
    };
    if !ok {
        bail!("download failed");
    }
    println!("Downloaded profile '{}'.", service.current_profile().await);
    Ok(())
}

pub async fn serialize(service: &SyncService) -> Result<()> {
    service.serialize().await?;
    println!("Serialized profile '{}'.", service.current_profile().await);
    Ok(())
}

pub async fn restore(service: &SyncService) -> Result<()> {
    if !service.restore().await? {
        bail!("restore finished with failures");
    }
    println!("Restored profile '{}'.", service.current_profile().await);
    Ok(())
}

pub async fn diff(service: &SyncService) -> Result<()> {
    let found = service.differences().await?;
    if found.is_empty() {
        println!("No differences.");
        return Ok(());
    }

    for difference in found {
        let label = match difference.change {
            ChangeKind::Added => "ADDED",
            ChangeKind::Modified => "MODIFIED",
            ChangeKind::Removed => "REMOVED",
        };
        println!("{label}: {}", difference.path);
        for line in difference.diff.lines() {
            println!("  {line}");
        }
        println!();
    }
    Ok(())
}

pub async fn status(service: &SyncService) -> Result<()> {
    println!("Repository: {} ({:?})", service.backend_kind().await, service.state().await);
    println!("Profile: {}", service.current_profile().await);
    println!("Configuration: {}", service.config_path().display());
    Ok(())
}

pub async fn review(service: &SyncService) -> Result<()> {
    match service.review().await? {
        Review::Unchanged => println!("No changes since the last save."),
        Review::Uploaded => println!("Uploaded profile '{}'.", service.current_profile().await),
        Review::UploadFailed => bail!("upload failed"),
    }
    Ok(())
}

pub async fn watch(service: Arc<SyncService>, interval: u64, delay: u64) -> Result<()> {
    let path = service.config_path().to_path_buf();
    let target = Arc::clone(&service);
    let debouncer = Debouncer::new(Duration::from_millis(delay), move || {
        let service = Arc::clone(&target);
        async move {
            service.reconfigure().await;
        }
    });

    println!("Watching {} (Ctrl-C to stop)", path.display());
    let handle = watch_file(path, Duration::from_millis(interval), debouncer);

    tokio::signal::ctrl_c().await?;
    handle.abort();
    Ok(())
}
