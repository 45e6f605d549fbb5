//! Polling watcher for the configuration file

use crate::diff::content_hash;
use crate::scheduler::Debouncer;
use crate::util::read_bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

async fn fingerprint(path: &Path) -> Option<String> {
    match read_bytes(path).await {
        Ok(content) => content.map(|bytes| content_hash(&bytes)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "can not read watched file");
            None
        }
    }
}

/// Poll `path` every `period` and trigger `debouncer` when its content
/// changes, including creation and removal
///
/// The returned task runs until aborted.
#[must_use]
pub fn watch(path: PathBuf, period: Duration, debouncer: Debouncer) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = fingerprint(&path).await;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(path = %path.display(), "watching");

        loop {
            ticker.tick().await;

            let current = fingerprint(&path).await;
            if current != last {
                debug!(path = %path.display(), "changed");
                last = current;
                debouncer.trigger();
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_change_triggers_once() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.yml");
        std::fs::write(&path, "profile: main\n").unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let debouncer = Debouncer::new(Duration::from_millis(50), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let handle = watch(path.clone(), Duration::from_millis(10), debouncer);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        std::fs::write(&path, "profile: work\n").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        handle.abort();
    }
}
