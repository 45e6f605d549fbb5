//! Single-flight debounced trigger
//!
//! Of several triggers within the delay only the last one runs the task.
//! A trigger that fires while the task is running is queued and runs once
//! the current run finishes; runs never overlap.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Task = Arc<dyn Fn() -> BoxFuture + Send + Sync>;

#[derive(Debug, Default)]
struct State {
    generation: u64,
    running: bool,
    queued: bool,
}

/// Debounced, non-overlapping runner of one async task
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    task: Task,
    state: Arc<Mutex<State>>,
}

impl Debouncer {
    pub fn new<F, Fut>(delay: Duration, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            delay,
            task: Arc::new(move || -> BoxFuture { Box::pin(task()) }),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Schedule a run after the delay, superseding pending ones
    ///
    /// Must be called inside a tokio runtime.
    pub fn trigger(&self) {
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.generation
        };

        let delay = self.delay;
        let task = Arc::clone(&self.task);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut current = lock(&state);
                if current.generation != generation {
                    debug!("superseded trigger dropped");
                    return;
                }
                if current.running {
                    debug!("task running, trigger queued");
                    current.queued = true;
                    return;
                }
                current.running = true;
            }

            let _reset = ResetOnPanic(Arc::clone(&state));
            loop {
                task().await;

                let again = {
                    let mut current = lock(&state);
                    current.running = current.queued;
                    std::mem::take(&mut current.queued)
                };
                if !again {
                    break;
                }
            }
        });
    }
}

/// Clears the run flags when a run unwinds
struct ResetOnPanic(Arc<Mutex<State>>);

impl Drop for ResetOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut state = lock(&self.0);
            state.running = false;
            state.queued = false;
        }
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
