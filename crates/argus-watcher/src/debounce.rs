//! Timer-coalescing utility.
//!
//! A [`Debouncer`] arms a timer on the first trigger; triggers arriving
//! while the timer runs simply reset it. When the window finally elapses
//! the action runs once. This collapses event bursts (a compose stack
//! restarting, for instance) into a single watch cycle.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Coalesces bursts of triggers into a single deferred action.
#[derive(Debug)]
pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
    handle: JoinHandle<()>,
}

impl Debouncer {
    /// Spawns a debouncer running `action` once per quiet `window` after a
    /// burst of triggers.
    pub fn new<F, Fut>(window: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let handle = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Triggers within the window reset it; the action only runs
                // once the burst has settled.
                loop {
                    match timeout(window, rx.recv()).await {
                        Ok(Some(())) => {}
                        Ok(None) => return,
                        Err(_) => break,
                    }
                }
                action().await;
            }
        });
        Self { tx, handle }
    }

    /// Registers a trigger. Never blocks.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Stops the debouncer; a pending window is discarded.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
