//! Shutdown coordination for background tasks.
//!
//! The daemon owns one [`Shutdown`]. The websocket task and the event pump
//! hold receivers from [`Shutdown::subscribe`]; the daemon waits on
//! [`Shutdown::wait_for_signal`] and then joins its tasks with
//! [`Shutdown::drain`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Broadcast shutdown signal. Clones share the same channel.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    fired: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber. Returns false if shutdown was already
    /// triggered, in which case nothing is sent.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.tx.send(());
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Block until Ctrl-C (or an earlier [`trigger`](Self::trigger)), then
    /// make sure subscribers have been told.
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        let mut own = self.subscribe();
        if self.is_triggered() {
            return Ok(());
        }
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Shutdown signal received");
            }
            _ = own.recv() => {}
        }
        self.trigger();
        Ok(())
    }

    /// Join `tasks`, aborting whatever is still running after `grace`.
    /// Returns how many tasks had to be aborted.
    pub async fn drain(tasks: Vec<JoinHandle<()>>, grace: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + grace;
        let mut aborted = 0;
        for mut task in tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                task.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            tracing::warn!(aborted, "Tasks did not stop within the grace period");
        }
        aborted
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
