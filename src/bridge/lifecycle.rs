//! Shutting down: stop accepting connections, ask the workers to wind down, and give them a
//! while to do so before giving up on them.
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every worker finished in time.
    Clean,
    /// Some workers were still running when the timeout hit.
    Forced,
}

/// Owns the shutdown token and the tracker every task of the server is spawned on.
#[derive(Debug, Clone)]
pub struct Supervisor {
    token: CancellationToken,
    tracker: TaskTracker,
    timeout: Duration,
}

impl Supervisor {
    pub fn new(timeout: Duration) -> Self {
        Supervisor {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            timeout,
        }
    }

    /// Cancelled once shutdown starts.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    /// Waits for an interrupt, or for every sender to go away, then shuts down.
    pub async fn wait(self, mut interrupt: mpsc::Receiver<()>) -> ShutdownOutcome {
        interrupt.recv().await;
        info!("exit signal received, exiting...");
        self.shutdown().await
    }

    /// Cancels everything and waits up to the timeout for tasks to finish.
    pub async fn shutdown(self) -> ShutdownOutcome {
        self.token.cancel();
        self.tracker.close();

        match tokio::time::timeout(self.timeout, self.tracker.wait()).await {
            Ok(()) => ShutdownOutcome::Clean,
            Err(_) => {
                warn!(
                    timeout = ?self.timeout,
                    still_running = self.tracker.len(),
                    "exit timed out, force quitting"
                );
                ShutdownOutcome::Forced
            }
        }
    }
}
