//! One-way shutdown signal shared by the server's parts.
//!
//! The first reason recorded wins; later triggers are ignored so a fatal
//! error is never masked by the interrupt that follows it.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Ctrl-C or an explicit stop call.
    Interrupted,
    /// The one-shot test run finished.
    TestFinished { had_error: bool },
    /// A watcher or build host failure that the server cannot recover from.
    Fatal(String),
}

#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Record `reason`. Returns false if a reason was already recorded.
    pub fn trigger(&self, reason: StopReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            tracing::debug!(?reason, "Shutdown requested");
            *current = Some(reason);
            true
        })
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.tx.borrow().clone()
    }

    pub fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Resolve once a reason has been recorded.
    pub async fn wait(&self) -> StopReason {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone().unwrap_or(StopReason::Interrupted),
            // The sender lives in `self`, so it cannot be dropped while we wait.
            Err(_) => StopReason::Interrupted,
        }
    }
}
