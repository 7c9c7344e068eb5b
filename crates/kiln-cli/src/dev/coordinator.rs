//! Single-flight build scheduling.
//!
//! Change batches arrive from the watcher thread faster than builds finish.
//! At most one build runs at a time, and any number of batches that arrive
//! during it collapse into exactly one follow-up build.

use crate::dev::builder::Builder;
use crate::dev::registry::{ConnectionRegistry, ServerMessage};
use crate::dev::shutdown::{ShutdownHandle, StopReason};
use crate::error::BuildError;
use crate::ui;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Running,
    /// Another batch arrived while building; build again once this one ends.
    RunningWithPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildOutcome {
    Succeeded,
    Failed,
    Fatal,
}

struct Inner {
    state: Mutex<BuildState>,
    idle: Notify,
    builder: Arc<dyn Builder>,
    registry: Arc<ConnectionRegistry>,
    shutdown: ShutdownHandle,
    runtime: Handle,
}

#[derive(Clone)]
pub struct BuildCoordinator {
    inner: Arc<Inner>,
}

impl BuildCoordinator {
    /// `runtime` is where builds run; requests may come from any thread.
    pub fn new(
        builder: Arc<dyn Builder>,
        registry: Arc<ConnectionRegistry>,
        shutdown: ShutdownHandle,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BuildState::Idle),
                idle: Notify::new(),
                builder,
                registry,
                shutdown,
                runtime,
            }),
        }
    }

    /// Ask for a build. Returns true if this call started one.
    pub fn request_build(&self) -> bool {
        if self.inner.shutdown.is_triggered() {
            return false;
        }

        {
            let mut state = self.inner.state.lock();
            match *state {
                BuildState::Idle => *state = BuildState::Running,
                BuildState::Running | BuildState::RunningWithPending => {
                    *state = BuildState::RunningWithPending;
                    tracing::debug!("Build in progress, queued a follow-up");
                    return false;
                }
            }
        }

        let inner = self.inner.clone();
        self.inner.runtime.spawn(drive(inner));
        true
    }

    pub fn state(&self) -> BuildState {
        *self.inner.state.lock()
    }

    /// Resolve once no build is running or queued.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state() == BuildState::Idle {
                return;
            }
            notified.await;
        }
    }

    /// Run one build now and wait for it, going through the same state
    /// machine as watcher-triggered builds.
    pub async fn build_now(&self) {
        self.request_build();
        self.wait_idle().await;
    }
}

async fn drive(inner: Arc<Inner>) {
    loop {
        let started = Instant::now();
        tracing::debug!("Starting build via {}", inner.builder.describe());
        // A panicking builder is a failed build; the state machine must still advance.
        let result = match AssertUnwindSafe(inner.builder.run()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(BuildError::Failed {
                output: format!("Builder panicked: {}", panic_message(panic.as_ref())),
            }),
        };
        let outcome = report(&inner, result, started.elapsed());

        let rerun = {
            let mut state = inner.state.lock();
            match *state {
                BuildState::RunningWithPending if outcome != BuildOutcome::Fatal => {
                    *state = BuildState::Running;
                    true
                }
                _ => {
                    *state = BuildState::Idle;
                    false
                }
            }
        };

        if !rerun {
            inner.idle.notify_waiters();
            return;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown cause"
    }
}

fn report(inner: &Inner, result: Result<(), BuildError>, elapsed: Duration) -> BuildOutcome {
    match result {
        Ok(()) => {
            ui::success(&format!("Build completed in {}", ui::format_duration(elapsed)));
            let notified = inner.registry.broadcast(ServerMessage::Reload);
            tracing::debug!("Sent reload to {notified} page(s)");
            BuildOutcome::Succeeded
        }
        Err(err) if err.is_fatal() => {
            ui::error(&err.to_string());
            inner.shutdown.trigger(StopReason::Fatal(err.to_string()));
            BuildOutcome::Fatal
        }
        Err(BuildError::Failed { output }) => {
            ui::error("Build failed, still serving the previous artifact");
            ui::output_block(&output);
            BuildOutcome::Failed
        }
        Err(err) => {
            ui::error(&err.to_string());
            BuildOutcome::Failed
        }
    }
}
