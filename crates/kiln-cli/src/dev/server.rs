//! Development server lifecycle.
//!
//! Wires the watcher, the build coordinator and the HTTP/WebSocket routes
//! together and tears them down in a fixed order.

use crate::dev::builder::Builder;
use crate::dev::config::ServerConfig;
use crate::dev::coordinator::BuildCoordinator;
use crate::dev::events::{DiagnosticsSink, EventRouter, ResultsSink};
use crate::dev::registry::ConnectionRegistry;
use crate::dev::routes::{self, AppState};
use crate::dev::shutdown::{ShutdownHandle, StopReason};
use crate::dev::watcher::{PathWatcher, WatchOptions};
use crate::error::{CliError, Result, WatchError};
use crate::ui;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How long in-flight HTTP requests get to finish on stop.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(5);

/// What the server does besides serving files.
pub enum ServeMode {
    /// Rebuild on change and tell pages to reload.
    Watch {
        builder: Arc<dyn Builder>,
        paths: Vec<PathBuf>,
        options: WatchOptions,
        /// Build once right after startup.
        initial_build: bool,
    },
    /// Serve until the page reports a test result.
    OneShot,
}

pub struct DevServer {
    config: Arc<ServerConfig>,
    local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    shutdown: ShutdownHandle,
    watcher: Option<PathWatcher>,
    coordinator: Option<BuildCoordinator>,
    http_stop: Option<oneshot::Sender<()>>,
    http_task: Option<JoinHandle<std::io::Result<()>>>,
}

impl DevServer {
    /// Bind, start watching and begin serving.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound or any watch path cannot be
    /// watched. Nothing keeps running in that case.
    pub async fn start(
        config: ServerConfig,
        mode: ServeMode,
        diagnostics: Arc<dyn DiagnosticsSink>,
        results: Arc<dyn ResultsSink>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let registry = Arc::new(ConnectionRegistry::new());
        let shutdown = ShutdownHandle::new();

        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| CliError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let mut events = EventRouter::new(diagnostics, results);
        let (watcher, coordinator) = match mode {
            ServeMode::Watch {
                builder,
                paths,
                options,
                initial_build,
            } => {
                let coordinator = BuildCoordinator::new(
                    builder,
                    registry.clone(),
                    shutdown.clone(),
                    tokio::runtime::Handle::current(),
                );
                let watcher = start_watcher(paths, options, &coordinator, &shutdown)?;
                if initial_build {
                    coordinator.request_build();
                }
                (Some(watcher), Some(coordinator))
            }
            ServeMode::OneShot => {
                events = events.one_shot(shutdown.clone());
                (None, None)
            }
        };

        let app = routes::router(AppState {
            config: config.clone(),
            registry: registry.clone(),
            events,
        });
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let http_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        tracing::debug!("Listening on {local_addr}");

        Ok(Self {
            config,
            local_addr,
            registry,
            shutdown,
            watcher,
            coordinator,
            http_stop: Some(stop_tx),
            http_task: Some(http_task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL to open in a browser.
    pub fn local_url(&self) -> String {
        self.config.local_url(self.local_addr.port())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn coordinator(&self) -> Option<&BuildCoordinator> {
        self.coordinator.as_ref()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Resolve when something asks the server to stop.
    pub async fn wait(&self) -> StopReason {
        self.shutdown.wait().await
    }

    /// Stop watching, close every page connection, drain HTTP, then release
    /// the builder.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(watcher) = self.watcher.take() {
            tokio::task::spawn_blocking(move || watcher.stop())
                .await
                .map_err(|e| CliError::Server(format!("Watcher did not stop cleanly: {e}")))?;
        }

        self.registry.close_all();

        if let Some(stop) = self.http_stop.take() {
            let _ = stop.send(());
        }
        if let Some(mut task) = self.http_task.take() {
            match tokio::time::timeout(GRACEFUL_TIMEOUT, &mut task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => return Err(CliError::Server(e.to_string())),
                Ok(Err(e)) => return Err(CliError::Server(e.to_string())),
                Err(_) => {
                    ui::warning("Open connections did not close in time, dropping them");
                    task.abort();
                }
            }
        }

        drop(self.coordinator.take());
        tracing::debug!("Dev server stopped");
        Ok(())
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        if let Some(stop) = self.http_stop.take() {
            self.registry.close_all();
            let _ = stop.send(());
        }
    }
}

fn start_watcher(
    paths: Vec<PathBuf>,
    options: WatchOptions,
    coordinator: &BuildCoordinator,
    shutdown: &ShutdownHandle,
) -> Result<PathWatcher> {
    let on_batch = {
        let coordinator = coordinator.clone();
        move |changed: Vec<PathBuf>| {
            tracing::debug!("{} path(s) changed", changed.len());
            for path in changed.iter().take(5) {
                tracing::trace!("  {}", path.display());
            }
            coordinator.request_build();
        }
    };
    let on_error = {
        let shutdown = shutdown.clone();
        move |err: WatchError| {
            ui::error(&err.to_string());
            shutdown.trigger(StopReason::Fatal(err.to_string()));
        }
    };

    Ok(PathWatcher::start(paths, options, on_batch, on_error)?)
}
