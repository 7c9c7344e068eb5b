//! Dev server command.
//!
//! Resolves configuration, connects the builder, starts the server and runs
//! until Ctrl+C or a fatal error.

use crate::cli::{ConfigOverrides, DevArgs};
use crate::commands::utils;
use crate::dev::{
    Builder, CommandBuilder, DevServer, Entrypoint, IpcBuilder, ServeMode, ServerConfig,
    StopReason, TerminalSink, WatchBackend, WatchOptions,
};
use crate::error::{BuildError, CliError, Result};
use crate::ui;
use kiln_config::{BuildStrategy, KilnConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

/// Execute the dev command.
///
/// # Errors
///
/// Returns errors for invalid configuration, a port that cannot be bound,
/// watch paths that cannot be watched, and fatal failures after startup
/// (watcher breakdown or a build host breaking the pipe protocol).
pub async fn execute(args: DevArgs, config_path: Option<PathBuf>) -> Result<()> {
    let cwd = utils::get_cwd()?;
    let settings = utils::load_settings(
        &cwd,
        config_path.as_deref(),
        &ConfigOverrides::from_dev(&args),
    )?;
    let config = ServerConfig::resolve(&settings, &cwd, Entrypoint::Dev)?;
    let paths = utils::watch_paths(&settings, &cwd)?;
    let (builder, initial_build) = connect_builder(&settings, &cwd).await?;

    ui::info(&format!("Building with {}", builder.describe()));
    let mode = ServeMode::Watch {
        builder,
        paths,
        options: watch_options(&settings),
        initial_build,
    };

    let sink = Arc::new(TerminalSink);
    let server = DevServer::start(config, mode, sink.clone(), sink).await?;
    let url = server.local_url();
    ui::success(&format!("Development server running at {}", url));
    ui::info(&format!(
        "Serving {} (Server: {})",
        server.config().artifact.display(),
        server.config().server_name()
    ));

    if utils::should_open_browser(&settings) {
        utils::open_browser(&url);
    }

    ui::info("Press Ctrl+C to stop");

    let shutdown = server.shutdown_handle();
    let reason = tokio::select! {
        reason = server.wait() => reason,
        _ = signal::ctrl_c() => {
            shutdown.trigger(StopReason::Interrupted);
            StopReason::Interrupted
        }
    };

    ui::info("Shutting down development server...");
    server.stop().await?;

    match reason {
        StopReason::Fatal(message) => Err(CliError::Server(message)),
        _ => {
            ui::success("Development server stopped");
            Ok(())
        }
    }
}

/// Build the configured builder. The flag says whether to build at startup.
async fn connect_builder(settings: &KilnConfig, root: &Path) -> Result<(Arc<dyn Builder>, bool)> {
    match settings.build.strategy() {
        BuildStrategy::Command { program, args } => {
            let builder: Arc<dyn Builder> = Arc::new(CommandBuilder::new(program, args, root));
            Ok((builder, settings.build.initial))
        }
        BuildStrategy::Pipes { request, response } => {
            ui::info("Connecting to build host...");
            let builder: Arc<dyn Builder> = Arc::new(
                IpcBuilder::open(&root.join(request), &root.join(response))
                    .await
                    .map_err(BuildError::from)?,
            );
            // The host builds before it starts us.
            Ok((builder, false))
        }
        BuildStrategy::None => Err(CliError::InvalidArgument(
            "No build configured\n\nHint: Pass a command after `--`, e.g. `kiln dev -- cargo build`, \
             or set `build.command` in kiln.toml"
                .to_string(),
        )),
    }
}

fn watch_options(settings: &KilnConfig) -> WatchOptions {
    let backend = match settings.watch.poll_interval_ms {
        Some(ms) => WatchBackend::Poll {
            interval: Duration::from_millis(ms),
        },
        None => WatchBackend::Native,
    };
    WatchOptions {
        settle: Duration::from_millis(settings.watch.debounce_ms),
        backend,
    }
}
