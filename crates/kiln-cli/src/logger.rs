//! Logging setup for the kiln CLI.
//!
//! Status lines meant for the operator go through [`crate::ui`]; everything
//! else is a `tracing` event filtered here. `RUST_LOG` overrides the default
//! filter unless `--verbose` or `--quiet` is given.
//!
//! ```rust,no_run
//! use kiln_cli::logger::init_logger;
//!
//! init_logger(false, false, false);
//! tracing::info!("Watching 2 paths");
//! ```

use crate::ui;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERBOSE_FILTER: &str = "kiln=debug,kiln_cli=debug,kiln_config=debug,tower_http=debug";
const QUIET_FILTER: &str = "kiln=error,kiln_cli=error";
const DEFAULT_FILTER: &str = "kiln=info,kiln_cli=info,kiln_config=info";

/// Pick the filter directives for the given flags. `--verbose` wins over `--quiet`.
pub fn filter_directives(verbose: bool, quiet: bool) -> Option<&'static str> {
    if verbose {
        Some(VERBOSE_FILTER)
    } else if quiet {
        Some(QUIET_FILTER)
    } else {
        None
    }
}

/// Initialize the global tracing subscriber. Call once, before any logging.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = match filter_directives(verbose, quiet) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color && ui::should_use_color())
        .compact();

    // `try_init` so tests and embedders that already installed a subscriber keep theirs.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
