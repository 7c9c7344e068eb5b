//! Helpers shared by the commands.

use crate::cli::ConfigOverrides;
use crate::error::{CliError, Result};
use crate::ui;
use kiln_config::{ConfigDiscovery, KilnConfig};
use std::path::{Path, PathBuf};

/// Get the current working directory.
pub fn get_cwd() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| {
        CliError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to get current directory: {}", e),
        ))
    })
}

/// Load `kiln.toml` (or `explicit`), the `KILN_*` environment and the
/// command-line flags, in that order of precedence from lowest to highest.
pub fn load_settings(
    root: &Path,
    explicit: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<KilnConfig> {
    let figment = ConfigDiscovery::new(root).figment(explicit)?;
    Ok(KilnConfig::from_figment(overrides.apply(figment))?)
}

/// Resolve configured watch paths against `root`, defaulting to `root/src`.
pub fn watch_paths(settings: &KilnConfig, root: &Path) -> Result<Vec<PathBuf>> {
    if !settings.watch.paths.is_empty() {
        return Ok(settings.watch.paths.iter().map(|p| root.join(p)).collect());
    }

    let src = root.join("src");
    if src.is_dir() {
        return Ok(vec![src]);
    }
    Err(CliError::InvalidArgument(
        "Nothing to watch\n\nHint: Pass --watch <PATH> or set `watch.paths` in kiln.toml"
            .to_string(),
    ))
}

/// Whether to open a browser for this run.
pub fn should_open_browser(settings: &KilnConfig) -> bool {
    !settings.server.skip_auto_open && !ui::is_ci()
}

/// Open `url` in the default browser. Failure is only a warning.
pub fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    match result {
        Ok(_) => tracing::debug!("Opened browser at {}", url),
        Err(e) => ui::warning(&format!("Failed to open browser: {}", e)),
    }
}
