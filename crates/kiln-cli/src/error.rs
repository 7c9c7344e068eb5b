//! Error handling for the kiln CLI and dev server.
//!
//! `CliError` is the top-level type returned by commands. The dev subsystem
//! has its own domain errors, each with a different severity:
//!
//! - [`WatchError`] is fatal. At startup it aborts launch; after startup the
//!   server shuts down.
//! - [`BuildError::Failed`] is not fatal. The output is reported and the
//!   previous artifact keeps being served.
//! - [`ProtocolError`] means the build host broke the IPC contract and is
//!   always fatal.
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_index(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).with_path(path)
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

mod miette;

pub use self::miette::{build_error_to_miette, cli_error_to_miette};

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Loading or validating `kiln.toml`
    #[error("Configuration error: {0}")]
    Config(#[from] kiln_config::ConfigError),

    /// Resolving the server configuration against the filesystem
    #[error("Configuration error: {0}")]
    ServerConfig(#[from] ServerConfigError),

    #[error("File watcher error: {0}")]
    Watch(#[from] WatchError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// The listener could not be bound
    #[error("Failed to bind {addr}: {source}\n\nHint: Is another server already using this port?")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(String),

    /// A one-shot test run reported failures
    #[error("Tests failed")]
    TestsFailed,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

/// Errors found while turning settings into a `ServerConfig`.
#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("No build artifact configured\n\nHint: Set `build.artifact` in kiln.toml or pass --artifact")]
    MissingArtifact,

    #[error("Build artifact path has no file name: {}", .0.display())]
    InvalidArtifact(PathBuf),

    #[error("Custom index page {} has no </head> tag\n\nHint: The entrypoint script is injected before </head>", .0.display())]
    IndexMissingHead(PathBuf),

    #[error("Resource path is not a directory: {}", .0.display())]
    ResourceNotDirectory(PathBuf),

    #[error("Invalid bind address '{value}': {reason}")]
    InvalidBind { value: String, reason: String },
}

/// File watcher failures.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watch path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Permission denied while watching {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Watch limit reached while adding {}\n\nHint: Raise the OS watch limit (e.g. fs.inotify.max_user_watches) or watch fewer paths", .0.display())]
    ResourceExhausted(PathBuf),

    #[error("Failed to watch {}: {source}", .path.display())]
    Backend {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The backend failed after it was started
    #[error("File watcher stopped working: {0}")]
    Runtime(#[source] notify::Error),

    /// The backend lost events and asked for a rescan
    #[error("File watcher event queue overflowed; changes may have been missed")]
    Overflow,

    #[error("Failed to start watcher thread: {0}")]
    Thread(#[source] std::io::Error),
}

impl WatchError {
    /// Classify a backend error raised while adding `path`.
    pub fn from_notify(path: PathBuf, err: notify::Error) -> Self {
        match &err.kind {
            notify::ErrorKind::PathNotFound => WatchError::PathNotFound(path),
            notify::ErrorKind::MaxFilesWatch => WatchError::ResourceExhausted(path),
            notify::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                WatchError::PermissionDenied(path)
            }
            notify::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                WatchError::PathNotFound(path)
            }
            _ => WatchError::Backend { path, source: err },
        }
    }
}

/// Build failures.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build ran and reported failure
    #[error("Build failed{}", output_suffix(.output))]
    Failed { output: String },

    /// The build command could not be started
    #[error("Failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl BuildError {
    /// Whether the server has to shut down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BuildError::Protocol(_))
    }
}

fn output_suffix(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(":\n{}", output)
    }
}

/// Violations of the one-byte build request/response exchange.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Build host closed the response channel")]
    ChannelClosed,

    #[error("Unexpected build response byte {0:#04x}")]
    UnexpectedResponse(u8),

    #[error("Build channel I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match Into::<CliError>::into(e) {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}
