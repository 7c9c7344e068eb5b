use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Available kiln subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the artifact and rebuild it when sources change
    ///
    /// Pages loaded from the server reload after every successful build.
    /// Failed builds are reported here and the previous artifact stays up.
    Dev(DevArgs),

    /// Serve the test artifact once and exit with its result
    ///
    /// The page runs the tests and reports back over the event channel;
    /// the exit code is non-zero when any test failed.
    Test(TestArgs),
}

/// Options shared by every command that serves an artifact
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Address to bind (e.g. 127.0.0.1 or 0.0.0.0)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Host name to show in the server URL
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Build artifact to serve
    #[arg(short, long, value_name = "FILE")]
    pub artifact: Option<PathBuf>,

    /// Directory served at the root path (repeatable)
    #[arg(short, long = "resources", value_name = "DIR")]
    pub resources: Vec<PathBuf>,

    /// HTML page to serve instead of the built-in index
    ///
    /// Must contain a </head> tag; the entrypoint script is injected before it.
    #[arg(long, value_name = "FILE")]
    pub custom_index_page: Option<PathBuf>,

    /// Do not open a browser once the server is up
    #[arg(long)]
    pub skip_auto_open: bool,
}

/// How builds are triggered
#[derive(Args, Debug, Default, Clone)]
pub struct BuildArgs {
    /// Named pipe kiln writes build requests to
    #[arg(long, value_name = "PIPE", requires = "response_pipe")]
    pub request_pipe: Option<PathBuf>,

    /// Named pipe kiln reads build results from
    #[arg(long, value_name = "PIPE", requires = "request_pipe")]
    pub response_pipe: Option<PathBuf>,

    /// Skip the build kiln runs right after starting
    #[arg(long)]
    pub no_initial_build: bool,

    /// Build command, run for every rebuild
    ///
    /// Example: kiln dev -w src -- cargo build --target wasm32-wasip1
    #[arg(last = true, value_name = "COMMAND", conflicts_with = "request_pipe")]
    pub command: Vec<String>,
}

/// What to watch
#[derive(Args, Debug, Default, Clone)]
pub struct WatchArgs {
    /// File or directory to watch (repeatable)
    #[arg(short, long = "watch", value_name = "PATH")]
    pub watch: Vec<PathBuf>,

    /// Quiet period before a batch of changes triggers a build, in milliseconds
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Poll the filesystem at this interval instead of using native events
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,
}

/// Arguments for the dev command
#[derive(Args, Debug, Default, Clone)]
pub struct DevArgs {
    #[command(flatten)]
    pub serve: ServeArgs,

    #[command(flatten)]
    pub watch: WatchArgs,

    #[command(flatten)]
    pub build: BuildArgs,
}

/// Arguments for the test command
#[derive(Args, Debug, Default, Clone)]
pub struct TestArgs {
    #[command(flatten)]
    pub serve: ServeArgs,
}
