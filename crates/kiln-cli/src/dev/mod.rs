//! Development server.
//!
//! - File watching with settle-window batching
//! - Single-flight rebuilds through a command or a build host over pipes
//! - Artifact serving with a `/watcher` WebSocket for reloads and diagnostics
//! - One-shot mode for browser test runs

pub mod builder;
pub mod config;
pub mod coordinator;
pub mod environment;
pub mod events;
pub mod registry;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod stack_trace;
pub mod test_report;
pub mod watcher;

// Re-exports
pub use builder::{Builder, CommandBuilder, IpcBuilder};
pub use config::{Entrypoint, IndexPage, ServerConfig, ServerName};
pub use coordinator::{BuildCoordinator, BuildState};
pub use environment::Environment;
pub use events::{ClientEvent, ConsoleStream, DiagnosticsSink, EventRouter, ResultsSink, TerminalSink};
pub use registry::{ConnectionId, ConnectionRegistry, ServerMessage};
pub use server::{DevServer, ServeMode};
pub use shutdown::{ShutdownHandle, StopReason};
pub use test_report::TestReport;
pub use watcher::{PathWatcher, WatchBackend, WatchOptions};
