//! Messages sent by the page over the event channel, and where they go.
//!
//! Text frames carry JSON events tagged by `kind`. Binary frames carry
//! console output: a little-endian `u16` stream kind followed by UTF-8 text.
//! Anything that does not decode is dropped; a misbehaving page never closes
//! its own connection.

use crate::dev::environment::Environment;
use crate::dev::shutdown::{ShutdownHandle, StopReason};
use crate::dev::stack_trace::{self, FrameKind};
use crate::dev::test_report::TestReport;
use crate::ui;
use owo_colors::{OwoColorize, Stream::Stderr};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClientEvent {
    StackTrace {
        #[serde(rename = "stackTrace")]
        stack_trace: String,
    },
    TestRunOutput {
        #[serde(rename = "testRunOutput")]
        test_run_output: String,
    },
    TestPassed,
    ErrorReport {
        #[serde(rename = "errorReport")]
        error_report: String,
    },
}

impl ClientEvent {
    /// Decode a text frame; `None` for malformed JSON or an unknown kind.
    pub fn decode(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::debug!("Ignoring undecodable client message: {err}");
                None
            }
        }
    }
}

pub const STDOUT_KIND: u16 = 1001;
pub const STDERR_KIND: u16 = 1002;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

/// Decode a binary console frame into its stream and text.
pub fn decode_console_frame(data: &[u8]) -> Option<(ConsoleStream, String)> {
    let (kind, payload) = data.split_first_chunk::<2>()?;
    let stream = match u16::from_le_bytes(*kind) {
        STDOUT_KIND => ConsoleStream::Stdout,
        STDERR_KIND => ConsoleStream::Stderr,
        _ => return None,
    };
    if payload.is_empty() {
        return None;
    }
    Some((stream, String::from_utf8_lossy(payload).into_owned()))
}

/// Receives runtime diagnostics from connected pages.
pub trait DiagnosticsSink: Send + Sync {
    fn stack_trace(&self, environment: Environment, raw: &str);

    fn error_report(&self, report: &str);

    fn console(&self, stream: ConsoleStream, line: &str);
}

/// Receives test-run output.
pub trait ResultsSink: Send + Sync {
    fn test_output(&self, output: &str) -> TestReport;
}

/// Writes diagnostics and test results to the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSink;

impl DiagnosticsSink for TerminalSink {
    fn stack_trace(&self, environment: Environment, raw: &str) {
        match stack_trace::parse(raw, environment) {
            Some(frames) if !frames.is_empty() => {
                ui::error("An error occurred, here's a stack trace for it:");
                for frame in frames {
                    let kind = match frame.kind {
                        FrameKind::WebAssembly => "wasm",
                        FrameKind::JavaScript => "js",
                    };
                    eprintln!(
                        "  {} {} {}",
                        kind.if_supports_color(Stderr, |s| s.dimmed()),
                        frame.symbol.if_supports_color(Stderr, |s| s.cyan()),
                        format!("at {}", frame.location.as_deref().unwrap_or("<unknown>"))
                            .if_supports_color(Stderr, |s| s.dimmed())
                    );
                }
            }
            _ => {
                ui::error(&format!(
                    "An error occurred in {environment}, here's the raw stack trace for it:"
                ));
                ui::output_block(raw);
            }
        }
    }

    fn error_report(&self, report: &str) {
        ui::error("An error occurred:");
        ui::output_block(report);
    }

    fn console(&self, stream: ConsoleStream, line: &str) {
        match stream {
            ConsoleStream::Stdout => eprintln!("stdout: {line}"),
            ConsoleStream::Stderr => {
                eprintln!("{}", format!("stderr: {line}").if_supports_color(Stderr, |s| s.red()))
            }
        }
    }
}

impl ResultsSink for TerminalSink {
    fn test_output(&self, output: &str) -> TestReport {
        let report = TestReport::parse(output);
        ui::output_block(output);
        if !report.recognized {
            ui::warning("Test output did not contain a recognizable summary");
        } else if report.had_failures() {
            ui::error(&format!(
                "{} passed, {} failed",
                report.passed, report.failed
            ));
            for name in &report.failures {
                eprintln!("  {}", name.if_supports_color(Stderr, |s| s.red()));
            }
        } else {
            ui::success(&format!("{} passed", report.passed));
        }
        report
    }
}

/// Routes decoded page events to the sinks and, in one-shot mode, ends the
/// run once a result arrives.
#[derive(Clone)]
pub struct EventRouter {
    diagnostics: Arc<dyn DiagnosticsSink>,
    results: Arc<dyn ResultsSink>,
    one_shot: Option<ShutdownHandle>,
}

impl EventRouter {
    pub fn new(diagnostics: Arc<dyn DiagnosticsSink>, results: Arc<dyn ResultsSink>) -> Self {
        Self {
            diagnostics,
            results,
            one_shot: None,
        }
    }

    /// Stop the server through `shutdown` when the test run reports a result.
    pub fn one_shot(mut self, shutdown: ShutdownHandle) -> Self {
        self.one_shot = Some(shutdown);
        self
    }

    pub fn is_one_shot(&self) -> bool {
        self.one_shot.is_some()
    }

    pub fn handle_text(&self, text: &str, environment: Environment) {
        let Some(event) = ClientEvent::decode(text) else {
            return;
        };

        match event {
            ClientEvent::StackTrace { stack_trace } => {
                self.diagnostics.stack_trace(environment, &stack_trace);
            }
            ClientEvent::TestRunOutput { test_run_output } => {
                let report = self.results.test_output(&test_run_output);
                self.finish(report.had_failures());
            }
            ClientEvent::TestPassed => self.finish(false),
            ClientEvent::ErrorReport { error_report } => {
                self.diagnostics.error_report(&error_report);
                self.finish(true);
            }
        }
    }

    pub fn handle_binary(&self, data: &[u8]) {
        let Some((stream, text)) = decode_console_frame(data) else {
            tracing::debug!("Ignoring binary frame of {} bytes", data.len());
            return;
        };
        for line in text.lines() {
            self.diagnostics.console(stream, line);
        }
    }

    fn finish(&self, had_error: bool) {
        if let Some(shutdown) = &self.one_shot {
            shutdown.trigger(StopReason::TestFinished { had_error });
        }
    }
}
