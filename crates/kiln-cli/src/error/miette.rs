//! Miette reports for errors that reach `main`.

use crate::error::{BuildError, CliError};
use ::miette::Report;

/// Convert a `CliError` into a report for the terminal.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => build_error_to_miette(e),
        CliError::TestsFailed => ::miette::miette!(
            help = "The test output above lists the failing tests",
            "Tests failed"
        ),
        CliError::Watch(e) => ::miette::miette!(
            help = "The dev server cannot notice changes without a working watcher",
            "File watcher error: {}",
            e
        ),
        _ => ::miette::miette!("{}", err),
    }
}

/// Convert a `BuildError` into a report.
pub fn build_error_to_miette(err: BuildError) -> Report {
    match err {
        BuildError::Protocol(e) => ::miette::miette!(
            help = "The build host must answer every request byte with exactly one byte: 0 or 1",
            "Build host protocol error: {}",
            e
        ),
        BuildError::Spawn { program, source } => ::miette::miette!(
            help = "Check that the build command is installed and on PATH",
            "Failed to run `{}`: {}",
            program,
            source
        ),
        _ => ::miette::miette!("{}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    #[test]
    fn test_reports_keep_messages() {
        let report = cli_error_to_miette(CliError::TestsFailed);
        assert_eq!(report.to_string(), "Tests failed");

        let report = build_error_to_miette(ProtocolError::ChannelClosed.into());
        assert!(report.to_string().contains("closed the response channel"));

        let report = cli_error_to_miette(CliError::InvalidArgument("bad".into()));
        assert_eq!(report.to_string(), "Invalid argument: bad");
    }
}
