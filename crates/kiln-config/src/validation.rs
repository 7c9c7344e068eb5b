//! Schema validation for [`KilnConfig`]. Filesystem checks happen when the
//! server resolves its configuration.

use crate::error::{ConfigError, Result};
use crate::settings::KilnConfig;

impl KilnConfig {
    pub fn validate(&self) -> Result<()> {
        let build = &self.build;

        if build.request_pipe.is_some() != build.response_pipe.is_some() {
            return Err(ConfigError::IncompletePipes);
        }
        if build.request_pipe.is_some() && !build.command.is_empty() {
            return Err(ConfigError::ConflictingBuilders);
        }
        if build.command.first().is_some_and(|program| program.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "build.command",
                message: "program name cannot be empty".to_string(),
            });
        }
        if self.watch.debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "watch.debounce_ms",
                message: "settle window must be at least 1ms".to_string(),
            });
        }
        if self.watch.poll_interval_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "watch.poll_interval_ms",
                message: "poll interval must be at least 1ms".to_string(),
            });
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.bind",
                message: "bind address cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}
