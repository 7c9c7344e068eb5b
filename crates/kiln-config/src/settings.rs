//! Serializable settings for the dev server, watcher and build bridge.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root of `kiln.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KilnConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub watch: WatchSettings,

    #[serde(default)]
    pub build: BuildSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Host used in the printed URL. Derived from `bind` when unset.
    #[serde(default)]
    pub host: Option<String>,

    /// HTML file used instead of the built-in index page. Must contain `</head>`.
    #[serde(default)]
    pub custom_index_page: Option<PathBuf>,

    /// Directories whose files are served from the root path.
    #[serde(default)]
    pub resources: Vec<PathBuf>,

    #[serde(default)]
    pub skip_auto_open: bool,

    /// Exposed to the page at `/process-info.json`.
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            host: None,
            custom_index_page: None,
            resources: Vec::new(),
            skip_auto_open: false,
            env: None,
        }
    }
}

impl ServerSettings {
    /// Host for the local URL: the explicit host, or loopback when bound to all interfaces.
    pub fn display_host(&self) -> String {
        if let Some(host) = &self.host {
            return host.clone();
        }
        match self.bind.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSettings {
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Settle window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Use the polling backend with this interval instead of native notifications.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// The compiled module served at `/<file name>`.
    #[serde(default)]
    pub artifact: Option<PathBuf>,

    /// Program and arguments run for each build.
    #[serde(default)]
    pub command: Vec<String>,

    /// Named pipe the server writes build requests to.
    #[serde(default)]
    pub request_pipe: Option<PathBuf>,

    /// Named pipe the server reads build responses from.
    #[serde(default)]
    pub response_pipe: Option<PathBuf>,

    /// Run one build before serving. Only applies to `command`.
    #[serde(default = "default_initial")]
    pub initial: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            artifact: None,
            command: Vec::new(),
            request_pipe: None,
            response_pipe: None,
            initial: default_initial(),
        }
    }
}

/// How builds are triggered, resolved from [`BuildSettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStrategy {
    Command { program: String, args: Vec<String> },
    Pipes { request: PathBuf, response: PathBuf },
    None,
}

impl BuildSettings {
    pub fn strategy(&self) -> BuildStrategy {
        if let (Some(request), Some(response)) = (&self.request_pipe, &self.response_pipe) {
            return BuildStrategy::Pipes {
                request: request.clone(),
                response: response.clone(),
            };
        }
        match self.command.split_first() {
            Some((program, args)) => BuildStrategy::Command {
                program: program.clone(),
                args: args.to_vec(),
            },
            None => BuildStrategy::None,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_initial() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_host_falls_back_to_loopback() {
        let settings = ServerSettings::default();
        assert_eq!(settings.display_host(), "127.0.0.1");
    }

    #[test]
    fn display_host_prefers_explicit_host() {
        let settings = ServerSettings {
            host: Some("devbox.local".into()),
            ..Default::default()
        };
        assert_eq!(settings.display_host(), "devbox.local");
    }

    #[test]
    fn display_host_uses_specific_bind() {
        let settings = ServerSettings {
            bind: "192.168.1.20".into(),
            ..Default::default()
        };
        assert_eq!(settings.display_host(), "192.168.1.20");
    }

    #[test]
    fn strategy_prefers_pipes() {
        let build = BuildSettings {
            request_pipe: Some("req".into()),
            response_pipe: Some("resp".into()),
            ..Default::default()
        };
        assert_eq!(
            build.strategy(),
            BuildStrategy::Pipes {
                request: "req".into(),
                response: "resp".into()
            }
        );
    }

    #[test]
    fn strategy_splits_command() {
        let build = BuildSettings {
            command: vec!["cargo".into(), "build".into(), "--release".into()],
            ..Default::default()
        };
        assert_eq!(
            build.strategy(),
            BuildStrategy::Command {
                program: "cargo".into(),
                args: vec!["build".into(), "--release".into()]
            }
        );
        assert_eq!(BuildSettings::default().strategy(), BuildStrategy::None);
    }
}
