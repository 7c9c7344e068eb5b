//! Command-line flags as the last configuration layer.
//!
//! Only flags the user actually passed are serialized, so anything left out
//! keeps the value from `kiln.toml` or the environment.

use super::{DevArgs, ServeArgs, TestArgs};
use figment::{Figment, providers::Serialized};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "ServerOverrides::is_empty")]
    server: ServerOverrides,
    #[serde(skip_serializing_if = "WatchOverrides::is_empty")]
    watch: WatchOverrides,
    #[serde(skip_serializing_if = "BuildOverrides::is_empty")]
    build: BuildOverrides,
}

#[derive(Debug, Default, Serialize)]
struct ServerOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    bind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_index_page: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_auto_open: Option<bool>,
}

#[derive(Debug, Default, Serialize)]
struct WatchOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    paths: Option<Vec<PathBuf>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    debounce_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Serialize)]
struct BuildOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_pipe: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_pipe: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial: Option<bool>,
}

impl ServerOverrides {
    fn is_empty(&self) -> bool {
        self.bind.is_none()
            && self.port.is_none()
            && self.host.is_none()
            && self.custom_index_page.is_none()
            && self.resources.is_none()
            && self.skip_auto_open.is_none()
    }
}

impl WatchOverrides {
    fn is_empty(&self) -> bool {
        self.paths.is_none() && self.debounce_ms.is_none() && self.poll_interval_ms.is_none()
    }
}

impl BuildOverrides {
    fn is_empty(&self) -> bool {
        self.artifact.is_none()
            && self.command.is_none()
            && self.request_pipe.is_none()
            && self.response_pipe.is_none()
            && self.initial.is_none()
    }
}

fn non_empty<T>(values: &[T]) -> Option<Vec<T>>
where
    T: Clone,
{
    (!values.is_empty()).then(|| values.to_vec())
}

impl ConfigOverrides {
    fn from_serve(args: &ServeArgs) -> Self {
        Self {
            server: ServerOverrides {
                bind: args.bind.clone(),
                port: args.port,
                host: args.host.clone(),
                custom_index_page: args.custom_index_page.clone(),
                resources: non_empty(&args.resources),
                skip_auto_open: args.skip_auto_open.then_some(true),
            },
            build: BuildOverrides {
                artifact: args.artifact.clone(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn from_dev(args: &DevArgs) -> Self {
        let mut overrides = Self::from_serve(&args.serve);
        overrides.watch = WatchOverrides {
            paths: non_empty(&args.watch.watch),
            debounce_ms: args.watch.debounce_ms,
            poll_interval_ms: args.watch.poll_interval_ms,
        };
        overrides.build.command = non_empty(&args.build.command);
        overrides.build.request_pipe = args.build.request_pipe.clone();
        overrides.build.response_pipe = args.build.response_pipe.clone();
        overrides.build.initial = args.build.no_initial_build.then_some(false);
        overrides
    }

    pub fn from_test(args: &TestArgs) -> Self {
        Self::from_serve(&args.serve)
    }

    pub fn is_empty(&self) -> bool {
        self.server.is_empty() && self.watch.is_empty() && self.build.is_empty()
    }

    /// Merge these flags over `figment`.
    pub fn apply(&self, figment: Figment) -> Figment {
        if self.is_empty() {
            return figment;
        }
        figment.merge(Serialized::defaults(self))
    }
}
