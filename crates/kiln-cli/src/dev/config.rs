//! Resolved, immutable configuration for one server run.
//!
//! Built once from [`kiln_config::KilnConfig`] before anything starts, so
//! filesystem problems (missing resources, a custom index page without
//! `</head>`) stop the launch instead of surfacing on the first request.

use crate::error::{CliError, Result, ResultExt, ServerConfigError};
use kiln_config::KilnConfig;
use rust_embed::RustEmbed;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const SERVER_NAME: &str = "kiln";

#[derive(RustEmbed)]
#[folder = "assets/entrypoint"]
struct EntrypointAssets;

/// Bootstrap script the index page loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entrypoint {
    /// Runs the module and reloads on `reload`.
    Dev,
    /// Runs the module once and reports the result.
    Test,
}

impl Entrypoint {
    pub fn file_name(&self) -> &'static str {
        match self {
            Entrypoint::Dev => "dev.js",
            Entrypoint::Test => "test.js",
        }
    }

    pub fn route(&self) -> String {
        format!("/{}", self.file_name())
    }

    pub fn content(&self) -> Cow<'static, [u8]> {
        EntrypointAssets::get(self.file_name())
            .map(|file| file.data)
            .unwrap_or(Cow::Borrowed(b""))
    }
}

const DEFAULT_INDEX: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
  </head>
  <body></body>
</html>
"#;

const HEAD_CLOSE: &str = "</head>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexPage {
    Default,
    Custom { path: PathBuf, html: String },
}

impl IndexPage {
    /// Read and validate a custom index page.
    pub fn load(path: &Path) -> Result<Self> {
        let html = std::fs::read_to_string(path).with_path(path)?;
        Self::from_html(path, html)
    }

    pub fn from_html(path: &Path, html: String) -> Result<Self> {
        if !html.contains(HEAD_CLOSE) {
            return Err(ServerConfigError::IndexMissingHead(path.to_path_buf()).into());
        }
        Ok(IndexPage::Custom {
            path: path.to_path_buf(),
            html,
        })
    }

    /// The page with a module script for `entrypoint` placed before the first `</head>`.
    pub fn render(&self, entrypoint: Entrypoint) -> String {
        let html = match self {
            IndexPage::Default => DEFAULT_INDEX,
            IndexPage::Custom { html, .. } => html.as_str(),
        };
        inject_script(html, &entrypoint.route())
    }
}

fn inject_script(html: &str, src: &str) -> String {
    let tag = format!(r#"<script type="module" src="{src}"></script>"#);
    match html.find(HEAD_CLOSE) {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push_str(&html[pos..]);
            out
        }
        None => html.to_string(),
    }
}

/// Value of the `Server` header: `<name>/<pid>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerName {
    pub name: String,
    pub pid: u32,
}

impl ServerName {
    pub fn new(pid: u32) -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            pid,
        }
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.pid)
    }
}

impl FromStr for ServerName {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CliError::InvalidArgument(format!("not a kiln server header: {s}"));
        let (name, pid) = s.rsplit_once('/').ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }
        let pid = pid.parse().map_err(|_| invalid())?;
        Ok(Self {
            name: name.to_string(),
            pid,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Host shown in the local URL.
    pub host: String,
    /// Build output served at `/<file name>`.
    pub artifact: PathBuf,
    /// Directories served from the root path.
    pub resources: Vec<PathBuf>,
    pub index: IndexPage,
    pub entrypoint: Entrypoint,
    /// Process id reported in the `Server` header.
    pub pid: u32,
    /// Served at `/process-info.json`.
    pub env: Option<BTreeMap<String, String>>,
}

impl ServerConfig {
    /// Resolve settings against `root`, checking everything the server will serve.
    pub fn resolve(settings: &KilnConfig, root: &Path, entrypoint: Entrypoint) -> Result<Self> {
        let server = &settings.server;

        let bind: IpAddr = server.bind.parse().map_err(|e: std::net::AddrParseError| {
            ServerConfigError::InvalidBind {
                value: server.bind.clone(),
                reason: e.to_string(),
            }
        })?;

        let artifact = settings
            .build
            .artifact
            .as_ref()
            .map(|p| root.join(p))
            .ok_or(ServerConfigError::MissingArtifact)?;
        if artifact.file_name().is_none() {
            return Err(ServerConfigError::InvalidArtifact(artifact).into());
        }

        let mut resources = Vec::with_capacity(server.resources.len());
        for dir in &server.resources {
            let dir = root.join(dir);
            if !dir.is_dir() {
                return Err(ServerConfigError::ResourceNotDirectory(dir).into());
            }
            resources.push(dir);
        }

        let index = match &server.custom_index_page {
            Some(path) => IndexPage::load(&root.join(path))?,
            None => IndexPage::Default,
        };

        Ok(Self {
            bind,
            port: server.port,
            host: server.display_host(),
            artifact,
            resources,
            index,
            entrypoint,
            pid: std::process::id(),
            env: server.env.clone(),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// URL path of the artifact, e.g. `/main.wasm`.
    pub fn artifact_route(&self) -> String {
        let name = self
            .artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("/{name}")
    }

    pub fn server_name(&self) -> ServerName {
        ServerName::new(self.pid)
    }

    /// Local URL for a listener on `port`.
    pub fn local_url(&self, port: u16) -> String {
        format!("http://{}:{}/", self.host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn settings_with_artifact() -> KilnConfig {
        let mut settings = KilnConfig::default();
        settings.build.artifact = Some(PathBuf::from("out/main.wasm"));
        settings
    }

    #[test]
    fn test_default_index_gets_script_before_head_close() {
        let html = IndexPage::Default.render(Entrypoint::Dev);
        let tag = r#"<script type="module" src="/dev.js"></script>"#;
        assert_eq!(html.matches(tag).count(), 1);
        assert!(html.find(tag).unwrap() < html.find("</head>").unwrap());
        assert!(html.contains(r#"<meta charset="utf-8" />"#));
    }

    #[test]
    fn test_custom_index_injected_once() {
        let page = IndexPage::from_html(
            Path::new("index.html"),
            "<html><head><title>App</title></head><body><!-- </head> --></body></html>".into(),
        )
        .unwrap();

        let html = page.render(Entrypoint::Test);
        let tag = r#"<script type="module" src="/test.js"></script>"#;
        assert_eq!(html.matches(tag).count(), 1);
        assert!(html.contains(&format!("<title>App</title>{tag}</head>")));
    }

    #[test]
    fn test_custom_index_without_head_is_rejected() {
        let err = IndexPage::from_html(Path::new("bad.html"), "<html><body></body></html>".into())
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::ServerConfig(ServerConfigError::IndexMissingHead(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_headless_custom_index() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<html><body></body></html>").unwrap();
        let mut settings = settings_with_artifact();
        settings.server.custom_index_page = Some(PathBuf::from("index.html"));

        let err = ServerConfig::resolve(&settings, dir.path(), Entrypoint::Dev).unwrap_err();
        assert!(err.to_string().contains("</head>"));
    }

    #[test]
    fn test_resolve_requires_artifact() {
        let dir = TempDir::new().unwrap();
        let err = ServerConfig::resolve(&KilnConfig::default(), dir.path(), Entrypoint::Dev)
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::ServerConfig(ServerConfigError::MissingArtifact)
        ));
    }

    #[test]
    fn test_resolve_rejects_missing_resource_dir() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_with_artifact();
        settings.server.resources = vec![PathBuf::from("static")];

        let err = ServerConfig::resolve(&settings, dir.path(), Entrypoint::Dev).unwrap_err();
        assert!(matches!(
            err,
            CliError::ServerConfig(ServerConfigError::ResourceNotDirectory(_))
        ));
    }

    #[test]
    fn test_resolve_derives_host_and_routes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("static")).unwrap();
        let mut settings = settings_with_artifact();
        settings.server.resources = vec![PathBuf::from("static")];
        settings.server.port = 9000;

        let config = ServerConfig::resolve(&settings, dir.path(), Entrypoint::Dev).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.artifact_route(), "/main.wasm");
        assert_eq!(config.socket_addr().port(), 9000);
        assert_eq!(config.local_url(9000), "http://127.0.0.1:9000/");
        assert_eq!(config.resources, vec![dir.path().join("static")]);
        assert_eq!(config.pid, std::process::id());
    }

    #[test]
    fn test_resolve_rejects_bad_bind() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings_with_artifact();
        settings.server.bind = "localhost:80".into();

        let err = ServerConfig::resolve(&settings, dir.path(), Entrypoint::Dev).unwrap_err();
        assert!(err.to_string().contains("localhost:80"));
    }

    #[test]
    fn test_server_name_round_trip() {
        let name = ServerName::new(4242);
        assert_eq!(name.to_string(), "kiln/4242");
        assert_eq!("kiln/4242".parse::<ServerName>().unwrap(), name);
        assert!("kiln".parse::<ServerName>().is_err());
        assert!("kiln/abc".parse::<ServerName>().is_err());
        assert!("/12".parse::<ServerName>().is_err());
    }

    #[test]
    fn test_entrypoints_are_embedded() {
        assert!(!Entrypoint::Dev.content().is_empty());
        assert!(!Entrypoint::Test.content().is_empty());
        assert_eq!(Entrypoint::Test.route(), "/test.js");
    }
}
