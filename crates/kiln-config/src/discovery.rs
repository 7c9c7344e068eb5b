//! File-based config discovery for CLI use
//!
//! Finds `kiln.toml` and layers it with defaults and `KILN_*` environment
//! variables through figment.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format as _, Serialized, Toml},
    Figment,
};

use crate::error::{ConfigError, Result};
use crate::settings::KilnConfig;

pub const CONFIG_FILE_NAME: &str = "kiln.toml";
pub const ENV_PREFIX: &str = "KILN_";

/// File-based configuration discovery
///
/// # Example
///
/// ```no_run
/// use kiln_config::ConfigDiscovery;
///
/// let config = ConfigDiscovery::new(".").load(None).unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find `kiln.toml` in the root directory
    pub fn find(&self) -> Option<PathBuf> {
        let path = self.root.join(CONFIG_FILE_NAME);
        path.is_file().then_some(path)
    }

    /// Build the layered figment: defaults, then the config file, then `KILN_*` env.
    ///
    /// An explicit path that does not exist is an error; a missing discovered
    /// file is not.
    pub fn figment(&self, explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(KilnConfig::default()));

        let file = match explicit {
            Some(path) => {
                let path = self.root.join(path);
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path));
                }
                Some(path)
            }
            None => self.find(),
        };

        if let Some(path) = file {
            tracing::debug!("Loading config from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate the layered configuration
    pub fn load(&self, explicit: Option<&Path>) -> Result<KilnConfig> {
        KilnConfig::from_figment(self.figment(explicit)?)
    }
}

impl KilnConfig {
    /// Extract from an already layered figment and validate the result.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: KilnConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn find_returns_none_when_no_config() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn find_discovers_toml_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("kiln.toml");
        fs::write(&config_path, "[server]\nport = 9000\n").unwrap();

        let discovery = ConfigDiscovery::new(dir.path());
        assert_eq!(discovery.find().unwrap(), config_path);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = ConfigDiscovery::new(dir.path()).load(Some(Path::new("other.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn file_and_env_are_layered() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "kiln.toml",
                r#"
[server]
port = 9000
resources = ["static"]

[watch]
paths = ["src"]

[build]
artifact = "target/app.wasm"
command = ["cargo", "build"]
"#,
            )?;
            jail.set_env("KILN_SERVER__PORT", "9100");
            jail.set_env("KILN_WATCH__DEBOUNCE_MS", "250");

            let config = ConfigDiscovery::new(jail.directory())
                .load(None)
                .map_err(|e| e.to_string())?;

            assert_eq!(config.server.port, 9100);
            assert_eq!(config.server.resources, vec![PathBuf::from("static")]);
            assert_eq!(config.watch.debounce_ms, 250);
            assert_eq!(config.watch.paths, vec![PathBuf::from("src")]);
            assert_eq!(config.build.artifact, Some(PathBuf::from("target/app.wasm")));
            Ok(())
        });
    }

    #[test]
    fn defaults_apply_without_file() {
        Jail::expect_with(|jail| {
            let figment = ConfigDiscovery::new(jail.directory())
                .figment(None)
                .map_err(|e| e.to_string())?;
            let config: KilnConfig = figment.extract()?;
            assert_eq!(config, KilnConfig::default());
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.watch.debounce_ms, 100);
            Ok(())
        });
    }
}
