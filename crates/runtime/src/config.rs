//! Player configuration, read from `gdplay.toml` next to the executable.

use std::fs;
use std::path::{Path, PathBuf};

use gd_assets::DEFAULT_BUNDLE_FILE;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};
use crate::module::platform_module_extension;

pub const CONFIG_FILE_NAME: &str = "gdplay.toml";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Relative paths are taken from the working directory.
    pub bundle_path: Option<PathBuf>,
    /// JSON instruction catalog. Without one, parameter insertion has
    /// nothing to go on and legacy documents keep their parameters.
    pub catalog_path: Option<PathBuf>,
    pub module_extension: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedConfig {
    pub bundle_path: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub module_extension: String,
    pub log_level: String,
}

impl RuntimeConfig {
    pub fn from_toml(text: &str) -> RuntimeResult<Self> {
        toml::from_str(text).map_err(|err| RuntimeError::Config(err.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|err| RuntimeError::Config(format!("{}: {err}", path.display())))
    }

    /// Reads `gdplay.toml` from `dir`, or returns the defaults when the file
    /// does not exist.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = dir.as_ref().join(CONFIG_FILE_NAME);
        if !path.is_file() {
            debug!(path = %path.display(), "no player config, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn resolve(&self) -> ResolvedConfig {
        ResolvedConfig {
            bundle_path: self
                .bundle_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BUNDLE_FILE)),
            catalog_path: self.catalog_path.clone(),
            module_extension: self
                .module_extension
                .clone()
                .unwrap_or_else(|| platform_module_extension().to_string()),
            log_level: self
                .log_level
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_to_platform_values() {
        let resolved = RuntimeConfig::default().resolve();
        assert_eq!(resolved.bundle_path, PathBuf::from("gam.egd"));
        assert_eq!(resolved.module_extension, platform_module_extension());
        assert_eq!(resolved.log_level, "info");
        assert!(resolved.catalog_path.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = RuntimeConfig::from_toml(
            r#"
            bundle_path = "data/game.egd"
            log_level = "debug"
            "#,
        )
        .expect("parse config");

        let resolved = config.resolve();
        assert_eq!(resolved.bundle_path, PathBuf::from("data/game.egd"));
        assert_eq!(resolved.log_level, "debug");
        assert_eq!(resolved.module_extension, platform_module_extension());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = RuntimeConfig::load_from_dir(dir.path()).expect("defaults");
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn invalid_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(CONFIG_FILE_NAME), "log_level = [1, 2").expect("write");

        let err = RuntimeConfig::load_from_dir(dir.path()).expect_err("invalid toml");
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
