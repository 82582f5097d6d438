//! Build and emission settings, loadable from a JSON file.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub build: BuildConfig,
    pub emit: EmitOptions,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Worker threads in the builder's fan-out pool. `None` sizes it to the
    /// available parallelism.
    pub threads: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitOptions {
    /// How many levels of nested schemas are materialized.
    pub max_depth: usize,
    /// Materialize `$ref` targets instead of emitting `{"$ref": ...}`.
    pub expand_refs: bool,
    /// Attach `x-origin` pointers to every emitted schema.
    pub origins: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self { max_depth: 16, expand_refs: false, origins: false }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        crate::path_de::from_str_with_path(&source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: Config = crate::path_de::from_str_with_path(r#"{"build": {"threads": 2}}"#).unwrap();
        assert_eq!(cfg.build.threads, Some(2));
        assert_eq!(cfg.emit, EmitOptions::default());
    }

    #[test]
    fn unknown_keys_are_rejected_with_path() {
        let err = crate::path_de::from_str_with_path::<Config>(r#"{"emit": {"depth": 3}}"#).unwrap_err();
        assert!(err.path.starts_with("emit"), "{err}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
