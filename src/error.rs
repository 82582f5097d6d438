//! Errors of the fallible outer surfaces. Building the model itself never fails.
use std::path::PathBuf;

/// Deserialization failure with the JSON path it happened at.
#[derive(Debug, Clone, thiserror::Error)]
#[error("at JSON path {path} → {message}")]
pub struct PathError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON document: {0}")]
    Json(#[from] PathError),
    #[error("JSON pointer `{pointer}` does not resolve to a value")]
    MissingPointer { pointer: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid config {path}: {source}")]
    Parse { path: PathBuf, source: PathError },
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to start schema build pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
