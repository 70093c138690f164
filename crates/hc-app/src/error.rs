//! Error types for the hc-app service layer.

use std::path::PathBuf;

use hc_core::CoreError;
use hc_data::DataError;
use hc_eval::EvalError;

/// Application error type that wraps errors from the library crates and
/// provides a unified error interface for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Project(#[from] hc_project::ProjectError),

    #[error(transparent)]
    Validation(#[from] hc_project::ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("Unknown software '{name}' (registered: {known:?})")]
    UnknownBackend { name: String, known: Vec<String> },

    #[error("Software '{name}' cannot act as the {expected} backend")]
    RoleMismatch { name: String, expected: String },

    #[error("Unknown algorithm '{name}' for {software}")]
    UnknownAlgorithm { name: String, software: String },

    #[error("Unsupported configuration: {message}")]
    Unsupported { message: String },

    #[error("No observations configured")]
    MissingObservations,

    #[error("Objective flux '{flux}' is not among the observed variables {observed:?}")]
    UnobservedFlux { flux: String, observed: Vec<String> },

    #[error("No output file provides variable '{flux}'")]
    MissingOutput { flux: String },

    #[error("Model executable {executable} failed: {status}")]
    Execution { executable: PathBuf, status: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for hc-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub(crate) fn at(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| AppError::PathIo { path, source }
    }
}
