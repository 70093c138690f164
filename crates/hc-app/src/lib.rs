//! Shared application service layer for hydrocal.
//!
//! This crate sits between the CLI and the library crates: it prepares
//! calibration instances through pluggable software backends and runs the
//! per-iteration evaluation with its penalty fallback.

pub mod backend;
pub mod error;
pub mod eval_service;
pub mod progress;
pub mod query;
pub mod runner;
pub mod setup_service;

// Re-export key types for convenience
pub use backend::{Backend, BackendRegistry, InstancePlan, Role, Template, ostrich_algorithm};
pub use error::{AppError, AppResult};
pub use eval_service::{
    EvalOutcome, EvalPaths, EvalRequest, artifact_name, evaluate, evaluate_with_progress, reducer_table,
};
pub use progress::{EvalProgressEvent, EvalStage};
pub use query::{DatasetSummary, VariableSummary, extract_station_series, summarize_dataset};
pub use runner::{ModelRunner, ProcessRunner, RunRequest, stage_documents};
pub use setup_service::{InstanceSummary, PreparedInstance, load_observations, prepare_instance};
