//! hc-eval: scoring side of a calibration run.
//!
//! Contains:
//! - subset (calibration windows onto a regular time axis)
//! - resample (per-variable reducers, frequency reconciliation)
//! - metrics (goodness-of-fit functions by name)
//! - expr (objective expressions over per-station metric values)
//! - objective (flux → metric → expression scoring)

pub mod error;
pub mod expr;
pub mod metrics;
pub mod objective;
pub mod resample;
pub mod subset;

pub use error::{EvalError, EvalResult};
pub use expr::{Expr, evaluate, parse_expression};
pub use metrics::{MetricFn, metric, metric_names};
pub use objective::{
    ObjectiveScores, ObjectiveSpec, check_structure, evaluate_objectives, station_metrics,
    validate_objectives,
};
pub use resample::{Reducer, ReducerTable, observed_freq, reconcile, resample_per_variable};
pub use subset::subset;
