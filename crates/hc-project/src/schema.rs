//! Configuration schema for calibration setups and evaluation runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use hc_core::DateWindow;
use hc_data::ObservationEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient;

pub const DEFAULT_PENALTY: f64 = 1e10;

/// flux → metric → objective expressions.
pub type ObjectiveFunctions = BTreeMap<String, BTreeMap<String, Vec<String>>>;

fn default_penalty() -> f64 {
    DEFAULT_PENALTY
}

fn default_results_path() -> String {
    "results".to_string()
}

fn default_objective_dir() -> String {
    ".".to_string()
}

/// Everything needed to prepare a calibration instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSetup {
    pub calibration_software: String,
    pub model_software: String,
    pub calibration_config: CalibrationConfig,
    #[serde(default)]
    pub model_config: ModelConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<ObservationSource>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub instance_path: PathBuf,
    #[serde(default)]
    pub dates: Vec<DateWindow>,
    pub objective_functions: ObjectiveFunctions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// Resampling reducer per simulated variable.
    #[serde(default)]
    pub reducers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_reducer: Option<String>,
    #[serde(default = "default_penalty")]
    pub penalty: f64,
    /// Optimizer settings passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// Directory holding a runnable model instance to copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_path: Option<PathBuf>,
    /// Output interval of the model, e.g. `"1D"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_freq: Option<String>,
    /// Encoding of the model's output files, `nc` or `json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    /// Parameter documents, rewritten on every optimizer iteration.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    /// Documents the model needs that calibration never changes.
    #[serde(default)]
    pub others: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Inline observation records or a dataset file already on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationSource {
    Entries(Vec<ObservationEntry>),
    File { file: PathBuf },
}

/// Settings read by every evaluation. Relative paths resolve against the
/// directory holding the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub instance_path: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub model_instance_path: String,
    #[serde(deserialize_with = "lenient::string")]
    pub model_executable: String,
    #[serde(default)]
    pub dates: Vec<DateWindow>,
    #[serde(deserialize_with = "lenient::objectives")]
    pub objective_functions: ObjectiveFunctions,
    #[serde(default = "default_results_path", deserialize_with = "lenient::string")]
    pub results_path: String,
    #[serde(default, deserialize_with = "lenient::string_vec")]
    pub output_files: Vec<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub observations_file: String,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub parameters: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub others: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub reducers: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub default_reducer: Option<String>,
    #[serde(default = "default_penalty")]
    pub penalty: f64,
    /// Where objective artifacts are written.
    #[serde(default = "default_objective_dir", deserialize_with = "lenient::string")]
    pub objective_dir: String,
}

impl EvalConfig {
    /// `(flux, metric, 1-based index)` of every configured expression.
    pub fn objective_slots(&self) -> Vec<(String, String, usize)> {
        let mut out = Vec::new();
        for (flux, metrics) in &self.objective_functions {
            for (metric, exprs) in metrics {
                for idx in 1..=exprs.len() {
                    out.push((flux.clone(), metric.clone(), idx));
                }
            }
        }
        out
    }
}
