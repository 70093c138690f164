//! hc-project: calibration setup and evaluation configuration files,
//! numeric-string coercion, and validation.

pub mod lenient;
pub mod schema;
pub mod validate;

pub use lenient::{coerce_numeric_strings, coerce_numeric_strings_except, parse_numeric_string};
pub use schema::*;
pub use validate::{ValidationError, validate_eval_config, validate_setup};

use std::path::Path;

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

enum Format {
    Yaml,
    Json,
}

fn format_of(path: &Path) -> ProjectResult<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        _ => Err(ProjectError::UnsupportedFormat {
            path: path.display().to_string(),
        }),
    }
}

fn write_creating_parent(path: &Path, content: String) -> ProjectResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a calibration setup from YAML or JSON, chosen by extension.
pub fn load_setup(path: &Path) -> ProjectResult<CalibrationSetup> {
    let content = std::fs::read_to_string(path)?;
    let setup: CalibrationSetup = match format_of(path)? {
        Format::Yaml => serde_yaml::from_str(&content)?,
        Format::Json => serde_json::from_str(&content)?,
    };
    validate_setup(&setup)?;
    Ok(setup)
}

pub fn save_setup(path: &Path, setup: &CalibrationSetup) -> ProjectResult<()> {
    validate_setup(setup)?;
    let content = match format_of(path)? {
        Format::Yaml => serde_yaml::to_string(setup)?,
        Format::Json => serde_json::to_string_pretty(setup)?,
    };
    write_creating_parent(path, content)
}

/// Load a JSON document with numeric strings turned into numbers.
pub fn load_document(path: &Path) -> ProjectResult<serde_json::Value> {
    let content = std::fs::read_to_string(path)?;
    let raw: serde_json::Value = serde_json::from_str(&content)?;
    Ok(coerce_numeric_strings(raw))
}

pub fn save_document(path: &Path, doc: &serde_json::Value) -> ProjectResult<()> {
    write_creating_parent(path, serde_json::to_string_pretty(doc)?)
}

/// Evaluation-config fields whose strings are never read as numbers;
/// `"20210601"` is a date there.
const EVAL_VERBATIM_KEYS: &[&str] = &["dates"];

pub fn load_eval_config(path: &Path) -> ProjectResult<EvalConfig> {
    let content = std::fs::read_to_string(path)?;
    let raw: serde_json::Value = serde_json::from_str(&content)?;
    let config: EvalConfig =
        serde_json::from_value(coerce_numeric_strings_except(raw, EVAL_VERBATIM_KEYS))?;
    validate_eval_config(&config)?;
    tracing::debug!(path = %path.display(), "loaded evaluation config");
    Ok(config)
}

pub fn save_eval_config(path: &Path, config: &EvalConfig) -> ProjectResult<()> {
    validate_eval_config(config)?;
    write_creating_parent(path, serde_json::to_string_pretty(config)?)
}
