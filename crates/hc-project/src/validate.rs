//! Configuration validation logic.

use crate::schema::{
    CalibrationSetup, EvalConfig, ObjectiveFunctions, ObservationSource,
};
use hc_core::DateWindow;
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Missing value: {field}")]
    Missing { field: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Duplicate entry: {id} in {context}")]
    Duplicate { id: String, context: String },
}

fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Missing {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_penalty(penalty: f64) -> Result<(), ValidationError> {
    if !penalty.is_finite() {
        return Err(ValidationError::InvalidValue {
            field: "penalty".to_string(),
            value: penalty.to_string(),
            reason: "must be finite".to_string(),
        });
    }
    Ok(())
}

fn validate_dates(dates: &[DateWindow]) -> Result<(), ValidationError> {
    for (i, w) in dates.iter().enumerate() {
        if let Err(e) = w.check() {
            return Err(ValidationError::InvalidValue {
                field: format!("dates[{i}]"),
                value: format!("{} .. {}", w.start, w.end),
                reason: e.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_objective_functions(of: &ObjectiveFunctions) -> Result<(), ValidationError> {
    if of.is_empty() {
        return Err(ValidationError::Missing {
            field: "objective_functions".to_string(),
        });
    }
    for (flux, metrics) in of {
        require("objective_functions flux", flux)?;
        if metrics.is_empty() {
            return Err(ValidationError::Missing {
                field: format!("objective_functions.{flux}"),
            });
        }
        for (metric, exprs) in metrics {
            if exprs.is_empty() {
                return Err(ValidationError::Missing {
                    field: format!("objective_functions.{flux}.{metric}"),
                });
            }
            for (i, e) in exprs.iter().enumerate() {
                require(&format!("objective_functions.{flux}.{metric}[{i}]"), e)?;
            }
        }
    }
    Ok(())
}

pub fn validate_setup(setup: &CalibrationSetup) -> Result<(), ValidationError> {
    require("calibration_software", &setup.calibration_software)?;
    require("model_software", &setup.model_software)?;

    let cal = &setup.calibration_config;
    require(
        "calibration_config.instance_path",
        &cal.instance_path.to_string_lossy(),
    )?;
    validate_dates(&cal.dates)?;
    validate_objective_functions(&cal.objective_functions)?;
    validate_penalty(cal.penalty)?;

    if let Some(exe) = &setup.model_config.executable {
        require("model_config.executable", exe)?;
    }

    let mut keys = HashSet::new();
    for key in setup
        .model_config
        .parameters
        .keys()
        .chain(setup.model_config.others.keys())
    {
        if !keys.insert(key) {
            return Err(ValidationError::Duplicate {
                id: key.clone(),
                context: "model_config parameters/others".to_string(),
            });
        }
    }

    if let Some(ObservationSource::Entries(entries)) = &setup.observations {
        for (i, e) in entries.iter().enumerate() {
            require(&format!("observations[{i}].type"), &e.var_type)?;
            require(&format!("observations[{i}].unit"), &e.unit)?;
            require(
                &format!("observations[{i}].computational_unit"),
                &e.computational_unit,
            )?;
        }
    }

    Ok(())
}

pub fn validate_eval_config(config: &EvalConfig) -> Result<(), ValidationError> {
    require("model_instance_path", &config.model_instance_path)?;
    require("model_executable", &config.model_executable)?;
    require("results_path", &config.results_path)?;
    require("observations_file", &config.observations_file)?;
    validate_dates(&config.dates)?;
    validate_objective_functions(&config.objective_functions)?;
    validate_penalty(config.penalty)?;

    if config.output_files.is_empty() {
        return Err(ValidationError::Missing {
            field: "output_files".to_string(),
        });
    }
    // The results directory is wiped on every evaluation.
    let results = std::path::Path::new(&config.results_path);
    let escapes = results.is_absolute()
        || config.results_path.split(['/', '\\']).any(|c| c == "..")
        || !results
            .components()
            .any(|c| matches!(c, std::path::Component::Normal(_)));
    if escapes {
        return Err(ValidationError::InvalidValue {
            field: "results_path".to_string(),
            value: config.results_path.clone(),
            reason: "must be a relative path inside the model instance".to_string(),
        });
    }
    Ok(())
}
