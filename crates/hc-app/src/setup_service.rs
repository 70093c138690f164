//! Calibration instance preparation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hc_core::UnitRegistry;
use hc_core::timing::Timer;
use hc_data::{AssembleOptions, Dataset, assemble, prepare_loaded_observations};
use hc_eval::{subset, validate_objectives};
use hc_project::{CalibrationSetup, EvalConfig, ObservationSource, validate_setup};
use serde::Serialize;
use tracing::{debug, info};

use crate::backend::{
    BackendRegistry, EVAL_DIR, InstancePlan, MODEL_DIR, OBSERVATIONS_DIR, Role, Template,
};
use crate::error::{AppError, AppResult};
use crate::eval_service::reducer_table;

pub const EVAL_CONFIG_FILE: &str = "eval.json";
pub const OBSERVATIONS_FILE: &str = "observations.json";
pub const SUMMARY_FILE: &str = "calibration_instance.json";

/// Record of everything that went into an instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSummary {
    pub calibration_software: String,
    pub model_software: String,
    pub algorithm: Option<String>,
    pub instance_path: PathBuf,
    pub output_files: Vec<String>,
    pub observed_variables: Vec<String>,
    pub stations: Vec<String>,
    pub files: Vec<PathBuf>,
    pub setup: CalibrationSetup,
}

#[derive(Debug, Clone)]
pub struct PreparedInstance {
    pub plan: InstancePlan,
    pub eval_config_path: PathBuf,
    pub observations_path: PathBuf,
    pub summary_path: PathBuf,
    pub summary: InstanceSummary,
}

/// Observations named by the setup, with their `freq` coordinate filled in.
/// Relative files resolve against `base_dir`.
pub fn load_observations(setup: &CalibrationSetup, base_dir: &Path, units: &UnitRegistry) -> AppResult<Dataset> {
    let raw = match &setup.observations {
        Some(ObservationSource::Entries(entries)) => assemble(entries, units, AssembleOptions::default())?,
        Some(ObservationSource::File { file }) => Dataset::load(&base_dir.join(file))?,
        None => return Err(AppError::MissingObservations),
    };
    Ok(prepare_loaded_observations(&raw, units)?)
}

fn write_template(plan: &InstancePlan, template: &Template) -> AppResult<PathBuf> {
    let path = plan.path(&template.path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(AppError::at(parent))?;
    }
    std::fs::write(&path, &template.content).map_err(AppError::at(&path))?;
    if template.executable {
        make_executable(&path)?;
    }
    Ok(path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(AppError::at(path))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> AppResult<()> {
    Ok(())
}

fn eval_config(setup: &CalibrationSetup, plan: &InstancePlan) -> EvalConfig {
    let cal = &setup.calibration_config;
    let model = &setup.model_config;
    let template_paths = |keys: Vec<&String>| -> BTreeMap<String, String> {
        keys.into_iter()
            .map(|k| (k.clone(), format!("../templates/{k}.json")))
            .collect()
    };
    EvalConfig {
        instance_path: Some(plan.instance_dir.display().to_string()),
        model_instance_path: format!("../../{MODEL_DIR}"),
        model_executable: plan.executable.clone().unwrap_or_default(),
        dates: cal.dates.clone(),
        objective_functions: cal.objective_functions.clone(),
        results_path: plan.results_path.clone(),
        output_files: plan.output_files.clone(),
        observations_file: format!("../observations/{OBSERVATIONS_FILE}"),
        parameters: template_paths(model.parameters.keys().collect()),
        others: template_paths(model.others.keys().collect()),
        reducers: cal.reducers.clone(),
        default_reducer: cal.default_reducer.clone(),
        penalty: cal.penalty,
        objective_dir: ".".to_string(),
    }
}

/// Build a calibration instance from a setup.
///
/// Configuration is validated up front; the calibration backend and then the
/// model backend analyze, prepare and template the instance. Observations
/// are assembled or loaded, checked against the objectives, and written
/// next to the evaluation configuration and an instance summary.
pub fn prepare_instance(
    setup: &CalibrationSetup,
    base_dir: &Path,
    backends: &BackendRegistry,
    units: &UnitRegistry,
) -> AppResult<PreparedInstance> {
    let timer = Timer::start("prepare_instance");
    validate_setup(setup)?;
    let cal = &setup.calibration_config;
    validate_objectives(&cal.objective_functions)?;
    reducer_table(&cal.reducers, cal.default_reducer.as_deref())?;

    let calibration = backends.create_for(&setup.calibration_software, Role::Calibration)?;
    let model = backends.create_for(&setup.model_software, Role::Model)?;

    let observed = load_observations(setup, base_dir, units)?;
    let observed_variables = observed.variable_names();
    for flux in cal.objective_functions.keys() {
        if !observed_variables.contains(flux) {
            return Err(AppError::UnobservedFlux {
                flux: flux.clone(),
                observed: observed_variables,
            });
        }
    }
    if !cal.dates.is_empty() {
        subset(&observed, &cal.dates)?;
    }

    let mut plan = InstancePlan::new(base_dir.join(&cal.instance_path));
    calibration.analyze(setup, &mut plan)?;
    model.analyze(setup, &mut plan)?;
    info!(
        instance = %plan.instance_dir.display(),
        calibration = calibration.name(),
        model = model.name(),
        algorithm = plan.algorithm.as_deref().unwrap_or("-"),
        "preparing calibration instance"
    );

    calibration.prepare(setup, &plan)?;
    model.prepare(setup, &plan)?;

    let mut files = Vec::new();
    for backend in [&calibration, &model] {
        for template in backend.generate_templates(setup, &plan)? {
            files.push(write_template(&plan, &template)?);
        }
    }

    let observations_path = plan.path(OBSERVATIONS_DIR).join(OBSERVATIONS_FILE);
    observed.save(&observations_path)?;
    files.push(observations_path.clone());

    let eval_config_path = plan.path(EVAL_DIR).join(EVAL_CONFIG_FILE);
    hc_project::save_eval_config(&eval_config_path, &eval_config(setup, &plan))?;
    files.push(eval_config_path.clone());
    debug!(files = files.len(), "instance files written");

    let summary = InstanceSummary {
        calibration_software: setup.calibration_software.clone(),
        model_software: setup.model_software.clone(),
        algorithm: plan.algorithm.clone(),
        instance_path: plan.instance_dir.clone(),
        output_files: plan.output_files.clone(),
        observed_variables,
        stations: (0..observed.n_units()).map(|row| observed.station_label(row)).collect(),
        files,
        setup: setup.clone(),
    };
    let summary_path = plan.path(SUMMARY_FILE);
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?).map_err(AppError::at(&summary_path))?;

    timer.stop_and_log();
    Ok(PreparedInstance {
        plan,
        eval_config_path,
        observations_path,
        summary_path,
        summary,
    })
}
