//! One evaluation per optimizer iteration: run the model, score its output
//! against the observations, and leave one artifact per objective slot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use hc_core::timing::Timer;
use hc_core::{Real, UnitRegistry};
use hc_data::{Dataset, prepare_loaded_observations};
use hc_eval::{
    ObjectiveScores, ObjectiveSpec, Reducer, ReducerTable, evaluate_objectives, reconcile, subset,
    validate_objectives,
};
use hc_project::EvalConfig;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::progress::{EvalProgressEvent, EvalStage};
use crate::runner::{ModelRunner, RunRequest};

/// `<FLUX>_<metric>_<idx>.csv`, with a 1-based index.
pub fn artifact_name(flux: &str, metric: &str, idx: usize) -> String {
    format!("{}_{metric}_{idx}.csv", flux.to_uppercase())
}

pub fn reducer_table(methods: &BTreeMap<String, String>, default: Option<&str>) -> AppResult<ReducerTable> {
    let methods = methods
        .iter()
        .map(|(var, name)| -> AppResult<(String, Reducer)> { Ok((var.clone(), name.parse()?)) })
        .collect::<AppResult<BTreeMap<_, _>>>()?;
    let default = default.map(str::parse::<Reducer>).transpose()?;
    Ok(ReducerTable::new(methods, default))
}

/// Paths of an evaluation, resolved against the directory holding the
/// configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalPaths {
    pub model_dir: PathBuf,
    pub results_dir: PathBuf,
    pub observations_file: PathBuf,
    pub objective_dir: PathBuf,
    pub documents: BTreeMap<String, PathBuf>,
}

impl EvalPaths {
    pub fn resolve(config_path: &Path, config: &EvalConfig) -> Self {
        let base = config_path.parent().unwrap_or(Path::new("."));
        let model_dir = base.join(&config.model_instance_path);
        let documents = config
            .parameters
            .iter()
            .chain(&config.others)
            .map(|(key, rel)| (key.clone(), base.join(rel)))
            .collect();
        Self {
            results_dir: model_dir.join(&config.results_path),
            model_dir,
            observations_file: base.join(&config.observations_file),
            objective_dir: base.join(&config.objective_dir),
            documents,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub stage: EvalStage,
    pub scores: ObjectiveScores,
    pub artifacts: Vec<PathBuf>,
    /// Why the attempt fell back to penalties.
    pub failure: Option<String>,
}

pub struct EvalRequest<'a> {
    pub config_path: &'a Path,
    pub runner: &'a dyn ModelRunner,
    pub units: &'a UnitRegistry,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(EvalProgressEvent)>,
    stage: EvalStage,
    started: Instant,
    message: Option<String>,
) {
    info!(%stage, "evaluation stage");
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(EvalProgressEvent::stage(stage, started.elapsed().as_secs_f64(), message));
    }
}

pub fn evaluate(request: &EvalRequest<'_>) -> AppResult<EvalOutcome> {
    evaluate_with_progress(request, None)
}

/// Run one evaluation and stream stage events.
///
/// Errors while loading the configuration, observations or documents are
/// returned. Any error once the model run starts is logged and replaced by
/// the configured penalty in every artifact. Artifacts from the previous
/// iteration are removed first, so an aborted evaluation never leaves stale
/// scores behind.
pub fn evaluate_with_progress(
    request: &EvalRequest<'_>,
    mut progress_cb: Option<&mut dyn FnMut(EvalProgressEvent)>,
) -> AppResult<EvalOutcome> {
    let timer = Timer::start("evaluate");
    let started = Instant::now();
    emit_progress(&mut progress_cb, EvalStage::Pending, started, None);

    let config = hc_project::load_eval_config(request.config_path)?;
    let paths = EvalPaths::resolve(request.config_path, &config);
    remove_artifacts(&paths.objective_dir, &config)?;

    validate_objectives(&config.objective_functions)?;
    let table = reducer_table(&config.reducers, config.default_reducer.as_deref())?;

    let observed = Dataset::load(&paths.observations_file)?;
    let observed = prepare_loaded_observations(&observed, request.units)?;
    let observed = if config.dates.is_empty() {
        observed
    } else {
        subset(&observed, &config.dates)?
    };

    let mut documents = BTreeMap::new();
    for (key, path) in &paths.documents {
        documents.insert(key.clone(), hc_project::load_document(path)?);
    }

    let attempt = run_and_score(
        request,
        &config,
        &paths,
        &documents,
        &observed,
        &table,
        &mut progress_cb,
        started,
    );

    let outcome = match attempt {
        Ok(scores) => {
            let artifacts = write_artifacts(&paths.objective_dir, &config, |flux, metric, idx| {
                scores
                    .get(flux)
                    .and_then(|m| m.get(metric))
                    .and_then(|v| v.get(idx - 1))
                    .copied()
                    .unwrap_or(config.penalty)
            })?;
            emit_progress(&mut progress_cb, EvalStage::Scored, started, None);
            EvalOutcome {
                stage: EvalStage::Scored,
                scores,
                artifacts,
                failure: None,
            }
        }
        Err(e) => {
            warn!(error = %e, penalty = config.penalty, "evaluation failed; writing penalty scores");
            let artifacts = write_artifacts(&paths.objective_dir, &config, |_, _, _| config.penalty)?;
            emit_progress(&mut progress_cb, EvalStage::Failed, started, Some(e.to_string()));
            EvalOutcome {
                stage: EvalStage::Failed,
                scores: ObjectiveScores::new(),
                artifacts,
                failure: Some(e.to_string()),
            }
        }
    };

    timer.stop_and_log();
    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
fn run_and_score(
    request: &EvalRequest<'_>,
    config: &EvalConfig,
    paths: &EvalPaths,
    documents: &BTreeMap<String, Value>,
    observed: &Dataset,
    table: &ReducerTable,
    progress_cb: &mut Option<&mut dyn FnMut(EvalProgressEvent)>,
    started: Instant,
) -> AppResult<ObjectiveScores> {
    emit_progress(progress_cb, EvalStage::ModelRun, started, None);
    reset_dir(&paths.results_dir)?;
    let run_timer = Timer::start("model_run");
    request.runner.run(&RunRequest {
        model_dir: &paths.model_dir,
        executable: &config.model_executable,
        parameters: documents,
    })?;
    run_timer.stop_and_log();

    emit_progress(progress_cb, EvalStage::MetricCompute, started, None);
    let outputs = config
        .output_files
        .iter()
        .map(|f| Dataset::load(&paths.results_dir.join(f)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut scores = ObjectiveScores::new();
    for (flux, metrics) in &config.objective_functions {
        let simulated = outputs
            .iter()
            .find(|ds| ds.variable(flux).is_some())
            .ok_or_else(|| AppError::MissingOutput { flux: flux.clone() })?;
        let simulated = if config.dates.is_empty() {
            reconcile(simulated, observed, table)?
        } else {
            reconcile(&subset(simulated, &config.dates)?, observed, table)?
        };
        debug!(%flux, n_times = simulated.n_times(), "scoring flux");

        let mut spec = ObjectiveSpec::new();
        spec.insert(flux.clone(), metrics.clone());
        scores.extend(evaluate_objectives(&spec, &simulated, observed, request.units)?);
    }
    Ok(scores)
}

/// Remove and recreate `dir` so nothing from an earlier iteration survives.
fn reset_dir(dir: &Path) -> AppResult<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(AppError::at(dir)(e)),
    }
    std::fs::create_dir_all(dir).map_err(AppError::at(dir))
}

fn remove_artifacts(dir: &Path, config: &EvalConfig) -> AppResult<()> {
    for (flux, metric, idx) in config.objective_slots() {
        let path = dir.join(artifact_name(&flux, &metric, idx));
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed previous artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AppError::at(&path)(e)),
        }
    }
    Ok(())
}

fn write_artifacts(
    dir: &Path,
    config: &EvalConfig,
    value: impl Fn(&str, &str, usize) -> Real,
) -> AppResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(AppError::at(dir))?;
    let mut written = Vec::new();
    for (flux, metric, idx) in config.objective_slots() {
        let path = dir.join(artifact_name(&flux, &metric, idx));
        std::fs::write(&path, format!("{:?}", value(&flux, &metric, idx))).map_err(AppError::at(&path))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_upper_case_the_flux() {
        assert_eq!(artifact_name("qo", "kge_2012", 1), "QO_kge_2012_1.csv");
    }

    #[test]
    fn reducer_names_are_checked() {
        let mut methods = BTreeMap::new();
        methods.insert("QO".to_string(), "sum".to_string());
        let table = reducer_table(&methods, Some("mean")).unwrap();
        assert_eq!(table.reducer_for("QO"), Some(Reducer::Sum));
        assert_eq!(table.reducer_for("STGW"), Some(Reducer::Mean));

        methods.insert("TA".to_string(), "mode".to_string());
        assert!(matches!(
            reducer_table(&methods, None),
            Err(AppError::Eval(hc_eval::EvalError::UnknownReducer { .. }))
        ));
    }

    #[test]
    fn penalty_prints_as_a_float() {
        assert_eq!(format!("{:?}", 1e10_f64), "10000000000.0");
    }
}
