//! Calibration and model software backends.
//!
//! A [`BackendRegistry`] maps a software token from the setup file to a
//! factory. Setup runs the calibration backend and the model backend
//! through the same three hooks:
//!
//! 1. `analyze` fills in the [`InstancePlan`] (algorithm, expected outputs).
//! 2. `prepare` lays out directories and copies model files.
//! 3. `generate_templates` returns text files to write under the instance.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use hc_core::Freq;
use hc_data::DatasetFormat;
use hc_project::CalibrationSetup;
use tracing::debug;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Calibration,
    Model,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Calibration => f.write_str("calibration"),
            Role::Model => f.write_str("model"),
        }
    }
}

/// Instance layout relative to the instance root.
pub const ETC_DIR: &str = "etc";
pub const EVAL_DIR: &str = "etc/eval";
pub const OBSERVATIONS_DIR: &str = "etc/observations";
pub const TEMPLATES_DIR: &str = "etc/templates";
pub const SCRIPTS_DIR: &str = "etc/scripts";
pub const MODEL_DIR: &str = "model";
pub const RESULTS_DIR: &str = "results";

/// What setup has worked out about the instance so far.
#[derive(Debug, Clone, PartialEq)]
pub struct InstancePlan {
    pub instance_dir: PathBuf,
    /// Canonical algorithm identifier of the calibration software.
    pub algorithm: Option<String>,
    pub executable: Option<String>,
    /// Files the model writes into its results directory.
    pub output_files: Vec<String>,
    pub results_path: String,
}

impl InstancePlan {
    pub fn new(instance_dir: impl Into<PathBuf>) -> Self {
        Self {
            instance_dir: instance_dir.into(),
            algorithm: None,
            executable: None,
            output_files: Vec::new(),
            results_path: RESULTS_DIR.to_string(),
        }
    }

    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.instance_dir.join(rel)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.path(MODEL_DIR)
    }
}

/// A generated text file, relative to the instance root.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub path: PathBuf,
    pub content: String,
    pub executable: bool,
}

impl Template {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            executable: false,
        }
    }

    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }
}

pub trait Backend {
    fn name(&self) -> &str;

    fn role(&self) -> Role;

    fn analyze(&self, setup: &CalibrationSetup, plan: &mut InstancePlan) -> AppResult<()>;

    fn prepare(&self, setup: &CalibrationSetup, plan: &InstancePlan) -> AppResult<()>;

    fn generate_templates(&self, setup: &CalibrationSetup, plan: &InstancePlan) -> AppResult<Vec<Template>>;
}

pub type BackendFactory = fn() -> Box<dyn Backend>;

pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("ostrich", || Box::new(OstrichBackend));
        registry.register("mesh", || Box::new(MeshBackend));
        registry
    }

    /// Register a factory under a case-insensitive token. Re-registering a
    /// token replaces the earlier factory.
    pub fn register(&mut self, token: &str, factory: BackendFactory) {
        self.factories.insert(token.to_ascii_lowercase(), factory);
    }

    pub fn tokens(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn create(&self, token: &str) -> AppResult<Box<dyn Backend>> {
        let factory = self
            .factories
            .get(&token.trim().to_ascii_lowercase())
            .ok_or_else(|| AppError::UnknownBackend {
                name: token.to_string(),
                known: self.tokens(),
            })?;
        Ok(factory())
    }

    /// Create a backend and check it can play `role`.
    pub fn create_for(&self, token: &str, role: Role) -> AppResult<Box<dyn Backend>> {
        let backend = self.create(token)?;
        if backend.role() != role {
            return Err(AppError::RoleMismatch {
                name: token.to_string(),
                expected: role.to_string(),
            });
        }
        Ok(backend)
    }
}

// ---------------------------------------------------------------------------
// Ostrich
// ---------------------------------------------------------------------------

const OSTRICH_ALGORITHMS: &[(&str, &str)] = &[
    ("bisectionalgorithm", "BisectionAlg"),
    ("fletcher-reeves", "FletchReevesAlg"),
    ("levenberg-marquardt", "LevMar"),
    ("gml-ms", "LevMar"),
    ("gridalgorithm", "GridAlg"),
    ("powell", "PowellAlg"),
    ("steepest-descent", "SteepestDescAlg"),
    ("appso", "APPSO"),
    ("particleswarm", "ParticleSwarm"),
    ("beers", "BEERS"),
    ("binarygeneticalgorithm", "GeneticAlg"),
    ("geneticalgorithm", "GeneticAlg"),
    ("discretesimulatedannealing", "SimulatedAlg"),
    ("simulatedannealing", "SimulatedAlg"),
    ("vanderbiltsimulatedannealing", "SimulatedAlg"),
    ("discretedds", "DiscreteDDSAlg"),
    ("dds", "DDSAlg"),
    ("paralleldds", "ParallelDDSAlg"),
    ("shuffledcomplexevolution", "SCEUA"),
    ("samplingalgorithm", "SamplingAlg"),
    ("ddsau", "_DDSAU_Alg"),
    ("glue", "GLUE"),
    ("metropolissampler", "MetropolisSampler"),
    ("rejectionsampler", "RejectionSampler"),
    ("padds", "PADDSAlg"),
    ("parapadds", "ParallelPADDSAlg"),
    ("smooth", "SMOOTH"),
];

/// Canonical Ostrich identifier for a user-facing algorithm name. Names are
/// matched case-insensitively with spaces and underscores ignored; canonical
/// identifiers pass through.
pub fn ostrich_algorithm(name: &str) -> Option<&'static str> {
    let key: String = name
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_'))
        .collect::<String>()
        .to_ascii_lowercase();
    OSTRICH_ALGORITHMS
        .iter()
        .find(|(alias, canonical)| *alias == key || canonical.eq_ignore_ascii_case(name.trim()))
        .map(|(_, canonical)| *canonical)
}

const DEFAULT_OSTRICH_ALGORITHM: &str = "DDSAlg";

pub struct OstrichBackend;

impl OstrichBackend {
    fn render_input(&self, setup: &CalibrationSetup, plan: &InstancePlan) -> String {
        let cal = &setup.calibration_config;
        let mut out = String::new();
        out.push_str(&format!(
            "ProgramType {}\n",
            plan.algorithm.as_deref().unwrap_or(DEFAULT_OSTRICH_ALGORITHM)
        ));
        out.push_str("ObjectiveFunction GCOP\n");
        out.push_str(&format!("ModelExecutable ./{SCRIPTS_DIR}/evaluate.sh\n"));
        for (key, value) in &cal.extra {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!("{key} {value}\n"));
        }

        out.push_str("\nBeginFilePairs\n");
        for key in setup.model_config.parameters.keys() {
            out.push_str(&format!("{TEMPLATES_DIR}/{key}.json ; {MODEL_DIR}/{key}.json\n"));
        }
        out.push_str("EndFilePairs\n");

        out.push_str("\nBeginResponseVars\n");
        let mut names = Vec::new();
        for (flux, metrics) in &cal.objective_functions {
            for (metric, exprs) in metrics {
                for idx in 1..=exprs.len() {
                    let name = format!("{}_{metric}_{idx}", flux.to_uppercase());
                    out.push_str(&format!("{name} {EVAL_DIR}/{name}.csv ; OST_NULL 0 1\n"));
                    names.push(name);
                }
            }
        }
        out.push_str("EndResponseVars\n");

        out.push_str("\nBeginGCOP\n");
        out.push_str(&format!("CostFunction {}\n", names.join(" + ")));
        out.push_str("PenaltyFunction APM\n");
        out.push_str("EndGCOP\n");
        out
    }
}

impl Backend for OstrichBackend {
    fn name(&self) -> &str {
        "ostrich"
    }

    fn role(&self) -> Role {
        Role::Calibration
    }

    fn analyze(&self, setup: &CalibrationSetup, plan: &mut InstancePlan) -> AppResult<()> {
        let algorithm = match &setup.calibration_config.algorithm {
            Some(name) => ostrich_algorithm(name).ok_or_else(|| AppError::UnknownAlgorithm {
                name: name.clone(),
                software: self.name().to_string(),
            })?,
            None => DEFAULT_OSTRICH_ALGORITHM,
        };
        debug!(algorithm, "resolved calibration algorithm");
        plan.algorithm = Some(algorithm.to_string());
        Ok(())
    }

    fn prepare(&self, _setup: &CalibrationSetup, plan: &InstancePlan) -> AppResult<()> {
        for dir in [ETC_DIR, EVAL_DIR, OBSERVATIONS_DIR, TEMPLATES_DIR, SCRIPTS_DIR] {
            let path = plan.path(dir);
            std::fs::create_dir_all(&path).map_err(AppError::at(path))?;
        }
        Ok(())
    }

    fn generate_templates(&self, setup: &CalibrationSetup, plan: &InstancePlan) -> AppResult<Vec<Template>> {
        let mut out = Vec::new();
        let model = &setup.model_config;
        for (key, doc) in model.parameters.iter().chain(&model.others) {
            out.push(Template::new(
                Path::new(TEMPLATES_DIR).join(format!("{key}.json")),
                serde_json::to_string_pretty(doc)?,
            ));
        }
        out.push(Template::new("ostIn.txt", self.render_input(setup, plan)));
        out.push(
            Template::new(
                Path::new(SCRIPTS_DIR).join("evaluate.sh"),
                format!("#!/bin/sh\nexec hc-cli eval {EVAL_DIR}/eval.json\n"),
            )
            .executable(),
        );
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// MESH
// ---------------------------------------------------------------------------

const MESH_PARAMETER_KEYS: &[&str] = &["class", "hydrology", "routing"];
const MESH_OTHER_KEYS: &[&str] = &["case_entry", "info_entry"];

/// Token MESH uses for an output interval in file names.
pub fn mesh_freq_token(freq: Freq) -> AppResult<&'static str> {
    if freq == Freq::daily() {
        Ok("D")
    } else if freq == Freq::hourly() {
        Ok("H")
    } else if freq == Freq::MonthStart(1) {
        Ok("M")
    } else {
        Err(AppError::Unsupported {
            message: format!("MESH output interval {freq}"),
        })
    }
}

pub struct MeshBackend;

fn check_keys(section: &str, keys: impl Iterator<Item = String>, allowed: &[&str]) -> AppResult<()> {
    for key in keys {
        if !allowed.contains(&key.as_str()) {
            return Err(AppError::Unsupported {
                message: format!("MESH {section} document '{key}' (expected one of {allowed:?})"),
            });
        }
    }
    Ok(())
}

fn copy_dir_all(src: &Path, dst: &Path) -> AppResult<()> {
    std::fs::create_dir_all(dst).map_err(AppError::at(dst))?;
    for entry in std::fs::read_dir(src).map_err(AppError::at(src))? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(AppError::at(&target))?;
        }
    }
    Ok(())
}

impl Backend for MeshBackend {
    fn name(&self) -> &str {
        "mesh"
    }

    fn role(&self) -> Role {
        Role::Model
    }

    fn analyze(&self, setup: &CalibrationSetup, plan: &mut InstancePlan) -> AppResult<()> {
        let model = &setup.model_config;
        check_keys("parameter", model.parameters.keys().cloned(), MESH_PARAMETER_KEYS)?;
        check_keys("other", model.others.keys().cloned(), MESH_OTHER_KEYS)?;

        let freq: Freq = model.output_freq.as_deref().unwrap_or("D").parse()?;
        let token = mesh_freq_token(freq)?;
        let format: DatasetFormat = model.output_format.as_deref().unwrap_or("nc").parse()?;
        if !format.is_available() {
            return Err(AppError::Unsupported {
                message: format!("{format} model output in a build without the `netcdf` feature"),
            });
        }
        plan.output_files = setup
            .calibration_config
            .objective_functions
            .keys()
            .map(|flux| format!("{}_{token}_GRD.{}", flux.to_uppercase(), format.extension()))
            .collect();
        plan.executable = Some(model.executable.clone().unwrap_or_else(|| "sa_mesh".to_string()));
        Ok(())
    }

    fn prepare(&self, setup: &CalibrationSetup, plan: &InstancePlan) -> AppResult<()> {
        let model_dir = plan.model_dir();
        if let Some(src) = &setup.model_config.instance_path {
            debug!(from = %src.display(), to = %model_dir.display(), "copying model instance");
            copy_dir_all(src, &model_dir)?;
        } else {
            std::fs::create_dir_all(&model_dir).map_err(AppError::at(&model_dir))?;
        }
        Ok(())
    }

    fn generate_templates(&self, setup: &CalibrationSetup, _plan: &InstancePlan) -> AppResult<Vec<Template>> {
        setup
            .model_config
            .others
            .iter()
            .map(|(key, doc)| -> AppResult<Template> {
                Ok(Template::new(
                    Path::new(MODEL_DIR).join(format!("{key}.json")),
                    serde_json::to_string_pretty(doc)?,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_aliases() {
        assert_eq!(ostrich_algorithm("dds"), Some("DDSAlg"));
        assert_eq!(ostrich_algorithm("Levenberg-Marquardt"), Some("LevMar"));
        assert_eq!(ostrich_algorithm("gml-ms"), Some("LevMar"));
        assert_eq!(ostrich_algorithm("Particle Swarm"), Some("ParticleSwarm"));
        assert_eq!(ostrich_algorithm("shuffled_complex_evolution"), Some("SCEUA"));
        assert_eq!(ostrich_algorithm("ParallelPADDSAlg"), Some("ParallelPADDSAlg"));
        assert_eq!(ostrich_algorithm("simplex"), None);
    }

    #[test]
    fn registry_dispatches_by_token() {
        let registry = BackendRegistry::with_builtins();
        assert_eq!(registry.tokens(), vec!["mesh", "ostrich"]);
        assert_eq!(registry.create("OSTRICH").unwrap().name(), "ostrich");
        assert!(matches!(
            registry.create("raven"),
            Err(AppError::UnknownBackend { .. })
        ));
        assert!(matches!(
            registry.create_for("mesh", Role::Calibration),
            Err(AppError::RoleMismatch { .. })
        ));
    }

    struct Dummy;

    impl Backend for Dummy {
        fn name(&self) -> &str {
            "dummy"
        }
        fn role(&self) -> Role {
            Role::Model
        }
        fn analyze(&self, _: &CalibrationSetup, plan: &mut InstancePlan) -> AppResult<()> {
            plan.output_files = vec!["out.json".to_string()];
            Ok(())
        }
        fn prepare(&self, _: &CalibrationSetup, _: &InstancePlan) -> AppResult<()> {
            Ok(())
        }
        fn generate_templates(&self, _: &CalibrationSetup, _: &InstancePlan) -> AppResult<Vec<Template>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn new_backends_register_without_touching_dispatch() {
        let mut registry = BackendRegistry::with_builtins();
        registry.register("Dummy", || Box::new(Dummy));
        assert_eq!(registry.create_for("dummy", Role::Model).unwrap().name(), "dummy");
    }

    fn mesh_setup(format: Option<&str>) -> CalibrationSetup {
        serde_json::from_value(serde_json::json!({
            "calibration_software": "ostrich",
            "model_software": "mesh",
            "calibration_config": {
                "instance_path": "calib",
                "objective_functions": {"qo": {"nse": ["upper"]}}
            },
            "model_config": {"output_freq": "1h", "output_format": format}
        }))
        .unwrap()
    }

    #[test]
    fn mesh_output_names_follow_format() {
        let mut plan = InstancePlan::new("calib");
        MeshBackend.analyze(&mesh_setup(Some("json")), &mut plan).unwrap();
        assert_eq!(plan.output_files, vec!["QO_H_GRD.json"]);

        let mut plan = InstancePlan::new("calib");
        let nc = MeshBackend.analyze(&mesh_setup(None), &mut plan);
        if cfg!(feature = "netcdf") {
            nc.unwrap();
            assert_eq!(plan.output_files, vec!["QO_H_GRD.nc"]);
        } else {
            assert!(matches!(nc, Err(AppError::Unsupported { .. })));
        }

        assert!(MeshBackend.analyze(&mesh_setup(Some("csv")), &mut plan).is_err());
    }

    #[test]
    fn mesh_freq_tokens() {
        assert_eq!(mesh_freq_token(Freq::daily()).unwrap(), "D");
        assert_eq!(mesh_freq_token("1h".parse().unwrap()).unwrap(), "H");
        assert_eq!(mesh_freq_token("MS".parse().unwrap()).unwrap(), "M");
        assert!(mesh_freq_token("15min".parse().unwrap()).is_err());
    }
}
