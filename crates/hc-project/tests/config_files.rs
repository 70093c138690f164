use std::path::PathBuf;

use hc_project::{
    DEFAULT_PENALTY, ObservationSource, ProjectError, ValidationError, load_document,
    load_eval_config, load_setup, save_eval_config, save_setup,
};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("hc-project-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

const SETUP_YAML: &str = r#"
calibration_software: ostrich
model_software: mesh
calibration_config:
  instance_path: calib
  algorithm: dds
  max_iterations: 500
  dates:
    - start: "2021-06-01"
      end: "2021-06-10"
  objective_functions:
    QO:
      kge_2012: ["-1 * (upper + lower) / 2"]
  reducers:
    QO: mean
model_config:
  executable: sa_mesh
  output_freq: 1D
  parameters:
    hydrology:
      zsnl: 0.35
  others:
    run_options:
      steps: 24
observations:
  file: obs/observations.json
"#;

#[test]
fn setup_yaml_loads_and_round_trips_through_json() {
    let dir = scratch("setup");
    let yaml = dir.join("setup.yaml");
    std::fs::write(&yaml, SETUP_YAML).unwrap();

    let setup = load_setup(&yaml).unwrap();
    assert_eq!(setup.calibration_software, "ostrich");
    assert_eq!(setup.calibration_config.penalty, DEFAULT_PENALTY);
    assert_eq!(setup.calibration_config.algorithm.as_deref(), Some("dds"));
    assert_eq!(
        setup.calibration_config.extra["max_iterations"],
        serde_json::json!(500)
    );
    assert_eq!(setup.calibration_config.dates.len(), 1);
    assert!(matches!(
        setup.observations,
        Some(ObservationSource::File { .. })
    ));

    let json = dir.join("nested").join("setup.json");
    save_setup(&json, &setup).unwrap();
    let back = load_setup(&json).unwrap();
    assert_eq!(back, setup);
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = scratch("ext");
    let path = dir.join("setup.toml");
    std::fs::write(&path, SETUP_YAML).unwrap();
    assert!(matches!(
        load_setup(&path),
        Err(ProjectError::UnsupportedFormat { .. })
    ));
}

#[test]
fn empty_objectives_fail_validation() {
    let dir = scratch("noobj");
    let path = dir.join("setup.yaml");
    let text = SETUP_YAML.replace(
        "  objective_functions:\n    QO:\n      kge_2012: [\"-1 * (upper + lower) / 2\"]\n",
        "  objective_functions: {}\n",
    );
    assert_ne!(text, SETUP_YAML);
    std::fs::write(&path, text).unwrap();
    assert!(matches!(
        load_setup(&path),
        Err(ProjectError::Validation(ValidationError::Missing { .. }))
    ));
}

#[test]
fn reversed_window_fails_validation() {
    let dir = scratch("window");
    let path = dir.join("setup.yaml");
    std::fs::write(&path, SETUP_YAML.replace("2021-06-10", "2021-05-01")).unwrap();
    assert!(matches!(
        load_setup(&path),
        Err(ProjectError::Validation(ValidationError::InvalidValue { .. }))
    ));
}

const EVAL_JSON: &str = r#"{
    "model_instance_path": "../../model",
    "model_executable": "sa_mesh",
    "dates": [{"start": "2021-06-01", "end": "2021-06-10"}],
    "objective_functions": {"QO": {"nse": ["upper", "-1 * upper"]}},
    "output_files": [["QO_D_GRD.json"]],
    "observations_file": "../observations/observations.json",
    "parameters": {"hydrology": "../templates/hydrology.json"},
    "penalty": "1e10"
}"#;

#[test]
fn eval_config_accepts_template_rendered_values() {
    let dir = scratch("eval");
    let path = dir.join("eval.json");
    std::fs::write(&path, EVAL_JSON).unwrap();

    let config = load_eval_config(&path).unwrap();
    assert_eq!(config.penalty, 1e10);
    assert_eq!(config.results_path, "results");
    assert_eq!(config.objective_dir, ".");
    assert_eq!(config.output_files, vec!["QO_D_GRD.json"]);
    assert_eq!(
        config.objective_slots(),
        vec![
            ("QO".to_string(), "nse".to_string(), 1),
            ("QO".to_string(), "nse".to_string(), 2),
        ]
    );

    let out = dir.join("copy").join("eval.json");
    save_eval_config(&out, &config).unwrap();
    assert_eq!(load_eval_config(&out).unwrap(), config);
}

#[test]
fn compact_dates_stay_dates() {
    let dir = scratch("compact-dates");
    let path = dir.join("eval.json");
    let text = EVAL_JSON.replace(
        r#"[{"start": "2021-06-01", "end": "2021-06-10"}]"#,
        r#"[{"start": "20210601", "end": "20210610"}]"#,
    );
    std::fs::write(&path, text).unwrap();

    let config = load_eval_config(&path).unwrap();
    assert_eq!(
        config.dates,
        vec![hc_core::DateWindow::parse("2021-06-01", "2021-06-10").unwrap()]
    );
    assert_eq!(config.penalty, 1e10);
}

#[test]
fn escaping_results_path_is_rejected() {
    let dir = scratch("escape");
    let path = dir.join("eval.json");
    let text = EVAL_JSON.replace(
        "\"penalty\": \"1e10\"",
        "\"penalty\": 1, \"results_path\": \"../outside\"",
    );
    std::fs::write(&path, text).unwrap();
    assert!(matches!(
        load_eval_config(&path),
        Err(ProjectError::Validation(ValidationError::InvalidValue { .. }))
    ));
}

#[test]
fn documents_are_coerced() {
    let dir = scratch("doc");
    let path = dir.join("hydrology.json");
    std::fs::write(&path, r#"{"zsnl": "0.35", "class": ["1", "grass"]}"#).unwrap();
    assert_eq!(
        load_document(&path).unwrap(),
        serde_json::json!({"zsnl": 0.35, "class": [1, "grass"]})
    );
}
