use hc_core::{Tolerances, UnitRegistry};
use hc_data::*;

fn entries() -> Vec<ObservationEntry> {
    let json = r#"[
        {
            "name": "A",
            "type": "Q",
            "timeseries": [["2020-01-01", 1.0], ["2020-01-02", 2.0], ["2020-01-03", 3.0]],
            "unit": "m3/s",
            "computational_unit": "subbasin",
            "computational_unit_id": 1,
            "freq": "1D"
        },
        {
            "name": "B",
            "type": "Q",
            "timeseries": {"index": ["2020-01-02", "2020-01-04"], "values": [2500.0, 4000.0]},
            "units": "L/s",
            "computational_unit": "subbasin",
            "computational_unit_id": 2
        }
    ]"#;
    serde_json::from_str(json).unwrap()
}

#[test]
fn assembled_dataset_survives_save_and_load() {
    let temp_dir = std::env::temp_dir().join("hc_data_test_roundtrip");
    let _ = std::fs::remove_dir_all(&temp_dir);

    let registry = UnitRegistry::with_defaults();
    let ds = assemble(&entries(), &registry, AssembleOptions::default()).unwrap();

    let path = temp_dir.join("etc").join("observations.json");
    ds.save(&path).unwrap();
    assert!(path.exists());

    let loaded = Dataset::load(&path).unwrap();
    assert!(loaded.approx_eq(&ds, Tolerances::default()));
    assert_eq!(
        loaded.names(),
        &[Some("A".to_string()), Some("B".to_string())]
    );
    assert_eq!(loaded.freqs(), &[Some("1D".to_string()), None]);

    let _ = std::fs::remove_dir_all(&temp_dir);
}

#[test]
fn two_station_scenario_cells() {
    let registry = UnitRegistry::with_defaults();
    let ds = assemble(&entries(), &registry, AssembleOptions::default()).unwrap();

    assert_eq!(ds.n_times(), 4);
    let a = ds.series("Q", 1).unwrap();
    let b = ds.series("Q", 2).unwrap();

    assert!(a[3].is_nan());
    assert!(b[0].is_nan());
    assert!(b[2].is_nan());
    assert!((b[1] - 2.5).abs() < 1e-12);
    assert!((b[3] - 4.0).abs() < 1e-12);
}

#[test]
fn prepared_file_keeps_explicit_freq() {
    let temp_dir = std::env::temp_dir().join("hc_data_test_prepare");
    let _ = std::fs::remove_dir_all(&temp_dir);

    let registry = UnitRegistry::with_defaults();
    let ds = assemble(&entries(), &registry, AssembleOptions::default()).unwrap();
    let path = temp_dir.join("obs.json");
    ds.save(&path).unwrap();

    let prepared = prepare_loaded_observations(&Dataset::load(&path).unwrap(), &registry).unwrap();
    assert_eq!(prepared.freqs(), &[Some("1D".to_string()), None]);

    let _ = std::fs::remove_dir_all(&temp_dir);
}

#[test]
fn load_rejects_unknown_units_on_prepare() {
    let temp_dir = std::env::temp_dir().join("hc_data_test_units");
    let _ = std::fs::remove_dir_all(&temp_dir);
    std::fs::create_dir_all(&temp_dir).unwrap();

    let path = temp_dir.join("obs.json");
    std::fs::write(
        &path,
        r#"{
            "dims": {"subbasin": 1, "time": 1},
            "coords": {
                "subbasin": {"dims": ["subbasin"], "data": [1]},
                "time": {"dims": ["time"], "data": ["2020-01-01"]}
            },
            "data_vars": {"Q": {"dims": ["subbasin", "time"], "attrs": {"units": "bogus"}, "data": [[1.0]]}}
        }"#,
    )
    .unwrap();

    let ds = Dataset::load(&path).unwrap();
    let err = prepare_loaded_observations(&ds, &UnitRegistry::with_defaults()).unwrap_err();
    assert!(err.to_string().contains("bogus"));

    let _ = std::fs::remove_dir_all(&temp_dir);
}
