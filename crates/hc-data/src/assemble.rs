//! Observation assembly: many station records onto one dense grid.

use std::collections::{BTreeMap, HashMap, HashSet};

use hc_core::freq::infer_regular;
use hc_core::{UnitRegistry, merge_time_indices};
use tracing::{debug, info, warn};

use crate::dataset::{UNIT_KIND_ATTR, Variable};
use crate::{DataError, DataResult, Dataset, ObservationEntry, ParsedSeries};

#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions {
    /// Convert entries into the first-seen unit of their type. When off,
    /// any unit disagreement within a type is an error.
    pub convert_units: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            convert_units: true,
        }
    }
}

/// Build a dataset from observation entries.
///
/// Units appear in first-seen order, the time axis is the sorted union of
/// every entry's timestamps, and cells no entry covers stay NaN.
pub fn assemble(
    entries: &[ObservationEntry],
    registry: &UnitRegistry,
    options: AssembleOptions,
) -> DataResult<Dataset> {
    let Some(first) = entries.first() else {
        return Ok(Dataset::empty());
    };
    let kind = first.computational_unit.as_str();
    if let Some(other) = entries.iter().find(|e| e.computational_unit != kind) {
        return Err(DataError::InconsistentUnitKind {
            first: kind.to_string(),
            other: other.computational_unit.clone(),
        });
    }

    let parsed: Vec<ParsedSeries> = entries
        .iter()
        .map(|e| {
            let series = e.timeseries.resolve()?;
            match series.first_duplicate() {
                Some(ts) => Err(e.duplicate_error(ts)),
                None => Ok(series),
            }
        })
        .collect::<DataResult<_>>()?;

    let time = merge_time_indices(parsed.iter().map(|p| p.index.as_slice()));

    let mut unit_ids = Vec::new();
    let mut seen = HashSet::new();
    for e in entries {
        if seen.insert(e.computational_unit_id) {
            unit_ids.push(e.computational_unit_id);
        }
    }

    let mut ds = Dataset::new(kind, unit_ids, time);
    ds.set_attr(UNIT_KIND_ATTR, kind);
    let rows = ds.row_map();
    let n_units = ds.n_units();
    let n_times = ds.n_times();
    debug!(entries = entries.len(), n_units, n_times, "assembling observations");

    let mut arrays: BTreeMap<String, Variable> = BTreeMap::new();
    let mut filled: HashMap<(usize, &str), usize> = HashMap::new();

    for (i, (entry, series)) in entries.iter().zip(&parsed).enumerate() {
        let row = rows[&entry.computational_unit_id];
        let var = arrays
            .entry(entry.var_type.clone())
            .or_insert_with(|| Variable::filled(Some(entry.unit.clone()), (n_units, n_times)));
        let reference = var.units().unwrap_or(entry.unit.as_str()).to_string();

        let mut values = series.values.clone();
        if entry.unit != reference {
            if !options.convert_units {
                return Err(DataError::InconsistentUnits {
                    var_type: entry.var_type.clone(),
                    found: entry.unit.clone(),
                    reference,
                });
            }
            registry.convert_slice(&mut values, &entry.unit, &reference)?;
        }

        if let Some(prev) = filled.insert((row, entry.var_type.as_str()), i) {
            warn!(
                station = %entry.label(),
                replaced_entry = prev,
                "observation row written twice; later entry replaces earlier one"
            );
        }

        let mut out = var.row_mut(row);
        out.fill(f64::NAN);
        for (ts, v) in series.index.iter().zip(values) {
            if let Some(col) = ds.time().position(ts) {
                out[col] = v;
            }
        }

        if ds.names()[row].is_none() && entry.name.is_some() {
            ds.set_name(row, entry.name.clone());
        }
        if ds.freqs()[row].is_none() && entry.freq.is_some() {
            ds.set_freq(row, entry.freq.clone());
        }
    }

    for (name, var) in arrays {
        ds.insert_variable(name, var)?;
    }
    ds.check_units(registry)?;

    info!(
        variables = ds.variable_names().len(),
        n_units, n_times, "observations assembled"
    );
    Ok(ds)
}

/// Prepare a dataset loaded from file for calibration.
///
/// Every variable unit must be known to the registry. When no unit carries
/// an explicit frequency, a regular frequency inferred from the time axis is
/// attached to all of them; if none can be inferred the coordinate is left
/// empty and a warning is logged.
pub fn prepare_loaded_observations(ds: &Dataset, registry: &UnitRegistry) -> DataResult<Dataset> {
    ds.check_units(registry)?;
    let mut out = ds.clone();
    if ds.freqs().iter().any(Option::is_some) {
        return Ok(out);
    }
    match infer_regular(ds.time().as_slice()) {
        Some(freq) => {
            let label = freq.to_string();
            for row in 0..out.n_units() {
                out.set_freq(row, Some(label.clone()));
            }
            debug!(freq = %label, "attached inferred observation frequency");
        }
        None => warn!("could not infer a regular frequency for loaded observations"),
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Series;
    use hc_core::{CoreError, Tolerances, nearly_equal};

    fn entry(id: i64, ty: &str, unit: &str, pairs: &[(&str, f64)]) -> ObservationEntry {
        ObservationEntry {
            name: None,
            var_type: ty.to_string(),
            timeseries: Series::from_pairs(pairs.iter().map(|(t, v)| (*t, Some(*v)))),
            unit: unit.to_string(),
            computational_unit: "subbasin".to_string(),
            computational_unit_id: id,
            freq: None,
        }
    }

    fn reg() -> UnitRegistry {
        UnitRegistry::with_defaults()
    }

    #[test]
    fn no_entries_gives_empty_dataset() {
        let ds = assemble(&[], &reg(), AssembleOptions::default()).unwrap();
        assert_eq!(ds.n_units(), 0);
        assert_eq!(ds.n_times(), 0);
        assert!(ds.variable_names().is_empty());
    }

    #[test]
    fn two_stations_with_unit_conversion() {
        let a = entry(
            1,
            "Q",
            "m3/s",
            &[("2020-01-01", 1.0), ("2020-01-02", 2.0), ("2020-01-03", 3.0)],
        );
        let b = entry(2, "Q", "L/s", &[("2020-01-02", 500.0), ("2020-01-04", 1500.0)]);
        let ds = assemble(&[a, b], &reg(), AssembleOptions::default()).unwrap();

        assert_eq!(ds.n_times(), 4);
        assert_eq!(ds.unit_ids(), &[1, 2]);
        assert_eq!(ds.unit_dim(), "subbasin");
        assert_eq!(ds.variable("Q").unwrap().units(), Some("m3/s"));

        let tol = Tolerances::default();
        let qa = ds.series("Q", 1).unwrap();
        assert_eq!(qa.iter().take(3).copied().collect::<Vec<_>>(), [1.0, 2.0, 3.0]);
        assert!(qa[3].is_nan());

        let qb = ds.series("Q", 2).unwrap();
        assert!(qb[0].is_nan());
        assert!(nearly_equal(qb[1], 0.5, tol));
        assert!(qb[2].is_nan());
        assert!(nearly_equal(qb[3], 1.5, tol));
    }

    #[test]
    fn unit_mismatch_without_conversion_names_both_units() {
        let a = entry(1, "Q", "m3/s", &[("2020-01-01", 1.0)]);
        let b = entry(2, "Q", "L/s", &[("2020-01-01", 1.0)]);
        let err = assemble(&[a, b], &reg(), AssembleOptions { convert_units: false }).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("L/s") && msg.contains("m3/s"), "{msg}");
    }

    #[test]
    fn incompatible_dimension_fails() {
        let a = entry(1, "Q", "m3/s", &[("2020-01-01", 1.0)]);
        let b = entry(2, "Q", "mm", &[("2020-01-01", 1.0)]);
        let err = assemble(&[a, b], &reg(), AssembleOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DataError::Core(CoreError::IncompatibleUnits { .. })
        ));
    }

    #[test]
    fn unknown_unit_fails() {
        let a = entry(1, "Q", "furlongs/fortnight", &[("2020-01-01", 1.0)]);
        let err = assemble(&[a], &reg(), AssembleOptions::default()).unwrap_err();
        assert!(matches!(err, DataError::Core(CoreError::UnknownUnit { .. })));
    }

    #[test]
    fn mixed_unit_kinds_fail() {
        let a = entry(1, "Q", "m3/s", &[("2020-01-01", 1.0)]);
        let mut b = entry(2, "Q", "m3/s", &[("2020-01-01", 1.0)]);
        b.computational_unit = "grid_cell".to_string();
        assert!(matches!(
            assemble(&[a, b], &reg(), AssembleOptions::default()),
            Err(DataError::InconsistentUnitKind { .. })
        ));
    }

    #[test]
    fn duplicate_timestamp_in_entry_fails() {
        let a = entry(1, "Q", "m3/s", &[("2020-01-01", 1.0), ("2020-01-01", 2.0)]);
        assert!(matches!(
            assemble(&[a], &reg(), AssembleOptions::default()),
            Err(DataError::DuplicateTimestamp { .. })
        ));
    }

    #[test]
    fn first_non_null_name_and_freq_win() {
        let mut a = entry(1, "Q", "m3/s", &[("2020-01-01", 1.0)]);
        let mut b = entry(1, "SWE", "mm", &[("2020-01-01", 1.0)]);
        let mut c = entry(1, "P", "mm", &[("2020-01-01", 1.0)]);
        b.name = Some("upper".to_string());
        b.freq = Some("1D".to_string());
        c.name = Some("ignored".to_string());
        a.freq = None;
        let ds = assemble(&[a, b, c], &reg(), AssembleOptions::default()).unwrap();
        assert_eq!(ds.names(), &[Some("upper".to_string())]);
        assert_eq!(ds.freqs(), &[Some("1D".to_string())]);
        assert_eq!(ds.variable_names(), vec!["P", "Q", "SWE"]);
    }

    #[test]
    fn loaded_dataset_gets_inferred_freq() {
        let a = entry(
            1,
            "Q",
            "m3/s",
            &[("2020-01-01", 1.0), ("2020-01-02", 2.0), ("2020-01-03", 3.0)],
        );
        let ds = assemble(&[a], &reg(), AssembleOptions::default()).unwrap();
        let prepared = prepare_loaded_observations(&ds, &reg()).unwrap();
        assert_eq!(prepared.freqs(), &[Some("1D".to_string())]);
    }

    #[test]
    fn loaded_dataset_with_irregular_time_keeps_freq_unset() {
        let a = entry(
            1,
            "Q",
            "m3/s",
            &[("2020-01-01", 1.0), ("2020-01-02", 2.0), ("2020-01-05", 3.0)],
        );
        let ds = assemble(&[a], &reg(), AssembleOptions::default()).unwrap();
        let prepared = prepare_loaded_observations(&ds, &reg()).unwrap();
        assert_eq!(prepared.freqs(), &[None]);
    }
}
