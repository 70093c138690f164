//! Query helpers for inspecting datasets.

use hc_core::{Real, Timestamp, format_timestamp};
use hc_data::{DataError, Dataset};

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSummary {
    pub name: String,
    pub units: Option<String>,
    pub values: usize,
    pub missing: usize,
}

/// Summary of a dataset's grid and contents.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub unit_dim: String,
    pub stations: Vec<String>,
    pub n_times: usize,
    pub time_range: Option<(String, String)>,
    pub freq: Option<String>,
    pub variables: Vec<VariableSummary>,
}

pub fn summarize_dataset(ds: &Dataset) -> DatasetSummary {
    let time_range = ds
        .time()
        .first()
        .zip(ds.time().last())
        .map(|(a, b)| (format_timestamp(&a), format_timestamp(&b)));
    let freq = ds
        .time()
        .freq()
        .map(|f| f.to_string())
        .or_else(|| ds.freqs().iter().flatten().next().cloned());
    let variables = ds
        .variables()
        .map(|(name, var)| {
            let missing = var.data().iter().filter(|v| !v.is_finite()).count();
            VariableSummary {
                name: name.to_string(),
                units: var.units().map(str::to_string),
                values: var.data().len() - missing,
                missing,
            }
        })
        .collect();
    DatasetSummary {
        unit_dim: ds.unit_dim().to_string(),
        stations: (0..ds.n_units()).map(|row| ds.station_label(row)).collect(),
        n_times: ds.n_times(),
        time_range,
        freq,
        variables,
    }
}

/// Time series of `variable` at the station labelled `station`, skipping
/// missing values.
pub fn extract_station_series(ds: &Dataset, variable: &str, station: &str) -> AppResult<Vec<(Timestamp, Real)>> {
    let row = (0..ds.n_units())
        .find(|&row| ds.station_label(row) == station)
        .ok_or_else(|| DataError::InvalidCoordinate {
            coord: ds.unit_dim().to_string(),
            value: station.to_string(),
        })?;
    let values = ds.require_variable(variable)?.row(row);
    Ok(ds
        .time()
        .iter()
        .zip(values.iter())
        .filter(|(_, v)| v.is_finite())
        .map(|(ts, v)| (*ts, *v))
        .collect())
}
