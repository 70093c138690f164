//! Persisted dataset file.
//!
//! The layout follows the xarray dictionary form so files written by other
//! tooling can be read back: `dims`, `coords`, `data_vars` and `attrs`,
//! with `null` standing in for no data.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use hc_core::{Freq, NO_DATA, TimeIndex, format_timestamp, parse_timestamp, to_option};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::dataset::{UNIT_KIND_ATTR, Variable};
use crate::{DataError, DataResult, Dataset, TIME_DIM};
#[cfg(feature = "netcdf")]
use crate::netcdf_io::{read as read_netcdf, write as write_netcdf};

const NAME_COORD: &str = "name";
const FREQ_COORD: &str = "freq";
const FREQ_ATTR: &str = "freq";
const UNITS_ATTR: &str = "units";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetFile {
    #[serde(default)]
    pub dims: BTreeMap<String, usize>,
    #[serde(default)]
    pub coords: BTreeMap<String, CoordEntry>,
    #[serde(default)]
    pub data_vars: BTreeMap<String, VarEntry>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordEntry {
    pub dims: Vec<String>,
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VarEntry {
    pub dims: Vec<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    pub data: Vec<Vec<Option<f64>>>,
}

impl DatasetFile {
    pub fn from_dataset(ds: &Dataset) -> Self {
        let unit_dim = ds.unit_dim().to_string();
        let unit_coord = vec![unit_dim.clone()];

        let mut dims = BTreeMap::new();
        dims.insert(unit_dim.clone(), ds.n_units());
        dims.insert(TIME_DIM.to_string(), ds.n_times());

        let mut coords = BTreeMap::new();
        coords.insert(
            unit_dim.clone(),
            CoordEntry {
                dims: unit_coord.clone(),
                data: ds.unit_ids().iter().map(|id| Value::from(*id)).collect(),
                attrs: BTreeMap::new(),
            },
        );
        let mut time_attrs = BTreeMap::new();
        if let Some(freq) = ds.time().freq() {
            time_attrs.insert(FREQ_ATTR.to_string(), freq.to_string());
        }
        coords.insert(
            TIME_DIM.to_string(),
            CoordEntry {
                dims: vec![TIME_DIM.to_string()],
                data: ds
                    .time()
                    .iter()
                    .map(|ts| Value::from(format_timestamp(ts)))
                    .collect(),
                attrs: time_attrs,
            },
        );
        for (coord, values) in [(NAME_COORD, ds.names()), (FREQ_COORD, ds.freqs())] {
            coords.insert(
                coord.to_string(),
                CoordEntry {
                    dims: unit_coord.clone(),
                    data: values
                        .iter()
                        .map(|v| v.clone().map_or(Value::Null, Value::from))
                        .collect(),
                    attrs: BTreeMap::new(),
                },
            );
        }

        let data_vars = ds
            .variables()
            .map(|(name, var)| {
                let mut attrs = BTreeMap::new();
                if let Some(units) = var.units() {
                    attrs.insert(UNITS_ATTR.to_string(), units.to_string());
                }
                let data = var
                    .data()
                    .rows()
                    .into_iter()
                    .map(|row| row.iter().map(|v| to_option(*v)).collect())
                    .collect();
                (
                    name.to_string(),
                    VarEntry {
                        dims: vec![unit_dim.clone(), TIME_DIM.to_string()],
                        attrs,
                        data,
                    },
                )
            })
            .collect();

        let mut attrs = ds.attrs().clone();
        attrs
            .entry(UNIT_KIND_ATTR.to_string())
            .or_insert_with(|| unit_dim.clone());

        Self {
            dims,
            coords,
            data_vars,
            attrs,
        }
    }

    /// The dimension that indexes computational units.
    fn unit_dim(&self) -> DataResult<String> {
        if !self.dims.contains_key(TIME_DIM) {
            return Err(DataError::MissingDimension {
                dim: TIME_DIM.to_string(),
            });
        }
        if let Some(kind) = self.attrs.get(UNIT_KIND_ATTR)
            && self.dims.contains_key(kind)
        {
            return Ok(kind.clone());
        }
        let others: Vec<&String> = self.dims.keys().filter(|d| *d != TIME_DIM).collect();
        match others.as_slice() {
            [only] => Ok((*only).clone()),
            _ => Err(DataError::AmbiguousDimensions {
                dims: self.dims.keys().cloned().collect(),
            }),
        }
    }

    fn coord(&self, name: &str) -> DataResult<&CoordEntry> {
        self.coords.get(name).ok_or_else(|| DataError::MissingCoordinate {
            name: name.to_string(),
        })
    }

    /// Optional per-unit string coordinate; `null` entries stay `None`.
    fn unit_strings(&self, name: &str, n_units: usize) -> DataResult<Vec<Option<String>>> {
        let Some(coord) = self.coords.get(name) else {
            return Ok(vec![None; n_units]);
        };
        if coord.data.len() != n_units {
            return Err(DataError::ShapeMismatch {
                what: format!("coordinate `{name}`"),
                expected: n_units,
                found: coord.data.len(),
            });
        }
        Ok(coord
            .data
            .iter()
            .map(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect())
    }

    pub fn into_dataset(self) -> DataResult<Dataset> {
        let unit_dim = self.unit_dim()?;

        let unit_ids = self
            .coord(&unit_dim)?
            .data
            .iter()
            .map(|v| {
                v.as_i64()
                    .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
                    .ok_or_else(|| DataError::InvalidCoordinate {
                        coord: unit_dim.clone(),
                        value: v.to_string(),
                    })
            })
            .collect::<DataResult<Vec<i64>>>()?;

        let time_coord = self.coord(TIME_DIM)?;
        let raw_times = time_coord
            .data
            .iter()
            .map(|v| match v.as_str() {
                Some(s) => Ok(parse_timestamp(s)?),
                None => Err(DataError::InvalidCoordinate {
                    coord: TIME_DIM.to_string(),
                    value: v.to_string(),
                }),
            })
            .collect::<DataResult<Vec<_>>>()?;
        let freq = time_coord
            .attrs
            .get(FREQ_ATTR)
            .map(|f| f.parse::<Freq>())
            .transpose()?;
        let time = TimeIndex::new(raw_times.clone()).with_freq(freq);
        if time.len() != raw_times.len() {
            return Err(DataError::InvalidCoordinate {
                coord: TIME_DIM.to_string(),
                value: "duplicate timestamps".to_string(),
            });
        }
        // Column of each stored time in the sorted index.
        let columns: Vec<usize> = raw_times
            .iter()
            .filter_map(|ts| time.position(ts))
            .collect();

        let n_units = unit_ids.len();
        let n_times = time.len();
        let names = self.unit_strings(NAME_COORD, n_units)?;
        let freqs = self.unit_strings(FREQ_COORD, n_units)?;

        let mut ds = Dataset::new(unit_dim.clone(), unit_ids, time);
        for (row, (name, freq)) in names.into_iter().zip(freqs).enumerate() {
            ds.set_name(row, name);
            ds.set_freq(row, freq);
        }
        for (k, v) in &self.attrs {
            ds.set_attr(k.clone(), v.clone());
        }

        for (name, entry) in self.data_vars {
            let transposed = match entry.dims.as_slice() {
                [a, b] if *a == unit_dim && b == TIME_DIM => false,
                [a, b] if a == TIME_DIM && *b == unit_dim => true,
                _ => {
                    debug!(variable = %name, dims = ?entry.dims, "skipping variable off the unit/time grid");
                    continue;
                }
            };
            let (outer, inner) = if transposed {
                (n_times, n_units)
            } else {
                (n_units, n_times)
            };
            if entry.data.len() != outer || entry.data.iter().any(|r| r.len() != inner) {
                return Err(DataError::ShapeMismatch {
                    what: format!("variable `{name}`"),
                    expected: n_units * n_times,
                    found: entry.data.iter().map(Vec::len).sum(),
                });
            }

            let mut data = Array2::from_elem((n_units, n_times), NO_DATA);
            for (i, r) in entry.data.iter().enumerate() {
                for (j, v) in r.iter().enumerate() {
                    let cell = if transposed { [j, columns[i]] } else { [i, columns[j]] };
                    data[cell] = v.unwrap_or(NO_DATA);
                }
            }
            let units = entry.attrs.get(UNITS_ATTR).cloned();
            ds.insert_variable(name, Variable::new(units, data))?;
        }
        Ok(ds)
    }
}

/// On-disk dataset encoding, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Json,
    NetCdf,
}

impl DatasetFormat {
    /// `.nc`/`.nc4` files are NetCDF; everything else is the JSON layout.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("nc") || ext.eq_ignore_ascii_case("nc4") => Self::NetCdf,
            _ => Self::Json,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::NetCdf => "nc",
        }
    }

    /// Whether this build can read and write the format.
    pub fn is_available(self) -> bool {
        match self {
            Self::Json => true,
            Self::NetCdf => cfg!(feature = "netcdf"),
        }
    }
}

impl std::fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Json => "JSON",
            Self::NetCdf => "NetCDF",
        })
    }
}

impl std::str::FromStr for DatasetFormat {
    type Err = hc_core::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "nc" | "nc4" | "netcdf" => Ok(Self::NetCdf),
            _ => Err(hc_core::CoreError::InvalidArg {
                what: format!("dataset format '{s}' (expected json or netcdf)"),
            }),
        }
    }
}

impl Dataset {
    pub fn load(path: &Path) -> DataResult<Self> {
        match DatasetFormat::from_path(path) {
            DatasetFormat::Json => {
                let content = fs::read_to_string(path)?;
                let file: DatasetFile = serde_json::from_str(&content)?;
                file.into_dataset()
            }
            DatasetFormat::NetCdf => read_netcdf(path),
        }
    }

    /// Write as a dataset file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> DataResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        match DatasetFormat::from_path(path) {
            DatasetFormat::Json => {
                let json = serde_json::to_string_pretty(&DatasetFile::from_dataset(self))?;
                fs::write(path, json)?;
                Ok(())
            }
            DatasetFormat::NetCdf => write_netcdf(self, path),
        }
    }
}

#[cfg(not(feature = "netcdf"))]
fn read_netcdf(_path: &Path) -> DataResult<Dataset> {
    Err(DataError::FormatUnavailable {
        format: DatasetFormat::NetCdf,
    })
}

#[cfg(not(feature = "netcdf"))]
fn write_netcdf(_ds: &Dataset, _path: &Path) -> DataResult<()> {
    Err(DataError::FormatUnavailable {
        format: DatasetFormat::NetCdf,
    })
}
