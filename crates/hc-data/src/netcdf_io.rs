//! NetCDF datasets, the format MESH writes its gridded `*_GRD.nc` output in.
//!
//! Variables live on `(time, <unit dim>)` or `(<unit dim>, time)`. The time
//! coordinate carries CF `units` ("days since ..."). Station names and
//! per-station frequencies are not stored; only the grid and values are.

use std::path::Path;

use hc_core::{CfTimeUnits, NO_DATA, TimeIndex};
use ndarray::Array2;
use netcdf::AttributeValue;
use tracing::debug;

use crate::dataset::{UNIT_KIND_ATTR, Variable};
use crate::{DataError, DataResult, Dataset, TIME_DIM};

const UNITS_ATTR: &str = "units";
const FILL_ATTR: &str = "_FillValue";

fn string_attr(var: &netcdf::Variable<'_>, name: &str) -> DataResult<Option<String>> {
    match var.attribute_value(name).transpose()? {
        Some(AttributeValue::Str(s)) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn fill_value(var: &netcdf::Variable<'_>) -> DataResult<Option<f64>> {
    Ok(match var.attribute_value(FILL_ATTR).transpose()? {
        Some(AttributeValue::Double(v)) => Some(v),
        Some(AttributeValue::Float(v)) => Some(f64::from(v)),
        _ => None,
    })
}

fn dim_names(var: &netcdf::Variable<'_>) -> Vec<String> {
    var.dimensions().iter().map(|d| d.name()).collect()
}

/// The one non-time dimension shared by the gridded variables.
fn unit_dim(file: &netcdf::File) -> DataResult<String> {
    let mut found: Option<String> = None;
    for var in file.variables() {
        let dims = dim_names(&var);
        if dims.len() != 2 || !dims.iter().any(|d| d == TIME_DIM) {
            continue;
        }
        let other = dims.into_iter().find(|d| d != TIME_DIM).unwrap_or_default();
        match &found {
            None => found = Some(other),
            Some(dim) if *dim == other => {}
            Some(dim) => {
                return Err(DataError::AmbiguousDimensions {
                    dims: vec![dim.clone(), other],
                });
            }
        }
    }
    found.ok_or_else(|| DataError::MissingDimension {
        dim: "computational unit".to_string(),
    })
}

pub(crate) fn read(path: &Path) -> DataResult<Dataset> {
    let file = netcdf::open(path)?;
    let unit_dim = unit_dim(&file)?;

    let time_var = file.variable(TIME_DIM).ok_or_else(|| DataError::MissingCoordinate {
        name: TIME_DIM.to_string(),
    })?;
    let cf_units = string_attr(&time_var, UNITS_ATTR)?.ok_or_else(|| DataError::MissingCoordinate {
        name: format!("{TIME_DIM}.{UNITS_ATTR}"),
    })?;
    let cf = CfTimeUnits::parse(&cf_units)?;
    let raw_times = time_var
        .get_values::<f64, _>(..)?
        .into_iter()
        .map(|v| cf.decode(v))
        .collect::<Result<Vec<_>, _>>()?;
    let time = TimeIndex::new(raw_times.clone());
    if time.len() != raw_times.len() {
        return Err(DataError::InvalidCoordinate {
            coord: TIME_DIM.to_string(),
            value: "duplicate timestamps".to_string(),
        });
    }
    let columns: Vec<usize> = raw_times.iter().filter_map(|ts| time.position(ts)).collect();

    let n_units = file
        .dimension(&unit_dim)
        .map(|d| d.len())
        .ok_or_else(|| DataError::MissingDimension { dim: unit_dim.clone() })?;
    // MESH grids often have no coordinate variable; cells are then 1-based.
    let unit_ids = match file.variable(&unit_dim) {
        Some(coord) => coord.get_values::<i64, _>(..)?,
        None => (1..=n_units as i64).collect(),
    };

    let n_times = time.len();
    let mut ds = Dataset::new(unit_dim.clone(), unit_ids, time);
    ds.set_attr(UNIT_KIND_ATTR, unit_dim.clone());

    for var in file.variables() {
        let name = var.name();
        let dims = dim_names(&var);
        let time_major = match dims.as_slice() {
            [a, b] if a == TIME_DIM && *b == unit_dim => true,
            [a, b] if *a == unit_dim && b == TIME_DIM => false,
            _ => {
                debug!(variable = %name, ?dims, "skipping variable off the unit/time grid");
                continue;
            }
        };
        let fill = fill_value(&var)?;
        let values: Vec<f64> = var
            .get_values::<f64, _>(..)?
            .into_iter()
            .map(|v| if Some(v) == fill { NO_DATA } else { v })
            .collect();
        let (outer, inner) = if time_major { (n_times, n_units) } else { (n_units, n_times) };
        if values.len() != outer * inner {
            return Err(DataError::ShapeMismatch {
                what: format!("variable `{name}`"),
                expected: outer * inner,
                found: values.len(),
            });
        }

        let mut data = Array2::from_elem((n_units, n_times), NO_DATA);
        for (k, v) in values.into_iter().enumerate() {
            let (i, j) = (k / inner, k % inner);
            let cell = if time_major { [j, columns[i]] } else { [i, columns[j]] };
            data[cell] = v;
        }
        ds.insert_variable(name, Variable::new(string_attr(&var, UNITS_ATTR)?, data))?;
    }
    debug!(path = %path.display(), n_units, n_times, "read NetCDF dataset");
    Ok(ds)
}

/// Write `ds` time-major, the way MESH lays out its grids.
pub(crate) fn write(ds: &Dataset, path: &Path) -> DataResult<()> {
    let unit_dim = ds.unit_dim();
    let mut file = netcdf::create(path)?;
    file.add_dimension(TIME_DIM, ds.n_times())?;
    file.add_dimension(unit_dim, ds.n_units())?;

    let cf = CfTimeUnits {
        step_seconds: 86_400,
        reference: ds.time().first().unwrap_or_default(),
    };
    let offsets: Vec<f64> = ds.time().iter().map(|ts| cf.encode(ts)).collect();
    {
        let mut time_var = file.add_variable::<f64>(TIME_DIM, &[TIME_DIM])?;
        time_var.put_attribute(UNITS_ATTR, cf.to_string().as_str())?;
        time_var.put_values(&offsets, ..)?;
    }
    {
        let mut coord = file.add_variable::<i64>(unit_dim, &[unit_dim])?;
        coord.put_values(ds.unit_ids(), ..)?;
    }

    for (name, var) in ds.variables() {
        let values: Vec<f64> = var.data().t().iter().copied().collect();
        let mut out = file.add_variable::<f64>(name, &[TIME_DIM, unit_dim])?;
        if let Some(units) = var.units() {
            out.put_attribute(UNITS_ATTR, units)?;
        }
        out.put_values(&values, ..)?;
    }
    Ok(())
}
