//! In-memory dataset: one dense (computational unit × time) array per
//! variable, plus per-unit coordinates.

use std::collections::{BTreeMap, HashMap};

use hc_core::{NO_DATA, Real, TimeIndex, Tolerances, UnitRegistry, nearly_equal_or_missing};
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1};

use crate::{DataError, DataResult};

pub const TIME_DIM: &str = "time";

/// Computational-unit dimension name used when nothing declares one.
pub const DEFAULT_UNIT_DIM: &str = "computational_unit";

/// Attribute recording the computational-unit kind.
pub const UNIT_KIND_ATTR: &str = "computational_unit_kind";

/// (unit, time) values of one variable, with its unit string.
#[derive(Debug, Clone)]
pub struct Variable {
    units: Option<String>,
    data: Array2<Real>,
}

impl Variable {
    pub fn new(units: Option<String>, data: Array2<Real>) -> Self {
        Self { units, data }
    }

    /// Variable from row-major values of shape `(n_units, n_times)`.
    pub fn from_shape_vec(units: Option<String>, shape: (usize, usize), values: Vec<Real>) -> DataResult<Self> {
        let found = values.len();
        let data = Array2::from_shape_vec(shape, values).map_err(|_| DataError::ShapeMismatch {
            what: "variable values".to_string(),
            expected: shape.0 * shape.1,
            found,
        })?;
        Ok(Self { units, data })
    }

    /// Variable of no-data cells.
    pub fn filled(units: Option<String>, shape: (usize, usize)) -> Self {
        Self {
            units,
            data: Array2::from_elem(shape, NO_DATA),
        }
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn data(&self) -> ArrayView2<'_, Real> {
        self.data.view()
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, Real> {
        self.data.row(row)
    }

    pub fn row_mut(&mut self, row: usize) -> ArrayViewMut1<'_, Real> {
        self.data.row_mut(row)
    }

    /// Same values expressed in `target`.
    pub fn to_units(&self, name: &str, registry: &UnitRegistry, target: &str) -> DataResult<Self> {
        let from = self
            .units
            .as_deref()
            .ok_or_else(|| DataError::MissingUnits(name.to_string()))?;
        let factor = registry.conversion(from, target)?;
        Ok(Self {
            units: Some(target.to_string()),
            data: self.data.mapv(|v| factor.apply(v)),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    unit_dim: String,
    unit_ids: Vec<i64>,
    time: TimeIndex,
    names: Vec<Option<String>>,
    freqs: Vec<Option<String>>,
    variables: BTreeMap<String, Variable>,
    attrs: BTreeMap<String, String>,
}

impl Dataset {
    pub fn new(unit_dim: impl Into<String>, unit_ids: Vec<i64>, time: TimeIndex) -> Self {
        let n = unit_ids.len();
        Self {
            unit_dim: unit_dim.into(),
            unit_ids,
            time,
            names: vec![None; n],
            freqs: vec![None; n],
            variables: BTreeMap::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Dataset with no units, no timestamps and no variables.
    pub fn empty() -> Self {
        Self::new(DEFAULT_UNIT_DIM, Vec::new(), TimeIndex::empty())
    }

    /// Same units, coordinates and attributes on a new time axis, without
    /// any variables.
    pub fn empty_like(&self, time: TimeIndex) -> Self {
        Self {
            unit_dim: self.unit_dim.clone(),
            unit_ids: self.unit_ids.clone(),
            time,
            names: self.names.clone(),
            freqs: self.freqs.clone(),
            variables: BTreeMap::new(),
            attrs: self.attrs.clone(),
        }
    }

    pub fn unit_dim(&self) -> &str {
        &self.unit_dim
    }

    pub fn unit_ids(&self) -> &[i64] {
        &self.unit_ids
    }

    pub fn time(&self) -> &TimeIndex {
        &self.time
    }

    pub fn n_units(&self) -> usize {
        self.unit_ids.len()
    }

    pub fn n_times(&self) -> usize {
        self.time.len()
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        dim == TIME_DIM || dim == self.unit_dim
    }

    pub fn names(&self) -> &[Option<String>] {
        &self.names
    }

    pub fn freqs(&self) -> &[Option<String>] {
        &self.freqs
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn set_name(&mut self, row: usize, name: Option<String>) {
        self.names[row] = name;
    }

    pub fn set_freq(&mut self, row: usize, freq: Option<String>) {
        self.freqs[row] = freq;
    }

    /// Row of a computational-unit id.
    pub fn unit_row(&self, id: i64) -> Option<usize> {
        self.unit_ids.iter().position(|&u| u == id)
    }

    /// Identifier a station goes by in objective expressions: its name, or
    /// `<unit_dim>_<id>` when it has none.
    pub fn station_label(&self, row: usize) -> String {
        match &self.names[row] {
            Some(name) => name.clone(),
            None => format!("{}_{}", self.unit_dim, self.unit_ids[row]),
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn require_variable(&self, name: &str) -> DataResult<&Variable> {
        self.variable(name)
            .ok_or_else(|| DataError::VariableNotFound(name.to_string()))
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    pub fn insert_variable(&mut self, name: impl Into<String>, var: Variable) -> DataResult<()> {
        let name = name.into();
        if var.data.dim() != (self.n_units(), self.n_times()) {
            return Err(DataError::ShapeMismatch {
                what: format!("variable `{name}`"),
                expected: self.n_units() * self.n_times(),
                found: var.data.len(),
            });
        }
        self.variables.insert(name, var);
        Ok(())
    }

    /// Insert row-major `(unit, time)` values on this dataset's grid.
    pub fn insert_values(&mut self, name: impl Into<String>, units: Option<String>, values: Vec<Real>) -> DataResult<()> {
        let name = name.into();
        let var = Variable::from_shape_vec(units, (self.n_units(), self.n_times()), values).map_err(|e| match e {
            DataError::ShapeMismatch { expected, found, .. } => DataError::ShapeMismatch {
                what: format!("variable `{name}`"),
                expected,
                found,
            },
            other => other,
        })?;
        self.variables.insert(name, var);
        Ok(())
    }

    /// Values of `var` for one computational unit.
    pub fn series(&self, var: &str, unit_id: i64) -> DataResult<ArrayView1<'_, Real>> {
        let row = self.unit_row(unit_id).ok_or_else(|| DataError::UnitNotFound {
            dim: self.unit_dim.clone(),
            id: unit_id,
        })?;
        Ok(self.require_variable(var)?.row(row))
    }

    /// Fail on any variable whose unit the registry does not know.
    pub fn check_units(&self, registry: &UnitRegistry) -> DataResult<()> {
        for var in self.variables.values() {
            if let Some(units) = var.units() {
                registry.lookup(units)?;
            }
        }
        Ok(())
    }

    /// Place every variable on `time`. Instants missing from the current
    /// axis become no-data; nothing is interpolated or filled.
    pub fn reindex_time(&self, time: TimeIndex) -> Dataset {
        let src: Vec<Option<usize>> = time.iter().map(|ts| self.time.position(ts)).collect();
        let shape = (self.n_units(), time.len());

        let mut out = self.empty_like(time);
        for (name, var) in &self.variables {
            let mut moved = Variable::filled(var.units.clone(), shape);
            for (new_col, old_col) in src.iter().enumerate() {
                if let Some(c) = old_col {
                    moved.data.column_mut(new_col).assign(&var.data.column(*c));
                }
            }
            out.variables.insert(name.clone(), moved);
        }
        out
    }

    /// Structural equality with NaN-aware value comparison.
    pub fn approx_eq(&self, other: &Dataset, tol: Tolerances) -> bool {
        if self.unit_dim != other.unit_dim
            || self.unit_ids != other.unit_ids
            || self.time != other.time
            || self.names != other.names
            || self.freqs != other.freqs
            || self.variables.len() != other.variables.len()
        {
            return false;
        }
        self.variables.iter().all(|(name, a)| {
            other.variables.get(name).is_some_and(|b| {
                a.units == b.units
                    && a.data.dim() == b.data.dim()
                    && a.data
                        .iter()
                        .zip(b.data.iter())
                        .all(|(x, y)| nearly_equal_or_missing(*x, *y, tol))
            })
        })
    }

    /// Unit id → row lookup table.
    pub fn row_map(&self) -> HashMap<i64, usize> {
        self.unit_ids
            .iter()
            .enumerate()
            .map(|(row, id)| (*id, row))
            .collect()
    }
}
