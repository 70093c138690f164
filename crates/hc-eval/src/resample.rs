//! Frequency reconciliation between simulated and observed datasets.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use hc_core::{Freq, NO_DATA, Real, TimeIndex, infer_frequency};
use hc_data::Dataset;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::{EvalError, EvalResult};

/// Aggregation applied to the values falling in one resampling bin.
/// No-data cells are skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Mean,
    Min,
    Max,
    First,
    Last,
    Median,
}

impl Reducer {
    /// Reduce one bin. An all-missing bin gives NaN, except for `Sum`,
    /// which gives zero.
    pub fn reduce(self, values: &[Real]) -> Real {
        let mut finite = values.iter().copied().filter(|v| !v.is_nan());
        match self {
            Self::Sum => finite.sum(),
            Self::Mean => {
                let (sum, n) = finite.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                if n == 0 { NO_DATA } else { sum / n as Real }
            }
            Self::Min => finite.reduce(Real::min).unwrap_or(NO_DATA),
            Self::Max => finite.reduce(Real::max).unwrap_or(NO_DATA),
            Self::First => finite.next().unwrap_or(NO_DATA),
            Self::Last => finite.last().unwrap_or(NO_DATA),
            Self::Median => {
                let mut sorted: Vec<Real> = finite.collect();
                if sorted.is_empty() {
                    return NO_DATA;
                }
                sorted.sort_by(Real::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
            Self::Median => "median",
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Reducer {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Self::Sum),
            "mean" | "avg" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "median" => Ok(Self::Median),
            _ => Err(EvalError::UnknownReducer {
                name: s.to_string(),
            }),
        }
    }
}

impl Serialize for Reducer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Reducer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Reducer per variable, with an optional fallback for the rest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReducerTable {
    #[serde(default)]
    pub methods: BTreeMap<String, Reducer>,
    #[serde(default)]
    pub default: Option<Reducer>,
}

impl ReducerTable {
    pub fn new(methods: BTreeMap<String, Reducer>, default: Option<Reducer>) -> Self {
        Self { methods, default }
    }

    pub fn with(mut self, var: impl Into<String>, reducer: Reducer) -> Self {
        self.methods.insert(var.into(), reducer);
        self
    }

    pub fn reducer_for(&self, var: &str) -> Option<Reducer> {
        self.methods.get(var).copied().or(self.default)
    }
}

/// Resample every variable of `ds` onto `freq`.
///
/// Fixed-step bins are anchored at midnight of the first timestamp's day;
/// month-start bins follow calendar months. Bins are left-closed and
/// labelled by their left edge, and run contiguously from the first to the
/// last occupied bin. Variables without a reducer are dropped.
pub fn resample_per_variable(ds: &Dataset, freq: Freq, table: &ReducerTable) -> EvalResult<Dataset> {
    let (Some(first), Some(last)) = (ds.time().first(), ds.time().last()) else {
        return Ok(ds.empty_like(TimeIndex::empty().with_freq(Some(freq))));
    };
    let origin = Freq::origin_for(first);
    let bins = freq.date_range(freq.bin_start(first, origin), freq.bin_start(last, origin));
    let time = TimeIndex::new(bins).with_freq(Some(freq));

    // Bin of every source column.
    let column_bin: Vec<usize> = ds
        .time()
        .iter()
        .map(|ts| time.position(&freq.bin_start(*ts, origin)).unwrap_or(0))
        .collect();

    let n_old = ds.n_times();
    let n_new = time.len();
    let mut out = ds.empty_like(time);
    let mut dropped = Vec::new();

    for (name, var) in ds.variables() {
        let Some(reducer) = table.reducer_for(name) else {
            dropped.push(name.to_string());
            continue;
        };
        let mut data = Vec::with_capacity(ds.n_units() * n_new);
        let mut bin_values: Vec<Vec<Real>> = vec![Vec::new(); n_new];
        for row in 0..ds.n_units() {
            bin_values.iter_mut().for_each(Vec::clear);
            for (v, bin) in var.row(row).iter().zip(&column_bin) {
                bin_values[*bin].push(*v);
            }
            data.extend(bin_values.iter().map(|vals| reducer.reduce(vals)));
        }
        out.insert_values(name, var.units().map(str::to_string), data)?;
    }

    if !dropped.is_empty() {
        warn!(variables = ?dropped, "no reducer configured; variables dropped from resampled output");
    }
    debug!(%freq, n_old, n_new, "resampled dataset");
    Ok(out)
}

/// The observation interval, taken from the per-unit `freq` coordinate.
/// All non-null values must agree.
pub fn observed_freq(obs: &Dataset) -> EvalResult<Freq> {
    let mut labels: Vec<&str> = obs.freqs().iter().flatten().map(String::as_str).collect();
    labels.sort_unstable();
    labels.dedup();

    let parsed = labels
        .iter()
        .map(|l| l.parse::<Freq>())
        .collect::<Result<Vec<_>, _>>()?;
    let Some(&freq) = parsed.first() else {
        return Err(EvalError::MissingObservedFreq);
    };
    if parsed.iter().any(|f| *f != freq) {
        return Err(EvalError::InconsistentObservedFreq {
            found: labels.iter().map(|l| l.to_string()).collect(),
        });
    }
    Ok(freq)
}

/// Bring `sim` to the observation interval. Equal intervals pass through
/// untouched.
pub fn reconcile(sim: &Dataset, obs: &Dataset, table: &ReducerTable) -> EvalResult<Dataset> {
    let obs_freq = observed_freq(obs)?;
    let sim_freq = infer_frequency(sim.time())?;
    if sim_freq == obs_freq {
        return Ok(sim.clone());
    }
    info!(from = %sim_freq, to = %obs_freq, "resampling simulated output");
    resample_per_variable(sim, obs_freq, table)
}
