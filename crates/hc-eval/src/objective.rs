//! Objective function scoring.

use std::borrow::Cow;
use std::collections::BTreeMap;

use hc_core::{Real, UnitRegistry};
use hc_data::{DataError, Dataset};
use tracing::debug;

use crate::expr::evaluate;
use crate::metrics::{MetricFn, metric};
use crate::{EvalError, EvalResult, parse_expression};

/// flux → metric → expressions over per-station metric values.
pub type ObjectiveSpec = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// flux → metric → one score per expression, in expression order.
pub type ObjectiveScores = BTreeMap<String, BTreeMap<String, Vec<Real>>>;

/// Fail early on metric names or expressions that can never evaluate.
pub fn validate_objectives(spec: &ObjectiveSpec) -> EvalResult<()> {
    for metrics in spec.values() {
        for (name, exprs) in metrics {
            if metric(name).is_none() {
                return Err(EvalError::UnknownMetric { name: name.clone() });
            }
            for e in exprs {
                parse_expression(e)?;
            }
        }
    }
    Ok(())
}

/// Simulated and observed datasets must index the same kind of
/// computational unit.
pub fn check_structure(sim: &Dataset, obs: &Dataset) -> EvalResult<()> {
    if sim.unit_dim() != obs.unit_dim() {
        return Err(EvalError::DimensionMismatch {
            simulated: sim.unit_dim().to_string(),
            observed: obs.unit_dim().to_string(),
        });
    }
    Ok(())
}

/// Metric value per observed station for one flux.
///
/// The simulated series is converted to the observed unit when both are
/// known, then both are aligned on the observed timestamps; pairs where
/// either side is missing or non-finite are dropped. A simulated variable
/// without units cannot be compared against observations that have one.
pub fn station_metrics(
    flux: &str,
    f: MetricFn,
    sim: &Dataset,
    obs: &Dataset,
    registry: &UnitRegistry,
) -> EvalResult<BTreeMap<String, Real>> {
    let obs_var = obs.require_variable(flux)?;
    let sim_var = sim.require_variable(flux)?;
    let sim_var = match (sim_var.units(), obs_var.units()) {
        (Some(s), Some(o)) if s != o => Cow::Owned(sim_var.to_units(flux, registry, o)?),
        (None, Some(_)) => return Err(DataError::MissingUnits(flux.to_string()).into()),
        _ => Cow::Borrowed(sim_var),
    };

    let columns: Vec<Option<usize>> = obs.time().iter().map(|ts| sim.time().position(ts)).collect();

    let mut out = BTreeMap::new();
    for (row, id) in obs.unit_ids().iter().enumerate() {
        let sim_row = sim
            .unit_row(*id)
            .ok_or(EvalError::MissingStation { id: *id })?;
        let o = obs_var.row(row);
        let s = sim_var.row(sim_row);

        let (sim_vals, obs_vals): (Vec<Real>, Vec<Real>) = columns
            .iter()
            .zip(o.iter())
            .filter_map(|(col, ov)| col.map(|c| (s[c], *ov)))
            .filter(|(sv, ov)| sv.is_finite() && ov.is_finite())
            .unzip();

        let label = obs.station_label(row);
        debug!(station = %label, pairs = obs_vals.len(), "scoring station");
        out.insert(label, f(&sim_vals, &obs_vals));
    }
    Ok(out)
}

/// Score every configured expression. Any failing station fails the whole
/// evaluation.
pub fn evaluate_objectives(
    spec: &ObjectiveSpec,
    sim: &Dataset,
    obs: &Dataset,
    registry: &UnitRegistry,
) -> EvalResult<ObjectiveScores> {
    check_structure(sim, obs)?;
    let mut scores = ObjectiveScores::new();
    for (flux, metrics) in spec {
        let per_flux = scores.entry(flux.clone()).or_default();
        for (name, exprs) in metrics {
            let f = metric(name).ok_or_else(|| EvalError::UnknownMetric { name: name.clone() })?;
            let values = station_metrics(flux, f, sim, obs, registry)?;
            let results = exprs
                .iter()
                .map(|e| evaluate(e, &values))
                .collect::<EvalResult<Vec<_>>>()?;
            per_flux.insert(name.clone(), results);
        }
    }
    Ok(scores)
}
