//! Goodness-of-fit metrics for calibration objectives.
//!
//! Every metric takes simulated then observed values of equal length, with
//! missing pairs already removed, and returns a scalar. Empty input gives
//! NaN. Names and formulas follow the HydroErr package, so objective
//! files written for it keep working.

use hc_core::Real;

pub type MetricFn = fn(&[Real], &[Real]) -> Real;

const METRICS: &[(&str, MetricFn)] = &[
    ("me", me),
    ("mae", mae),
    ("mse", mse),
    ("rmse", rmse),
    ("nse", nse),
    ("nse_mod", nse_mod),
    ("kge_2009", kge_2009),
    ("kge_2012", kge_2012),
    ("pearson_r", pearson_r),
    ("r_squared", r_squared),
    ("pbias", pbias),
    ("d", d),
    ("d1", d1),
    ("dr", dr),
    ("ed", ed),
    ("ned", ned),
    ("mde", mde),
    ("mdae", mdae),
    ("mdse", mdse),
    ("mle", mle),
    ("male", male),
    ("msle", msle),
    ("rmsle", rmsle),
    ("nrmse_range", nrmse_range),
    ("nrmse_mean", nrmse_mean),
    ("nrmse_iqr", nrmse_iqr),
    ("mape", mape),
    ("mapd", mapd),
    ("maape", maape),
    ("smape1", smape1),
    ("smape2", smape2),
    ("mase", mase),
    ("ve", ve),
    ("lm_index", lm_index),
    ("nse_rel", nse_rel),
    ("spearman_r", spearman_r),
    ("sa", sa),
    ("sc", sc),
];

/// Look up a metric by name.
pub fn metric(name: &str) -> Option<MetricFn> {
    METRICS.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

pub fn metric_names() -> impl Iterator<Item = &'static str> {
    METRICS.iter().map(|(n, _)| *n)
}

fn mean(values: &[Real]) -> Real {
    values.iter().sum::<Real>() / values.len() as Real
}

/// Linear-interpolated percentile, `q` in `[0, 1]`.
fn percentile(values: &[Real], q: Real) -> Real {
    if values.is_empty() {
        return Real::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q * (sorted.len() - 1) as Real;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as Real)
}

fn median(values: &[Real]) -> Real {
    percentile(values, 0.5)
}

/// 1-based ranks, ties sharing their average rank.
fn ranks(values: &[Real]) -> Vec<Real> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut out = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as Real / 2.0;
        for &i in &order[start..end] {
            out[i] = rank;
        }
        start = end;
    }
    out
}

fn diffs(simulated: &[Real], observed: &[Real]) -> Vec<Real> {
    simulated.iter().zip(observed).map(|(s, o)| s - o).collect()
}

fn log_diffs(simulated: &[Real], observed: &[Real]) -> Vec<Real> {
    simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| s.ln_1p() - o.ln_1p())
        .collect()
}

/// Population standard deviation.
fn std_dev(values: &[Real], mean: Real) -> Real {
    (values.iter().map(|v| (v - mean).powi(2)).sum::<Real>() / values.len() as Real).sqrt()
}

/// Mean error. Positive = overestimation.
pub fn me(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    simulated.iter().zip(observed).map(|(s, o)| s - o).sum::<Real>() / observed.len() as Real
}

/// Mean Absolute Error. Range: [0, inf), 0 = perfect.
pub fn mae(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| (s - o).abs())
        .sum::<Real>()
        / observed.len() as Real
}

/// Mean Squared Error.
pub fn mse(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| (s - o).powi(2))
        .sum::<Real>()
        / observed.len() as Real
}

/// Root Mean Square Error. Range: [0, inf), 0 = perfect.
pub fn rmse(simulated: &[Real], observed: &[Real]) -> Real {
    mse(simulated, observed).sqrt()
}

/// Nash-Sutcliffe Efficiency. Range: (-inf, 1], 1 = perfect.
pub fn nse(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let mean_obs = mean(observed);
    let numerator: Real = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| (o - s).powi(2))
        .sum();
    let denominator: Real = observed.iter().map(|o| (o - mean_obs).powi(2)).sum();
    if denominator == 0.0 {
        return Real::NEG_INFINITY;
    }
    1.0 - numerator / denominator
}

/// NSE on absolute rather than squared deviations.
pub fn nse_mod(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let mean_obs = mean(observed);
    let numerator: Real = simulated.iter().zip(observed).map(|(s, o)| (o - s).abs()).sum();
    let denominator: Real = observed.iter().map(|o| (o - mean_obs).abs()).sum();
    if denominator == 0.0 {
        return Real::NEG_INFINITY;
    }
    1.0 - numerator / denominator
}

/// Pearson correlation coefficient.
pub fn pearson_r(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let n = observed.len() as Real;
    let mean_s = mean(simulated);
    let mean_o = mean(observed);
    let std_s = std_dev(simulated, mean_s);
    let std_o = std_dev(observed, mean_o);
    if std_s == 0.0 || std_o == 0.0 {
        return 0.0;
    }
    simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| (s - mean_s) * (o - mean_o))
        .sum::<Real>()
        / (n * std_s * std_o)
}

/// Coefficient of determination, as the squared Pearson correlation.
pub fn r_squared(simulated: &[Real], observed: &[Real]) -> Real {
    pearson_r(simulated, observed).powi(2)
}

fn kge_terms(simulated: &[Real], observed: &[Real]) -> (Real, Real, Real, Real, Real) {
    let mean_s = mean(simulated);
    let mean_o = mean(observed);
    let std_s = std_dev(simulated, mean_s);
    let std_o = std_dev(observed, mean_o);
    (pearson_r(simulated, observed), mean_s, mean_o, std_s, std_o)
}

/// Kling-Gupta Efficiency (Gupta et al., 2009). Range: (-inf, 1].
pub fn kge_2009(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let (r, mean_s, mean_o, std_s, std_o) = kge_terms(simulated, observed);
    let alpha = if std_o == 0.0 { 0.0 } else { std_s / std_o };
    let beta = if mean_o == 0.0 { 0.0 } else { mean_s / mean_o };
    1.0 - ((r - 1.0).powi(2) + (alpha - 1.0).powi(2) + (beta - 1.0).powi(2)).sqrt()
}

/// Kling-Gupta Efficiency (Kling et al., 2012), variability measured by
/// the ratio of coefficients of variation. Range: (-inf, 1].
pub fn kge_2012(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let (r, mean_s, mean_o, std_s, std_o) = kge_terms(simulated, observed);
    let beta = if mean_o == 0.0 { 0.0 } else { mean_s / mean_o };
    let cv_s = if mean_s == 0.0 { 0.0 } else { std_s / mean_s };
    let cv_o = if mean_o == 0.0 { 0.0 } else { std_o / mean_o };
    let gamma = if cv_o == 0.0 { 0.0 } else { cv_s / cv_o };
    1.0 - ((r - 1.0).powi(2) + (beta - 1.0).powi(2) + (gamma - 1.0).powi(2)).sqrt()
}

/// Percent Bias. Optimal = 0. Positive = overestimation.
pub fn pbias(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let sum_obs: Real = observed.iter().sum();
    if sum_obs == 0.0 {
        return Real::INFINITY;
    }
    let diff_sum: Real = simulated.iter().zip(observed).map(|(s, o)| s - o).sum();
    100.0 * diff_sum / sum_obs
}

/// Index of agreement (Willmott, 1981). Range: [0, 1], 1 = perfect.
pub fn d(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let mean_o = mean(observed);
    let numerator: Real = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| (o - s).powi(2))
        .sum();
    let denominator: Real = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| ((s - mean_o).abs() + (o - mean_o).abs()).powi(2))
        .sum();
    if denominator == 0.0 {
        return if numerator == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - numerator / denominator
}

/// Willmott's (1985) index of agreement on absolute deviations.
pub fn d1(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let mean_o = mean(observed);
    let numerator: Real = simulated.iter().zip(observed).map(|(s, o)| (o - s).abs()).sum();
    let denominator: Real = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| (s - mean_o).abs() + (o - mean_o).abs())
        .sum();
    if denominator == 0.0 {
        return if numerator == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - numerator / denominator
}

/// Refined index of agreement (Willmott et al., 2012). Range: [-1, 1].
pub fn dr(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let mean_o = mean(observed);
    let a: Real = simulated.iter().zip(observed).map(|(s, o)| (s - o).abs()).sum();
    let b: Real = 2.0 * observed.iter().map(|o| (o - mean_o).abs()).sum::<Real>();
    if a <= b {
        if b == 0.0 { 1.0 } else { 1.0 - a / b }
    } else {
        b / a - 1.0
    }
}

/// Euclidean distance.
pub fn ed(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    diffs(simulated, observed).iter().map(|e| e * e).sum::<Real>().sqrt()
}

/// Euclidean distance between mean-normalized series.
pub fn ned(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let mean_s = mean(simulated);
    let mean_o = mean(observed);
    simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| (o / mean_o - s / mean_s).powi(2))
        .sum::<Real>()
        .sqrt()
}

/// Median error.
pub fn mde(simulated: &[Real], observed: &[Real]) -> Real {
    median(&diffs(simulated, observed))
}

/// Median absolute error.
pub fn mdae(simulated: &[Real], observed: &[Real]) -> Real {
    let abs: Vec<Real> = diffs(simulated, observed).iter().map(|e| e.abs()).collect();
    median(&abs)
}

/// Median squared error.
pub fn mdse(simulated: &[Real], observed: &[Real]) -> Real {
    let sq: Vec<Real> = diffs(simulated, observed).iter().map(|e| e * e).collect();
    median(&sq)
}

/// Mean log error, on `ln(1 + x)`.
pub fn mle(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    mean(&log_diffs(simulated, observed))
}

/// Mean absolute log error.
pub fn male(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    log_diffs(simulated, observed).iter().map(|e| e.abs()).sum::<Real>() / observed.len() as Real
}

/// Mean squared log error.
pub fn msle(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    log_diffs(simulated, observed).iter().map(|e| e * e).sum::<Real>() / observed.len() as Real
}

/// Root mean squared log error.
pub fn rmsle(simulated: &[Real], observed: &[Real]) -> Real {
    msle(simulated, observed).sqrt()
}

/// RMSE over the observed range.
pub fn nrmse_range(simulated: &[Real], observed: &[Real]) -> Real {
    let max = observed.iter().copied().fold(Real::NEG_INFINITY, Real::max);
    let min = observed.iter().copied().fold(Real::INFINITY, Real::min);
    rmse(simulated, observed) / (max - min)
}

/// RMSE over the observed mean.
pub fn nrmse_mean(simulated: &[Real], observed: &[Real]) -> Real {
    rmse(simulated, observed) / mean(observed)
}

/// RMSE over the observed interquartile range.
pub fn nrmse_iqr(simulated: &[Real], observed: &[Real]) -> Real {
    rmse(simulated, observed) / (percentile(observed, 0.75) - percentile(observed, 0.25))
}

/// Mean absolute percentage error, in percent.
pub fn mape(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let sum: Real = simulated.iter().zip(observed).map(|(s, o)| ((s - o) / o).abs()).sum();
    100.0 * sum / observed.len() as Real
}

/// Mean absolute percentage deviation: total absolute error over total
/// absolute observation.
pub fn mapd(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let error: Real = simulated.iter().zip(observed).map(|(s, o)| (s - o).abs()).sum();
    error / observed.iter().map(|o| o.abs()).sum::<Real>()
}

/// Mean arctangent absolute percentage error.
pub fn maape(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let sum: Real = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| ((s - o) / o).abs().atan())
        .sum();
    sum / observed.len() as Real
}

/// Symmetric MAPE over `|s| + |o|`, in percent.
pub fn smape1(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let sum: Real = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| {
            let scale = s.abs() + o.abs();
            if scale == 0.0 { 0.0 } else { (s - o).abs() / scale }
        })
        .sum();
    100.0 * sum / observed.len() as Real
}

/// Symmetric MAPE over the pair mean, in percent.
pub fn smape2(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let sum: Real = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| {
            let scale = (s + o) / 2.0;
            if scale == 0.0 { 0.0 } else { ((s - o) / scale).abs() }
        })
        .sum();
    100.0 * sum / observed.len() as Real
}

/// Mean absolute scaled error against the one-step naive forecast.
pub fn mase(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let steps: Vec<Real> = observed.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    mae(simulated, observed) / mean(&steps)
}

/// Volumetric efficiency (Criss and Winston, 2008). Range: (-inf, 1].
pub fn ve(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let error: Real = simulated.iter().zip(observed).map(|(s, o)| (s - o).abs()).sum();
    1.0 - error / observed.iter().sum::<Real>()
}

/// Legate-McCabe efficiency index.
pub fn lm_index(simulated: &[Real], observed: &[Real]) -> Real {
    nse_mod(simulated, observed)
}

/// NSE on errors relative to the observations.
pub fn nse_rel(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let mean_o = mean(observed);
    let numerator: Real = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| ((s - o) / o).powi(2))
        .sum();
    let denominator: Real = observed.iter().map(|o| ((o - mean_o) / mean_o).powi(2)).sum();
    if denominator == 0.0 {
        return Real::NEG_INFINITY;
    }
    1.0 - numerator / denominator
}

/// Spearman rank correlation, ties ranked by their average.
pub fn spearman_r(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    pearson_r(&ranks(simulated), &ranks(observed))
}

/// Angle from a dot product and the two sums of squares.
fn angle(dot: Real, ss_a: Real, ss_b: Real) -> Real {
    (dot / (ss_a * ss_b).sqrt()).clamp(-1.0, 1.0).acos()
}

/// Spectral angle between the two series, in radians. 0 = perfect.
pub fn sa(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let dot: Real = simulated.iter().zip(observed).map(|(s, o)| s * o).sum();
    let ss = |v: &[Real]| v.iter().map(|x| x * x).sum::<Real>();
    angle(dot, ss(simulated), ss(observed))
}

/// Spectral correlation: the angle between the mean anomalies, in radians.
pub fn sc(simulated: &[Real], observed: &[Real]) -> Real {
    if observed.is_empty() {
        return Real::NAN;
    }
    let mean_s = mean(simulated);
    let mean_o = mean(observed);
    let dot: Real = simulated
        .iter()
        .zip(observed)
        .map(|(s, o)| (s - mean_s) * (o - mean_o))
        .sum();
    let ss = |v: &[Real], m: Real| v.iter().map(|x| (x - m).powi(2)).sum::<Real>();
    angle(dot, ss(simulated, mean_s), ss(observed, mean_o))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hc_core::{Tolerances, nearly_equal};

    const OBS: [Real; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];

    fn close(a: Real, b: Real) -> bool {
        nearly_equal(a, b, Tolerances { abs: 1e-10, rel: 1e-9 })
    }

    #[test]
    fn lookup_by_name() {
        assert!(metric("kge_2012").is_some());
        assert!(metric("kge").is_none());
        assert!(metric("nrmse_range").is_some());
        assert_eq!(metric_names().count(), 38);
    }

    #[test]
    fn perfect_simulation() {
        for name in [
            "nse", "nse_mod", "kge_2009", "kge_2012", "pearson_r", "r_squared", "d", "d1", "dr", "ve",
            "lm_index", "nse_rel", "spearman_r",
        ] {
            let f = metric(name).unwrap();
            assert!(close(f(&OBS, &OBS), 1.0), "{name}");
        }
        for name in [
            "me", "mae", "mse", "rmse", "pbias", "ed", "ned", "mde", "mdae", "mdse", "mle", "male", "msle",
            "rmsle", "nrmse_range", "nrmse_mean", "nrmse_iqr", "mape", "mapd", "maape", "smape1", "smape2",
            "mase", "sa", "sc",
        ] {
            let f = metric(name).unwrap();
            assert!(close(f(&OBS, &OBS), 0.0), "{name}");
        }
    }

    #[test]
    fn nse_known_value() {
        // num = 0.01+0.04+0.04+0.01+0.01 = 0.11, den = 10
        let sim = [1.1, 2.2, 2.8, 4.1, 4.9];
        assert!(close(nse(&sim, &OBS), 0.989));
    }

    #[test]
    fn nse_mean_simulation_gives_zero() {
        assert!(close(nse(&[3.0; 5], &OBS), 0.0));
    }

    #[test]
    fn nse_constant_observed_is_neg_inf() {
        assert_eq!(nse(&OBS, &[5.0; 5]), Real::NEG_INFINITY);
    }

    #[test]
    fn errors_known_values() {
        let sim = [2.0, 3.0, 4.0, 5.0, 6.0];
        assert!(close(me(&sim, &OBS), 1.0));
        assert!(close(mae(&sim, &OBS), 1.0));
        assert!(close(mse(&sim, &OBS), 1.0));
        assert!(close(rmse(&sim, &OBS), 1.0));
        // sum(obs) = 15, sum(diff) = 5
        assert!(close(pbias(&sim, &OBS), 100.0 / 3.0));
    }

    #[test]
    fn kge_with_scaled_simulation() {
        // r = 1, alpha = 2, beta = 2 -> 1 - sqrt(2)
        let sim: Vec<Real> = OBS.iter().map(|o| 2.0 * o).collect();
        assert!(close(kge_2009(&sim, &OBS), 1.0 - 2.0_f64.sqrt()));
        // cv ratio is 1 under pure scaling -> 1 - |beta - 1|
        assert!(close(kge_2012(&sim, &OBS), 0.0));
    }

    #[test]
    fn anticorrelated() {
        let sim = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert!(close(pearson_r(&sim, &OBS), -1.0));
        assert!(close(r_squared(&sim, &OBS), 1.0));
        assert!(nse(&sim, &OBS) < 0.0);
    }

    #[test]
    fn shifted_simulation_known_values() {
        let sim = [2.0, 3.0, 4.0, 5.0, 6.0];
        assert!(close(ed(&sim, &OBS), 5.0_f64.sqrt()));
        assert!(close(mde(&sim, &OBS), 1.0));
        assert!(close(mdae(&sim, &OBS), 1.0));
        assert!(close(mdse(&sim, &OBS), 1.0));
        assert!(close(nrmse_range(&sim, &OBS), 0.25));
        assert!(close(nrmse_mean(&sim, &OBS), 1.0 / 3.0));
        // IQR of 1..=5 is 4 - 2.
        assert!(close(nrmse_iqr(&sim, &OBS), 0.5));
        assert!(close(mape(&sim, &OBS), 137.0 / 3.0));
        assert!(close(mapd(&sim, &OBS), 1.0 / 3.0));
        assert!(close(ve(&sim, &OBS), 2.0 / 3.0));
        // sum |o - mean| = 6
        assert!(close(lm_index(&sim, &OBS), 1.0 / 6.0));
        assert!(close(d1(&sim, &OBS), 8.0 / 13.0));
        assert!(close(dr(&sim, &OBS), 7.0 / 12.0));
        assert!(close(mase(&sim, &OBS), 1.0));
        assert!(close(nse_rel(&sim, &OBS), -0.31725));
        assert!(close(sc(&sim, &OBS), 0.0));
        // ln((2 + o) / (1 + o)) telescopes to ln(7 / 2).
        assert!(close(mle(&sim, &OBS), 3.5_f64.ln() / 5.0));
        assert!(close(male(&sim, &OBS), 3.5_f64.ln() / 5.0));
        assert!(close(rmsle(&sim, &OBS), msle(&sim, &OBS).sqrt()));
        assert!(msle(&sim, &OBS) > 0.0);
    }

    #[test]
    fn doubled_simulation_known_values() {
        let sim: Vec<Real> = OBS.iter().map(|o| 2.0 * o).collect();
        assert!(close(ned(&sim, &OBS), 0.0));
        assert!(close(sa(&sim, &OBS), 0.0));
        assert!(close(maape(&sim, &OBS), std::f64::consts::FRAC_PI_4));
        assert!(close(smape1(&sim, &OBS), 100.0 / 3.0));
        assert!(close(smape2(&sim, &OBS), 200.0 / 3.0));
        assert!(close(spearman_r(&sim, &OBS), 1.0));
    }

    #[test]
    fn spectral_angles() {
        assert!(close(sa(&[1.0, 0.0], &[0.0, 1.0]), std::f64::consts::FRAC_PI_2));
        let anti = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert!(close(sc(&anti, &OBS), std::f64::consts::PI));
    }

    #[test]
    fn spearman_ranks_ties_by_average() {
        assert_eq!(ranks(&[3.0, 1.0, 3.0, 2.0]), vec![3.5, 1.0, 3.5, 2.0]);
        assert!(close(spearman_r(&[1.0, 2.0, 2.0, 3.0, 4.0], &OBS), 0.95_f64.sqrt()));
        assert!(close(spearman_r(&[1.0, 4.0, 9.0, 16.0, 25.0], &OBS), 1.0));
    }

    #[test]
    fn dr_beyond_twice_the_spread() {
        // A = 30 > B = 12
        let sim = [7.0, 8.0, 9.0, 10.0, 11.0];
        assert!(close(dr(&sim, &OBS), 12.0 / 30.0 - 1.0));
    }

    #[test]
    fn empty_is_nan() {
        for name in metric_names() {
            let f = metric(name).unwrap();
            assert!(f(&[], &[]).is_nan(), "{name}");
        }
    }
}
