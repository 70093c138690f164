use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// Marker stored in dense arrays for cells without a measurement.
pub const NO_DATA: Real = Real::NAN;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// Like [`nearly_equal`], but two no-data cells compare equal.
pub fn nearly_equal_or_missing(a: Real, b: Real, tol: Tolerances) -> bool {
    match (is_no_data(a), is_no_data(b)) {
        (true, true) => true,
        (false, false) => nearly_equal(a, b, tol),
        _ => false,
    }
}

#[inline]
pub fn is_no_data(v: Real) -> bool {
    v.is_nan()
}

/// Map a stored cell to `Option`, `None` for no-data.
#[inline]
pub fn to_option(v: Real) -> Option<Real> {
    if is_no_data(v) { None } else { Some(v) }
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn missing_cells_compare_equal() {
        let tol = Tolerances::default();
        assert!(nearly_equal_or_missing(NO_DATA, NO_DATA, tol));
        assert!(!nearly_equal_or_missing(NO_DATA, 1.0, tol));
        assert!(nearly_equal_or_missing(2.0, 2.0, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn to_option_maps_no_data() {
        assert_eq!(to_option(NO_DATA), None);
        assert_eq!(to_option(3.5), Some(3.5));
    }
}
