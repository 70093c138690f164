//! Calibration subset builder.

use std::collections::BTreeSet;

use hc_core::{DateWindow, TimeIndex, format_timestamp, infer_frequency};
use hc_data::Dataset;
use tracing::debug;

use crate::{EvalError, EvalResult};

/// Restrict `ds` to the union of `windows`, laid out at the dataset's own
/// frequency.
///
/// The frequency is the declared one, else a regular step inferred from the
/// time axis, else the most common step. Every requested instant must lie
/// within the dataset's time bounds; instants inside the bounds but absent
/// from the data become no-data. The result declares the frequency it was
/// built with, so subsetting it again with the same windows is a no-op.
pub fn subset(ds: &Dataset, windows: &[DateWindow]) -> EvalResult<Dataset> {
    if windows.is_empty() {
        return Err(EvalError::NoWindows);
    }
    for w in windows {
        w.check()?;
    }

    let freq = infer_frequency(ds.time())?;

    let mut selected = BTreeSet::new();
    for w in windows {
        selected.extend(freq.date_range(w.start, w.end));
    }
    let (Some(&lo), Some(&hi)) = (selected.first(), selected.last()) else {
        return Err(EvalError::EmptySelection);
    };

    // infer_frequency guarantees at least one timestamp here.
    let (Some(first), Some(last)) = (ds.time().first(), ds.time().last()) else {
        return Err(EvalError::EmptySelection);
    };
    if lo < first || hi > last {
        return Err(EvalError::OutOfRange {
            requested_start: format_timestamp(&lo),
            requested_end: format_timestamp(&hi),
            data_start: format_timestamp(&first),
            data_end: format_timestamp(&last),
        });
    }

    debug!(%freq, selected = selected.len(), "built calibration subset");
    let time = TimeIndex::new(selected.into_iter().collect()).with_freq(Some(freq));
    Ok(ds.reindex_time(time))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use hc_core::{Freq, Tolerances, parse_timestamp};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn subset_is_idempotent(
            windows in prop::collection::vec((0_i64..300, 0_i64..60), 1..4),
        ) {
            let origin = parse_timestamp("2021-01-01").unwrap();
            let stamps = Freq::daily().date_range(origin, parse_timestamp("2021-12-31").unwrap());
            let n = stamps.len();
            let mut ds = Dataset::new("subbasin", vec![1, 2], TimeIndex::new(stamps));
            ds.insert_values("QO", None, (0..2 * n).map(|i| i as f64).collect()).unwrap();

            let windows: Vec<DateWindow> = windows
                .into_iter()
                .map(|(s, len)| {
                    let start = origin + chrono_days(s);
                    DateWindow::new(start, start + chrono_days(len)).unwrap()
                })
                .collect();

            let once = subset(&ds, &windows).unwrap();
            let twice = subset(&once, &windows).unwrap();
            prop_assert!(once.approx_eq(&twice, Tolerances::default()));
            prop_assert!(once.time().iter().all(|t| ds.time().contains(t)));
        }
    }

    fn chrono_days(d: i64) -> chrono::TimeDelta {
        chrono::TimeDelta::days(d)
    }
}
