//! Raw observation records, one per station and variable.

use hc_core::time::serde_timestamps;
use hc_core::{NO_DATA, Real, Timestamp, format_timestamp, parse_timestamp};
use serde::{Deserialize, Serialize};

use crate::{DataError, DataResult};

/// Values of one entry, either as `[timestamp, value]` pairs or as an
/// index with a parallel value list. `null` values mean no data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Series {
    Pairs(Vec<(String, Option<f64>)>),
    Indexed {
        #[serde(with = "serde_timestamps")]
        index: Vec<Timestamp>,
        values: Vec<Option<f64>>,
    },
}

impl Default for Series {
    fn default() -> Self {
        Self::Pairs(Vec::new())
    }
}

impl Series {
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, Option<f64>)>) -> Self {
        Self::Pairs(pairs.into_iter().map(|(t, v)| (t.into(), v)).collect())
    }

    pub fn indexed(index: Vec<Timestamp>, values: Vec<Option<f64>>) -> Self {
        Self::Indexed { index, values }
    }

    /// Parse into canonical form. Order is preserved; duplicates are kept
    /// and left for the caller to judge.
    pub fn resolve(&self) -> DataResult<ParsedSeries> {
        match self {
            Self::Pairs(pairs) => {
                let mut index = Vec::with_capacity(pairs.len());
                let mut values = Vec::with_capacity(pairs.len());
                for (raw, v) in pairs {
                    index.push(parse_timestamp(raw)?);
                    values.push(v.unwrap_or(NO_DATA));
                }
                Ok(ParsedSeries { index, values })
            }
            Self::Indexed { index, values } => {
                if index.len() != values.len() {
                    return Err(DataError::ShapeMismatch {
                        what: "indexed series values".to_string(),
                        expected: index.len(),
                        found: values.len(),
                    });
                }
                Ok(ParsedSeries {
                    index: index.clone(),
                    values: values.iter().map(|v| v.unwrap_or(NO_DATA)).collect(),
                })
            }
        }
    }
}

/// Canonical series: parallel timestamps and values (NaN = no data).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSeries {
    pub index: Vec<Timestamp>,
    pub values: Vec<Real>,
}

impl ParsedSeries {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// First timestamp that appears more than once.
    pub fn first_duplicate(&self) -> Option<Timestamp> {
        let mut sorted = self.index.clone();
        sorted.sort_unstable();
        sorted.windows(2).find(|w| w[0] == w[1]).map(|w| w[0])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub var_type: String,
    #[serde(default)]
    pub timeseries: Series,
    #[serde(alias = "units")]
    pub unit: String,
    pub computational_unit: String,
    pub computational_unit_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<String>,
}

impl ObservationEntry {
    /// Human-readable label for diagnostics.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{name} ({})", self.var_type),
            None => format!(
                "{} {} ({})",
                self.computational_unit, self.computational_unit_id, self.var_type
            ),
        }
    }

    pub(crate) fn duplicate_error(&self, ts: Timestamp) -> DataError {
        DataError::DuplicateTimestamp {
            station: self.label(),
            timestamp: format_timestamp(&ts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn deserializes_pair_series_and_units_alias() {
        let json = r#"{
            "name": "gauge-1",
            "type": "Q",
            "timeseries": [["2020-01-01", 1.5], ["2020-01-02", null]],
            "units": "m3/s",
            "computational_unit": "subbasin",
            "computational_unit_id": 4
        }"#;
        let entry: ObservationEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.unit, "m3/s");
        assert_eq!(entry.freq, None);

        let parsed = entry.timeseries.resolve().unwrap();
        assert_eq!(parsed.index, vec![ts("2020-01-01"), ts("2020-01-02")]);
        assert_eq!(parsed.values[0], 1.5);
        assert!(parsed.values[1].is_nan());
    }

    #[test]
    fn deserializes_indexed_series() {
        let json = r#"{
            "type": "SWE",
            "timeseries": {"index": ["2020-01-01", "2020-01-02"], "values": [3.0, 4.0]},
            "unit": "mm",
            "computational_unit": "subbasin",
            "computational_unit_id": 1,
            "freq": "1D"
        }"#;
        let entry: ObservationEntry = serde_json::from_str(json).unwrap();
        assert!(matches!(entry.timeseries, Series::Indexed { .. }));
        assert_eq!(entry.timeseries.resolve().unwrap().values, vec![3.0, 4.0]);
    }

    #[test]
    fn indexed_length_mismatch_fails() {
        let s = Series::indexed(vec![ts("2020-01-01")], vec![Some(1.0), Some(2.0)]);
        assert!(matches!(
            s.resolve(),
            Err(DataError::ShapeMismatch { expected: 1, found: 2, .. })
        ));
    }

    #[test]
    fn bad_timestamp_fails() {
        let s = Series::from_pairs([("not a date", Some(1.0))]);
        assert!(matches!(s.resolve(), Err(DataError::Core(_))));
    }

    #[test]
    fn finds_duplicates() {
        let s = Series::from_pairs([
            ("2020-01-02", Some(1.0)),
            ("2020-01-01", Some(2.0)),
            ("2020-01-02", Some(3.0)),
        ]);
        assert_eq!(s.resolve().unwrap().first_duplicate(), Some(ts("2020-01-02")));
    }
}
