//! Timestamps, time indices and calibration windows.
//!
//! All instants are timezone-naive. Inputs carrying an explicit UTC offset
//! are shifted to UTC and then stripped, so every index in the system uses
//! the same convention and merging never mixes aware and naive values.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, Freq};

pub type Timestamp = NaiveDateTime;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Parse a timestamp-like string into the canonical naive instant.
pub fn parse_timestamp(input: &str) -> CoreResult<Timestamp> {
    let s = input.trim();

    if let Ok(aware) = DateTime::parse_from_rfc3339(s) {
        return Ok(aware.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date.and_time(NaiveTime::MIN));
        }
    }

    Err(CoreError::TimestampParse {
        input: input.to_string(),
    })
}

pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Serde adapter: timestamps travel as strings and accept every spelling
/// [`parse_timestamp`] understands.
pub mod serde_timestamp {
    use super::{Timestamp, format_timestamp, parse_timestamp};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Vec<Timestamp>`.
pub mod serde_timestamps {
    use super::{Timestamp, format_timestamp, parse_timestamp};
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(stamps: &[Timestamp], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(stamps.len()))?;
        for ts in stamps {
            seq.serialize_element(&format_timestamp(ts))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Timestamp>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| parse_timestamp(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Sorted, duplicate-free sequence of instants with an optional declared
/// sampling frequency.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeIndex {
    stamps: Vec<Timestamp>,
    freq: Option<Freq>,
}

impl TimeIndex {
    /// Build from arbitrary instants; they are sorted and deduplicated.
    pub fn new(mut stamps: Vec<Timestamp>) -> Self {
        stamps.sort_unstable();
        stamps.dedup();
        Self { stamps, freq: None }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_freq(mut self, freq: Option<Freq>) -> Self {
        self.freq = freq;
        self
    }

    pub fn freq(&self) -> Option<Freq> {
        self.freq
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn as_slice(&self) -> &[Timestamp] {
        &self.stamps
    }

    pub fn iter(&self) -> impl Iterator<Item = &Timestamp> {
        self.stamps.iter()
    }

    pub fn first(&self) -> Option<Timestamp> {
        self.stamps.first().copied()
    }

    pub fn last(&self) -> Option<Timestamp> {
        self.stamps.last().copied()
    }

    /// Column of `ts` in this index.
    pub fn position(&self, ts: &Timestamp) -> Option<usize> {
        self.stamps.binary_search(ts).ok()
    }

    pub fn contains(&self, ts: &Timestamp) -> bool {
        self.position(ts).is_some()
    }

    pub fn into_vec(self) -> Vec<Timestamp> {
        self.stamps
    }
}

/// Sorted union of any number of time indices, duplicates removed.
///
/// The result never carries a declared frequency, even when every input
/// shares one.
pub fn merge_time_indices<'a, I>(indices: I) -> TimeIndex
where
    I: IntoIterator<Item = &'a [Timestamp]>,
{
    let mut all = BTreeSet::new();
    for index in indices {
        all.extend(index.iter().copied());
    }
    TimeIndex {
        stamps: all.into_iter().collect(),
        freq: None,
    }
}

/// Closed calibration interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    #[serde(with = "serde_timestamp")]
    pub start: Timestamp,
    #[serde(with = "serde_timestamp")]
    pub end: Timestamp,
}

impl DateWindow {
    pub fn new(start: Timestamp, end: Timestamp) -> CoreResult<Self> {
        let window = Self { start, end };
        window.check()?;
        Ok(window)
    }

    pub fn parse(start: &str, end: &str) -> CoreResult<Self> {
        Self::new(parse_timestamp(start)?, parse_timestamp(end)?)
    }

    /// Reject windows that end before they start.
    pub fn check(&self) -> CoreResult<()> {
        if self.end < self.start {
            return Err(CoreError::InvalidInterval {
                start: format_timestamp(&self.start),
                end: format_timestamp(&self.end),
            });
        }
        Ok(())
    }
}

/// CF-convention time axis: `<step> since <reference>`, as written in the
/// `units` attribute of a NetCDF time coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfTimeUnits {
    pub step_seconds: i64,
    pub reference: Timestamp,
}

impl CfTimeUnits {
    pub fn parse(units: &str) -> CoreResult<Self> {
        let bad = || CoreError::TimestampParse {
            input: units.to_string(),
        };
        let (step, reference) = units.split_once(" since ").ok_or_else(bad)?;
        let step_seconds = match step.trim().to_ascii_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1,
            "minutes" | "minute" | "mins" | "min" => 60,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3_600,
            "days" | "day" | "d" => 86_400,
            _ => return Err(bad()),
        };
        // Some writers append a zone ("UTC", "+00:00") after the time.
        let reference = reference.trim();
        let reference = parse_timestamp(reference)
            .or_else(|_| parse_timestamp(reference.trim_end_matches("UTC").trim()))
            .or_else(|_| match reference.rsplit_once(' ') {
                Some((head, _)) => parse_timestamp(head),
                None => Err(bad()),
            })?;
        Ok(Self {
            step_seconds,
            reference,
        })
    }

    /// Offsets are rounded to the nearest millisecond.
    pub fn decode(&self, value: f64) -> CoreResult<Timestamp> {
        if !value.is_finite() {
            return Err(CoreError::NonFinite {
                what: "time offset",
                value,
            });
        }
        let millis = (value * self.step_seconds as f64 * 1_000.0).round() as i64;
        Ok(self.reference + TimeDelta::milliseconds(millis))
    }

    pub fn encode(&self, ts: &Timestamp) -> f64 {
        let delta = *ts - self.reference;
        delta.num_milliseconds() as f64 / (self.step_seconds as f64 * 1_000.0)
    }
}

impl std::fmt::Display for CfTimeUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self.step_seconds {
            1 => "seconds",
            60 => "minutes",
            3_600 => "hours",
            _ => "days",
        };
        write!(f, "{step} since {}", self.reference.format("%Y-%m-%d %H:%M:%S"))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn stamps() -> impl Strategy<Value = Vec<Timestamp>> {
        prop::collection::vec(0_i64..2_000, 0..40).prop_map(|hours| {
            let origin = NaiveDate::from_ymd_opt(2000, 1, 1)
                .unwrap()
                .and_time(NaiveTime::MIN);
            hours
                .into_iter()
                .map(|h| origin + chrono::TimeDelta::hours(h))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn merge_is_associative_and_commutative(a in stamps(), b in stamps(), c in stamps()) {
            let ab = merge_time_indices([a.as_slice(), b.as_slice()]);
            let bc = merge_time_indices([b.as_slice(), c.as_slice()]);
            let left = merge_time_indices([ab.as_slice(), c.as_slice()]);
            let right = merge_time_indices([a.as_slice(), bc.as_slice()]);
            prop_assert_eq!(&left, &right);

            let ba = merge_time_indices([b.as_slice(), a.as_slice()]);
            prop_assert_eq!(&ab, &ba);

            let all = merge_time_indices([c.as_slice(), a.as_slice(), b.as_slice()]);
            prop_assert_eq!(&left, &all);
            prop_assert!(all.len() <= a.len() + b.len() + c.len());
        }

        #[test]
        fn merge_is_idempotent(a in stamps()) {
            let once = merge_time_indices([a.as_slice()]);
            let twice = merge_time_indices([once.as_slice(), once.as_slice()]);
            prop_assert_eq!(once, twice);
        }
    }
}
