//! Sampling frequencies.
//!
//! Frequencies use pandas-style offset aliases (`"1D"`, `"6h"`, `"15min"`,
//! `"MS"`) because that is how observation records and model run options
//! spell them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate, NaiveTime, TimeDelta};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::time::{TimeIndex, Timestamp};
use crate::{CoreError, CoreResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Freq {
    /// Fixed-width step.
    Fixed(TimeDelta),
    /// Every `n` calendar months, anchored on the first of the month.
    MonthStart(u32),
}

impl Freq {
    pub fn daily() -> Self {
        Self::Fixed(TimeDelta::days(1))
    }

    pub fn hourly() -> Self {
        Self::Fixed(TimeDelta::hours(1))
    }

    /// The instant one step after `ts`.
    pub fn step(&self, ts: Timestamp) -> Option<Timestamp> {
        match *self {
            Self::Fixed(d) => ts.checked_add_signed(d),
            Self::MonthStart(n) => ts.checked_add_months(Months::new(n)),
        }
    }

    /// Regular range covering `[start, end]`.
    ///
    /// Fixed steps start exactly at `start`; month-start steps begin at the
    /// first month boundary on or after `start`.
    pub fn date_range(&self, start: Timestamp, end: Timestamp) -> Vec<Timestamp> {
        let mut out = Vec::new();
        let mut cur = match self {
            Self::Fixed(_) => Some(start),
            Self::MonthStart(_) => month_start_on_or_after(start),
        };
        while let Some(ts) = cur {
            if ts > end {
                break;
            }
            out.push(ts);
            cur = self.step(ts);
        }
        out
    }

    /// Resampling origin for a series whose first instant is `first`:
    /// midnight of that day.
    pub fn origin_for(first: Timestamp) -> Timestamp {
        first.date().and_time(NaiveTime::MIN)
    }

    /// Left edge of the bin containing `ts`.
    pub fn bin_start(&self, ts: Timestamp, origin: Timestamp) -> Timestamp {
        match *self {
            Self::Fixed(d) => {
                let width = d.num_milliseconds();
                if width <= 0 {
                    return ts;
                }
                let offset = (ts - origin).num_milliseconds();
                let k = offset.div_euclid(width);
                origin + TimeDelta::milliseconds(k * width)
            }
            Self::MonthStart(n) => {
                let n = i64::from(n.max(1));
                let idx = i64::from(ts.year()) * 12 + i64::from(ts.month0());
                let floored = idx - idx.rem_euclid(n);
                let year = floored.div_euclid(12) as i32;
                let month = floored.rem_euclid(12) as u32 + 1;
                NaiveDate::from_ymd_opt(year, month, 1)
                    .map(|d| d.and_time(NaiveTime::MIN))
                    .unwrap_or(ts)
            }
        }
    }
}

fn month_start_on_or_after(ts: Timestamp) -> Option<Timestamp> {
    let first = NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1)?.and_time(NaiveTime::MIN);
    if first == ts {
        Some(ts)
    } else {
        first.checked_add_months(Months::new(1))
    }
}

fn is_month_start(ts: &Timestamp) -> bool {
    ts.day() == 1 && ts.time() == NaiveTime::MIN
}

fn month_index(ts: &Timestamp) -> i64 {
    i64::from(ts.year()) * 12 + i64::from(ts.month0())
}

/// Frequency of an index whose steps are all identical, if any.
pub fn infer_regular(stamps: &[Timestamp]) -> Option<Freq> {
    if stamps.len() < 2 {
        return None;
    }

    if stamps.iter().all(is_month_start) {
        let step = month_index(&stamps[1]) - month_index(&stamps[0]);
        if step > 0
            && stamps
                .windows(2)
                .all(|w| month_index(&w[1]) - month_index(&w[0]) == step)
        {
            return u32::try_from(step).ok().map(Freq::MonthStart);
        }
    }

    let delta = stamps[1] - stamps[0];
    if delta <= TimeDelta::zero() {
        return None;
    }
    if stamps.windows(2).all(|w| w[1] - w[0] == delta) {
        Some(Freq::Fixed(delta))
    } else {
        None
    }
}

/// Most common step of an index. Ties go to the shortest step.
pub fn infer_modal(stamps: &[Timestamp]) -> Option<Freq> {
    if stamps.len() < 2 {
        return None;
    }
    let mut counts: BTreeMap<TimeDelta, usize> = BTreeMap::new();
    for w in stamps.windows(2) {
        let delta = w[1] - w[0];
        if delta > TimeDelta::zero() {
            *counts.entry(delta).or_insert(0) += 1;
        }
    }
    let mut best: Option<(TimeDelta, usize)> = None;
    for (delta, count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((delta, count));
        }
    }
    best.map(|(delta, _)| Freq::Fixed(delta))
}

/// Sampling frequency of an index: the declared frequency, else a regular
/// step, else the modal step.
pub fn infer_frequency(index: &TimeIndex) -> CoreResult<Freq> {
    if let Some(freq) = index.freq() {
        return Ok(freq);
    }
    if index.len() < 2 {
        return Err(CoreError::FreqInference {
            reason: format!(
                "need at least 2 timestamps without a declared frequency, found {}",
                index.len()
            ),
        });
    }
    infer_regular(index.as_slice())
        .or_else(|| infer_modal(index.as_slice()))
        .ok_or_else(|| CoreError::FreqInference {
            reason: "time index has no positive step".to_string(),
        })
}

impl fmt::Display for Freq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MonthStart(n) => write!(f, "{n}MS"),
            Self::Fixed(d) => {
                if d.subsec_nanos() != 0 {
                    return write!(f, "{}ms", d.num_milliseconds());
                }
                let secs = d.num_seconds();
                if secs % 86_400 == 0 {
                    write!(f, "{}D", secs / 86_400)
                } else if secs % 3_600 == 0 {
                    write!(f, "{}h", secs / 3_600)
                } else if secs % 60 == 0 {
                    write!(f, "{}min", secs / 60)
                } else {
                    write!(f, "{secs}s")
                }
            }
        }
    }
}

impl FromStr for Freq {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| CoreError::FreqParse {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let s = input.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, alias) = s.split_at(split);
        let n: i64 = if digits.is_empty() {
            1
        } else {
            digits.parse().map_err(|_| fail("bad multiple"))?
        };
        if n <= 0 {
            return Err(fail("multiple must be positive"));
        }

        let fixed = |unit_ms: i64| {
            n.checked_mul(unit_ms)
                .and_then(TimeDelta::try_milliseconds)
                .map(Freq::Fixed)
                .ok_or_else(|| fail("step too large"))
        };

        match alias.trim() {
            "ms" | "L" => fixed(1),
            "s" | "S" | "sec" => fixed(1_000),
            "min" | "T" => fixed(60_000),
            "h" | "H" => fixed(3_600_000),
            "D" | "d" => fixed(86_400_000),
            // Weekly bins are anchored on a weekday, which a fixed step
            // counted from the epoch cannot express.
            a if a == "W" || a.starts_with("W-") => {
                Err(fail("anchored weekly offsets are not supported; use 7D"))
            }
            "MS" => u32::try_from(n)
                .map(Freq::MonthStart)
                .map_err(|_| fail("step too large")),
            "" => Err(fail("missing offset alias")),
            _ => Err(fail("unsupported offset alias")),
        }
    }
}

impl Serialize for Freq {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Freq {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_timestamp;

    fn ts(s: &str) -> Timestamp {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn parses_pandas_aliases() {
        assert_eq!("1D".parse::<Freq>().unwrap(), Freq::daily());
        assert_eq!("D".parse::<Freq>().unwrap(), Freq::daily());
        assert_eq!("24H".parse::<Freq>().unwrap(), Freq::daily());
        assert_eq!("1h".parse::<Freq>().unwrap(), Freq::hourly());
        assert_eq!(
            "15min".parse::<Freq>().unwrap(),
            Freq::Fixed(TimeDelta::minutes(15))
        );
        assert_eq!("MS".parse::<Freq>().unwrap(), Freq::MonthStart(1));
    }

    #[test]
    fn rejects_unknown_alias() {
        assert!("3Q".parse::<Freq>().is_err());
        assert!("0D".parse::<Freq>().is_err());
        assert!("".parse::<Freq>().is_err());
    }

    #[test]
    fn anchored_offsets_are_rejected() {
        for alias in ["W", "2W", "W-SUN", "M", "ME"] {
            assert!(matches!(
                alias.parse::<Freq>(),
                Err(CoreError::FreqParse { .. })
            ));
        }
        let err = "W".parse::<Freq>().unwrap_err().to_string();
        assert!(err.contains("7D"), "{err}");
        assert_eq!("7D".parse::<Freq>().unwrap(), Freq::Fixed(TimeDelta::days(7)));
    }

    #[test]
    fn display_round_trips() {
        for s in ["1D", "6h", "15min", "30s", "2MS"] {
            let f: Freq = s.parse().unwrap();
            assert_eq!(f.to_string(), s);
        }
    }

    #[test]
    fn daily_range_is_inclusive() {
        let r = Freq::daily().date_range(ts("2021-06-01"), ts("2021-06-10"));
        assert_eq!(r.len(), 10);
        assert_eq!(r[0], ts("2021-06-01"));
        assert_eq!(r[9], ts("2021-06-10"));
    }

    #[test]
    fn month_start_range_rolls_forward() {
        let r = Freq::MonthStart(1).date_range(ts("2021-01-15"), ts("2021-04-01"));
        assert_eq!(r, vec![ts("2021-02-01"), ts("2021-03-01"), ts("2021-04-01")]);
    }

    #[test]
    fn bins_daily_from_hourly() {
        let origin = Freq::origin_for(ts("2021-01-01T05:00:00"));
        let f = Freq::daily();
        assert_eq!(f.bin_start(ts("2021-01-02T23:00:00"), origin), ts("2021-01-02"));
        assert_eq!(
            Freq::MonthStart(1).bin_start(ts("2021-03-17T12:00:00"), origin),
            ts("2021-03-01")
        );
    }

    #[test]
    fn infers_regular_and_modal() {
        let regular = [ts("2021-01-01"), ts("2021-01-02"), ts("2021-01-03")];
        assert_eq!(infer_regular(&regular), Some(Freq::daily()));

        let gappy = [
            ts("2021-01-01"),
            ts("2021-01-02"),
            ts("2021-01-03"),
            ts("2021-01-06"),
        ];
        assert_eq!(infer_regular(&gappy), None);
        assert_eq!(infer_modal(&gappy), Some(Freq::daily()));

        let monthly = [ts("2021-01-01"), ts("2021-02-01"), ts("2021-03-01")];
        assert_eq!(infer_regular(&monthly), Some(Freq::MonthStart(1)));
    }

    #[test]
    fn declared_frequency_wins() {
        let index = TimeIndex::new(vec![ts("2021-01-01"), ts("2021-01-05")])
            .with_freq(Some(Freq::daily()));
        assert_eq!(infer_frequency(&index).unwrap(), Freq::daily());
    }

    #[test]
    fn single_timestamp_cannot_be_inferred() {
        let index = TimeIndex::new(vec![ts("2021-01-01")]);
        assert!(matches!(
            infer_frequency(&index),
            Err(CoreError::FreqInference { .. })
        ));
    }
}
