//! hc-core: stable foundation for hydrocal.
//!
//! Contains:
//! - units (string unit registry backed by uom conversion factors)
//! - numeric (Real + tolerances + no-data helpers)
//! - time (timestamp parsing, time indices, calibration windows)
//! - freq (sampling frequencies, inference, regular ranges)
//! - timing (opt-in wall-clock timers)
//! - error (shared error types)

pub mod error;
pub mod freq;
pub mod numeric;
pub mod time;
pub mod timing;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use freq::{Freq, infer_frequency};
pub use numeric::*;
pub use time::{CfTimeUnits, DateWindow, TimeIndex, Timestamp, format_timestamp, merge_time_indices, parse_timestamp};
pub use units::{Conversion, Dimension, UnitDef, UnitRegistry};
