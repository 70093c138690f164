use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Unknown unit '{unit}'")]
    UnknownUnit { unit: String },

    #[error("Cannot convert '{from}' ({from_dim}) to '{to}' ({to_dim}): incompatible dimensions")]
    IncompatibleUnits {
        from: String,
        to: String,
        from_dim: String,
        to_dim: String,
    },

    #[error("Cannot parse timestamp '{input}'")]
    TimestampParse { input: String },

    #[error("Cannot parse frequency '{input}': {reason}")]
    FreqParse { input: String, reason: String },

    #[error("Cannot infer frequency: {reason}")]
    FreqInference { reason: String },

    #[error("Invalid interval: end {end} is before start {start}")]
    InvalidInterval { start: String, end: String },
}
