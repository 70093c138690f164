use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error(transparent)]
    Core(#[from] hc_core::CoreError),

    #[error(transparent)]
    Data(#[from] hc_data::DataError),

    #[error("No calibration windows given")]
    NoWindows,

    #[error("Calibration windows select no timestamps")]
    EmptySelection,

    #[error(
        "Requested range {requested_start}..{requested_end} is outside data bounds {data_start}..{data_end}"
    )]
    OutOfRange {
        requested_start: String,
        requested_end: String,
        data_start: String,
        data_end: String,
    },

    #[error("Unknown reducer '{name}'")]
    UnknownReducer { name: String },

    #[error("Observations carry no `freq` value")]
    MissingObservedFreq,

    #[error("Observations carry conflicting `freq` values: {found:?}")]
    InconsistentObservedFreq { found: Vec<String> },

    #[error("Computational-unit dimension differs: simulated `{simulated}`, observed `{observed}`")]
    DimensionMismatch { simulated: String, observed: String },

    #[error("Computational unit {id} is missing from simulated results")]
    MissingStation { id: i64 },

    #[error("Unknown metric '{name}'")]
    UnknownMetric { name: String },

    #[error("Invalid expression '{expr}': {reason}")]
    Expr { expr: String, reason: String },

    #[error("Unknown identifier '{name}' in expression '{expr}'")]
    UnknownIdentifier { name: String, expr: String },
}
