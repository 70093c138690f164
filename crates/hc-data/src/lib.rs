//! hc-data: observation datasets, their file format, and the assembler
//! that builds them from raw station records.

pub mod assemble;
pub mod dataset;
pub mod entry;
#[cfg(feature = "netcdf")]
mod netcdf_io;
pub mod store;

pub use assemble::{AssembleOptions, assemble, prepare_loaded_observations};
pub use dataset::{Dataset, TIME_DIM, Variable};
pub use entry::{ObservationEntry, ParsedSeries, Series};
pub use store::{CoordEntry, DatasetFile, DatasetFormat, VarEntry};

pub type DataResult<T> = Result<T, DataError>;

#[derive(thiserror::Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] hc_core::CoreError),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("{format} datasets are not supported by this build")]
    FormatUnavailable { format: DatasetFormat },

    #[error("Dimension `{dim}` not found")]
    MissingDimension { dim: String },

    #[error("Unexpected dimensions {dims:?}: expected one computational-unit dimension plus `time`")]
    AmbiguousDimensions { dims: Vec<String> },

    #[error("Missing coordinate `{name}`")]
    MissingCoordinate { name: String },

    #[error("Invalid value in coordinate `{coord}`: {value}")]
    InvalidCoordinate { coord: String, value: String },

    #[error("Shape mismatch for {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("Inconsistent computational unit kind: '{first}' vs '{other}'")]
    InconsistentUnitKind { first: String, other: String },

    #[error("Found inconsistent units for type '{var_type}': {found} vs {reference}")]
    InconsistentUnits {
        var_type: String,
        found: String,
        reference: String,
    },

    #[error("Duplicate timestamp {timestamp} in series of {station}")]
    DuplicateTimestamp { station: String, timestamp: String },

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("Variable `{0}` has no units")]
    MissingUnits(String),

    #[error("Computational unit {id} not found in `{dim}`")]
    UnitNotFound { dim: String, id: i64 },
}
