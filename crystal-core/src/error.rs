use std::path::PathBuf;

use glam::Vec3;
use thiserror::Error;

use crate::types::UnitId;

/// Errors surfaced by the clustering core and its ingestion boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// A scale factor with a zero component was passed to a scaling operation.
    #[error("scale factor {0} has a zero component")]
    ZeroScale(Vec3),

    /// A tunable parameter is outside its accepted range.
    #[error("invalid value {value} for `{name}`: {reason}")]
    InvalidParam {
        name: &'static str,
        value: f32,
        reason: &'static str,
    },

    /// A unit handle does not refer to the current population.
    #[error("unit {id} is out of range (population has {len} units)")]
    UnknownUnit { id: UnitId, len: usize },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A data row is missing a column or holds an unparsable value.
    #[error("malformed record at row {row}, column {column}: {reason}")]
    Record {
        row: usize,
        column: usize,
        reason: String,
    },

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
