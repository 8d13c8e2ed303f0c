//! Error types for acquisition and the metadata pipeline.

use thiserror::Error;

/// Anything that stops a source from becoming a `RecordTable`. Always fatal.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("invalid source location `{0}`")]
    InvalidLocation(String),

    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("could not resolve download confirmation for {0}")]
    Confirmation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("source is not tabular data: {0}")]
    NotTabular(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Pipeline outcomes. Only `Acquisition` is fatal; the rest skip a stage.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("no publication date column found")]
    NoDateColumnFound,

    #[error("no valid dates in column `{column}` ({records} records)")]
    NoValidDates { column: String, records: usize },

    #[error("column `{0}` is not present in the table")]
    MissingCategoricalColumn(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True when the session has to stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Acquisition(_) | Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
