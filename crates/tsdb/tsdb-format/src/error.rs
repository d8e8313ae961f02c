use thiserror::Error;

/// Domain error taxonomy shared by every layer above the byte format:
/// the aggregator, the series engine, and the broker.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no series named {0:?} is open")]
    SeriesNotFound(String),

    #[error("a series named {0:?} already exists")]
    SeriesAlreadyExists(String),

    #[error("{0:?} is not a valid series slug")]
    InvalidSlug(String),

    #[error("no such command: {0:?}")]
    NoSuchCommand(String),

    #[error("no archive matches aggregation_type={aggregation_type:?} resolution={resolution}")]
    NoSuitableArchive {
        aggregation_type: String,
        resolution: u32,
    },

    #[error("invalid series configuration: {0}")]
    InvalidConfig(String),

    #[error("timestamp {timestamp} is not after the series' last recorded timestamp {last}")]
    TimestampNotMonotonic { timestamp: i64, last: i64 },

    #[error("negative value {0} supplied to an average archive")]
    NegativeValueForAverage(f64),

    #[error("malformed request: {0}")]
    ClientError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
