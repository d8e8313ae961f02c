use tsdb_format::{AggregationType, Error, SeriesType};

pub fn parse_series_type(raw: &str) -> Result<SeriesType, Error> {
    match raw {
        "period" => Ok(SeriesType::Period),
        "gauge" => Ok(SeriesType::Gauge),
        "counter" => Ok(SeriesType::Counter),
        other => Err(Error::InvalidConfig(format!("unknown series_type {other:?}"))),
    }
}

pub fn parse_aggregation_type(raw: &str) -> Result<AggregationType, Error> {
    match raw {
        "average" => Ok(AggregationType::Average),
        "min" => Ok(AggregationType::Min),
        "max" => Ok(AggregationType::Max),
        other => Err(Error::InvalidConfig(format!("unknown aggregation_type {other:?}"))),
    }
}

/// Maps a domain error onto the wire-level error kind tag the client
/// switches on.
pub fn error_kind(error: &Error) -> &'static str {
    match error {
        Error::SeriesNotFound(_) => "series_not_found",
        Error::SeriesAlreadyExists(_) => "series_already_exists",
        Error::InvalidSlug(_) => "invalid_slug",
        Error::NoSuchCommand(_) => "no_such_command",
        Error::NoSuitableArchive { .. } => "no_suitable_archive",
        Error::InvalidConfig(_) => "invalid_config",
        Error::TimestampNotMonotonic { .. } => "timestamp_not_monotonic",
        Error::NegativeValueForAverage(_) => "negative_value_for_average",
        Error::ClientError(_) => "client_error",
        Error::Io(_) => "internal",
        Error::Internal(_) => "internal",
    }
}
