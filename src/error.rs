use std::path::PathBuf;

use thiserror::Error;

pub type LoadResult<T, E = LoadError> = Result<T, E>;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    OptionsError(#[from] OptionsError),
    #[error(transparent)]
    DurationError(#[from] DurationError),
    #[error(transparent)]
    ThresholdError(#[from] ThresholdError),
    #[error(transparent)]
    AssaultError(#[from] AssaultError),
    #[error(transparent)]
    ReportError(#[from] ReportError),

    #[cfg(feature = "default-http-client")]
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("cannot read options file `{}`: {source}", path.display())]
    CannotRead { path: PathBuf, source: std::io::Error },
    #[error("options are not valid json: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("options do not match the execution options schema: {0}")]
    InvalidSchema(#[source] serde_json::Error),
    #[error("options root must be a json object, but got `{0}`")]
    NotAnObject(String),
    #[error("invalid value for option `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("`{0}` is not a valid duration, expected something like `10s`, `1m30s` or `500ms`")]
    Invalid(String),
    #[error("duration `{0}` overflows")]
    Overflow(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ThresholdError {
    #[error("unknown metric `{0}` in thresholds")]
    UnknownMetric(String),
    #[error("`{0}` is not a valid threshold expression")]
    InvalidExpression(String),
    #[error("aggregation `{aggregation}` is not supported by {kind} metric `{metric}`")]
    UnsupportedAggregation { metric: String, kind: &'static str, aggregation: String },
    #[error("percentile must be between 0 and 100, but got {0}")]
    PercentileOutOfRange(String),
}

#[derive(Error, Debug)]
pub enum AssaultError {
    #[error("fail to create latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
    #[error("virtual user task failed: {0}")]
    VirtualUser(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("fail to format report")]
    Format(#[from] std::fmt::Error),
    #[error("fail to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("fail to serialize summary: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        fn f() -> LoadResult<()> {
            Err(DurationError::Invalid("10".to_string()))?
        }
        let err = f().unwrap_err();
        assert!(matches!(err, LoadError::DurationError(DurationError::Invalid(s)) if s == "10"));
    }

    #[test]
    fn test_transparent_display() {
        let err = LoadError::from(ThresholdError::UnknownMetric("http_req_blocked".to_string()));
        assert_eq!(err.to_string(), "unknown metric `http_req_blocked` in thresholds");
    }
}
