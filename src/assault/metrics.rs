use std::time::Duration;

use thiserror::Error;

use super::measure::metrics::MeasuredResponse;

pub type RequestResult<Res> = Result<MeasuredResponse<Res>, RequestError>;

/// Why a request produced no response. Never escapes an iteration, it only fails the check.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("request timeout: {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    NoReady(Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    InnerServiceError(Box<dyn std::error::Error + Send + Sync>),
}
impl RequestError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
