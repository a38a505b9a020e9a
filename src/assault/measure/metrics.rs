use std::time::{Duration, SystemTime};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Size of a response as it counts toward `data_received`.
pub trait Received {
    fn received_bytes(&self) -> usize;
}
impl Received for http::Response<Bytes> {
    fn received_bytes(&self) -> usize {
        self.body().len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasuredResponse<Res> {
    response: Res,
    metrics: Metrics,
}
impl<Res: Received> MeasuredResponse<Res> {
    pub fn new(response: Res, timestamp: SystemTime, latency: Duration) -> Self {
        let bytes = response.received_bytes();
        let metrics = Metrics { timestamp, latency, bytes };
        Self { response, metrics }
    }
}
impl<Res> MeasuredResponse<Res> {
    pub fn response(&self) -> &Res {
        &self.response
    }
    pub fn into_response(self) -> Res {
        self.response
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Metrics {
    timestamp: SystemTime,
    latency: Duration,
    bytes: usize,
}
impl Metrics {
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
    pub fn end_timestamp(&self) -> SystemTime {
        self.timestamp + self.latency
    }
    pub fn latency(&self) -> Duration {
        self.latency
    }
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measured_response_counts_body() {
        let response = http::Response::builder().status(200).body(Bytes::from_static(b"{\"data\":[]}")).unwrap();
        let measured = MeasuredResponse::new(response, SystemTime::UNIX_EPOCH, Duration::from_millis(120));
        assert_eq!(measured.metrics().bytes(), 11);
        assert_eq!(measured.metrics().end_timestamp(), SystemTime::UNIX_EPOCH + Duration::from_millis(120));
        assert_eq!(measured.into_response().status(), 200);
    }
}
